//! Reader mode 1: quantile-aggregated single-table query.

use super::{format_date, format_time, Plan};
use crate::backend::Backend;
use crate::labels;
use crate::proto::{Sample, TimeSeries};
use crate::sql::{matchers_to_sql, SelectBuilder};
use clickhouse::Row;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Row, Deserialize)]
struct AggregatedRow {
    #[allow(dead_code)]
    cnt: u64,
    t: i64,
    #[allow(dead_code)]
    name: String,
    tags: Vec<String>,
    value: f64,
}

pub async fn run(plan: &Plan<'_>, backend: &Backend, quantile: f64) -> anyhow::Result<Vec<TimeSeries>> {
    let quantile = quantile.clamp(0.0, 1.0);
    let time_filter = time_predicate(plan);
    let where_clause = format!("{time_filter} AND {}", matchers_to_sql(plan.matchers));

    let sql = SelectBuilder::new(format!("{}.{}", plan.database, plan.table))
        .column("COUNT() AS cnt")
        .column(format!(
            "(intDiv(toUInt32(ts),{0})*{0})*1000 AS t",
            plan.step
        ))
        .column("name")
        .column("tags")
        .column(format!("quantile({quantile})(val) AS value"))
        .filter(where_clause)
        .group_by("t")
        .group_by("name")
        .group_by("tags")
        .order_by("tags")
        .build();

    let rows = super::fetch_tolerant::<AggregatedRow>(backend.client(), &sql).await?;

    // `order` preserves first-seen order of series keys; row order
    // within a series still follows ORDER BY tags from the query.
    let mut order: Vec<String> = Vec::new();
    let mut series: HashMap<String, TimeSeries> = HashMap::new();

    for row in rows {
        let key = row.tags.join("\u{FF}");
        let entry = series.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            TimeSeries {
                labels: labels::from_tag_strings(&row.tags)
                    .into_iter()
                    .map(|l| crate::proto::Label {
                        name: l.name,
                        value: l.value,
                    })
                    .collect(),
                samples: Vec::new(),
            }
        });
        entry.samples.push(Sample {
            value: row.value,
            timestamp_ms: row.t,
        });
    }

    Ok(order.into_iter().filter_map(|key| series.remove(&key)).collect())
}

fn time_predicate(plan: &Plan<'_>) -> String {
    format!(
        "date >= '{}' AND ts >= '{}' AND ts <= '{}'",
        format_date(plan.start_ms, plan.utc),
        format_time(plan.start_ms, plan.utc),
        format_time(plan.end_ms, plan.utc),
    )
}
