//! Reader mode 2: ordered single-table query with client-side
//! same-timestamp dedup, exploiting `ORDER BY tags, t` instead of a
//! server-side `GROUP BY`.

use super::{format_date, format_time, Plan};
use crate::backend::Backend;
use crate::labels;
use crate::proto::{Label, Sample, TimeSeries};
use crate::sql::{matchers_to_sql, SelectBuilder};
use clickhouse::Row;
use serde::Deserialize;

#[derive(Row, Deserialize)]
struct OrderedRow {
    t: i64,
    #[allow(dead_code)]
    name: String,
    tags: Vec<String>,
    val: f64,
}

pub async fn run(plan: &Plan<'_>, backend: &Backend) -> anyhow::Result<Vec<TimeSeries>> {
    let time_filter = time_predicate(plan);
    let where_clause = format!("{time_filter} AND {}", matchers_to_sql(plan.matchers));

    let sql = SelectBuilder::new(format!("{}.{}", plan.database, plan.table))
        .column(format!(
            "(intDiv(toUInt32(ts),{0})*{0})*1000 AS t",
            plan.step
        ))
        .column("name")
        .column("tags")
        .column("val")
        .filter(where_clause)
        .order_by("tags")
        .order_by("t")
        .build();

    let rows = super::fetch_tolerant::<OrderedRow>(backend.client(), &sql).await?;

    let mut out: Vec<TimeSeries> = Vec::new();
    let mut last_key: Option<String> = None;
    let mut last_ts_ms: i64 = 0;

    for row in rows {
        let key = row.tags.join("\u{FF}");

        if last_key.as_deref() != Some(key.as_str()) {
            out.push(TimeSeries {
                labels: labels::from_tag_strings(&row.tags)
                    .into_iter()
                    .map(|l| Label {
                        name: l.name,
                        value: l.value,
                    })
                    .collect(),
                samples: Vec::new(),
            });
            last_key = Some(key);
            last_ts_ms = 0;
        } else if row.t == last_ts_ms {
            // Drop the later of two samples at the same bucketed
            // timestamp.
            continue;
        }

        last_ts_ms = row.t;
        out.last_mut().unwrap().samples.push(Sample {
            value: row.val,
            timestamp_ms: row.t,
        });
    }

    Ok(out)
}

fn time_predicate(plan: &Plan<'_>) -> String {
    format!(
        "date >= '{}' AND ts >= '{}' AND ts <= '{}'",
        format_date(plan.start_ms, plan.utc),
        format_time(plan.start_ms, plan.utc),
        format_time(plan.end_ms, plan.utc),
    )
}
