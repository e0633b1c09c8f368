//! Reader mode 3: two-query metrics/samples join via fingerprint.

use super::{format_date, Plan};
use crate::backend::Backend;
use crate::fingerprint::Fingerprint;
use crate::labels;
use crate::proto::{Label, Sample, TimeSeries};
use crate::sql::{matchers_to_sql, name_matcher_to_sql, SelectBuilder};
use clickhouse::Row;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Row, Deserialize)]
struct MetricRow {
    #[allow(dead_code)]
    cnt: u64,
    fingerprint: Fingerprint,
    tags: Vec<String>,
}

#[derive(Row, Deserialize)]
struct SampleRow {
    fingerprint: Fingerprint,
    t: i64,
    value: f64,
}

pub async fn run(plan: &Plan<'_>, backend: &Backend) -> anyhow::Result<Vec<TimeSeries>> {
    let metrics_table = format!("{}.{}_metrics", plan.database, plan.table);
    let samples_table = format!("{}.{}_samples", plan.database, plan.table);
    let start_date = format_date(plan.start_ms, plan.utc);
    let end_date = format_date(plan.end_ms, plan.utc);

    let query_a = SelectBuilder::new(&metrics_table)
        .column("count() AS cnt")
        .column("fingerprint")
        .column("tags")
        .filter(format!(
            "date >= '{start_date}' AND date <= '{end_date}' AND {}",
            matchers_to_sql(plan.matchers)
        ))
        .group_by("fingerprint")
        .group_by("tags")
        .build();

    let labels_by_fingerprint: HashMap<Fingerprint, Vec<Label>> =
        super::fetch_tolerant::<MetricRow>(backend.client(), &query_a)
            .await?
            .into_iter()
            .map(|row| {
                let labels = labels::from_tag_strings(&row.tags)
                    .into_iter()
                    .map(|l| Label {
                        name: l.name,
                        value: l.value,
                    })
                    .collect();
                (row.fingerprint, labels)
            })
            .collect();

    let name_filter = name_matcher_to_sql(plan.matchers);
    let candidate_fingerprints = format!(
        "SELECT fingerprint FROM {metrics_table} WHERE {name_filter} AND date >= '{start_date}' \
         AND date <= '{end_date}' GROUP BY fingerprint"
    );

    let query_b = SelectBuilder::new(&samples_table)
        .column("fingerprint")
        .column(format!(
            "(intDiv(toUInt32(ts),{0})*{0})*1000 AS t",
            plan.step
        ))
        .column("anyLast(val) AS value")
        .filter(format!(
            "ts >= '{}' AND ts <= '{}' AND fingerprint IN ({candidate_fingerprints})",
            super::format_time(plan.start_ms, plan.utc),
            super::format_time(plan.end_ms, plan.utc),
        ))
        .group_by("fingerprint")
        .group_by("t")
        .order_by("fingerprint")
        .order_by("t")
        .build();

    let sample_rows = super::fetch_tolerant::<SampleRow>(backend.client(), &query_b).await?;

    let mut out: Vec<TimeSeries> = Vec::new();
    let mut last_fingerprint: Option<Fingerprint> = None;
    let mut last_ts_ms: i64 = 0;

    for row in sample_rows {
        let Some(labels) = labels_by_fingerprint.get(&row.fingerprint) else {
            tracing::warn!(fingerprint = row.fingerprint, "sample fingerprint has no metrics row, dropping");
            continue;
        };

        if last_fingerprint != Some(row.fingerprint) {
            out.push(TimeSeries {
                labels: labels.clone(),
                samples: Vec::new(),
            });
            last_fingerprint = Some(row.fingerprint);
            last_ts_ms = 0;
        } else if row.t == last_ts_ms {
            continue;
        }

        last_ts_ms = row.t;
        out.last_mut().unwrap().samples.push(Sample {
            value: row.value,
            timestamp_ms: row.t,
        });
    }

    Ok(out)
}
