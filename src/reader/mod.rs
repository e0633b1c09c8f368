//! Read planning: common request resolution shared by the three
//! interchangeable query strategies, each in its own submodule.

mod mode1;
mod mode2;
mod mode3;

use crate::backend::Backend;
use crate::config::ReaderConfig;
use crate::proto::{Query, TimeSeries};
use chrono::{Local, TimeZone, Utc};
use clickhouse::{Client, Row};
use serde::Deserialize;

/// A fully-resolved query plan: everything the three reader modes need
/// to build their SQL and reassemble rows into series.
pub struct Plan<'a> {
    pub database: String,
    pub table: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub step: u32,
    pub matchers: &'a [crate::proto::LabelMatcher],
    pub utc: bool,
}

/// Resolves a plan from a decoded `Query` and an already-resolved
/// `database`/`table` pair. The wire `Query` message carries no
/// destination fields (Prometheus's remote-read protocol has none);
/// `database`/`table` come from the same query-string override
/// resolution the HTTP layer applies to `/write`, falling back to the
/// reader's configured defaults.
pub fn plan<'a>(query: &'a Query, config: &ReaderConfig, database: &str, table: &str) -> Plan<'a> {
    let step = compute_step(
        query.start_timestamp_ms,
        query.end_timestamp_ms,
        config.max_samples,
        config.min_step,
    );

    Plan {
        database: database.to_string(),
        table: table.to_string(),
        start_ms: query.start_timestamp_ms,
        end_ms: query.end_timestamp_ms,
        step,
        matchers: &query.matchers,
        utc: config.utc,
    }
}

fn compute_step(start_ms: i64, end_ms: i64, max_samples: u32, min_step: u32) -> u32 {
    let span_secs = ((end_ms - start_ms).max(0) / 1000) as u32;
    let computed = if max_samples > 0 {
        span_secs / max_samples
    } else {
        0
    };
    computed.max(min_step).max(1)
}

/// Formats a millisecond timestamp as `YYYY-MM-DD HH:MM:SS`, in UTC or
/// local time per configuration.
pub fn format_time(ts_ms: i64, utc: bool) -> String {
    let secs = ts_ms / 1000;
    if utc {
        Utc.timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    } else {
        Local
            .timestamp_opt(secs, 0)
            .single()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

/// Formats just the date portion, used by the dual-table mode's
/// `date >= .. AND date <= ..` predicate on the metrics table.
pub fn format_date(ts_ms: i64, utc: bool) -> String {
    format_time(ts_ms, utc)[..10].to_string()
}

/// Runs `sql` and collects every row that scans cleanly, logging and
/// skipping any row that fails to decode rather than aborting the
/// whole query. Only a failure of the query itself propagates as an
/// error; a bad row degrades the result, it doesn't fail it.
pub(crate) async fn fetch_tolerant<T>(client: &Client, sql: &str) -> anyhow::Result<Vec<T>>
where
    T: Row + for<'de> Deserialize<'de>,
{
    let mut cursor = client.query(sql).fetch::<T>()?;
    let mut rows = Vec::new();

    loop {
        match cursor.next().await {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, sql, "row scan/decode failed, skipping row and continuing");
            }
        }
    }

    Ok(rows)
}

/// Executes `plan` against `backend` using the configured mode and
/// returns the reassembled series.
///
/// A degenerate plan (`end < start`) is not treated as an error: it is
/// executed and simply returns no series, preserving the reference
/// implementation's behavior of responding with an empty result rather
/// than rejecting the request.
pub async fn execute(
    plan: &Plan<'_>,
    backend: &Backend,
    config: &ReaderConfig,
) -> anyhow::Result<Vec<TimeSeries>> {
    if plan.end_ms < plan.start_ms {
        tracing::warn!(
            start_ms = plan.start_ms,
            end_ms = plan.end_ms,
            "start time is after end time, returning empty result"
        );
        return Ok(Vec::new());
    }

    match config.mode {
        crate::config::ReaderMode::QuantileAggregated => mode1::run(plan, backend, config.quantile).await,
        crate::config::ReaderMode::StreamingOrdered => mode2::run(plan, backend).await,
        crate::config::ReaderMode::DualTableJoin => mode3::run(plan, backend).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_floors_at_min_step() {
        assert_eq!(compute_step(0, 1_000, 11_000, 15), 15);
    }

    #[test]
    fn step_scales_with_range() {
        // 11,000,000 seconds / 11,000 max samples = 1000s/sample.
        let step = compute_step(0, 11_000_000 * 1000, 11_000, 15);
        assert_eq!(step, 1000);
    }

    #[test]
    fn format_date_takes_first_ten_chars() {
        let date = format_date(0, true);
        assert_eq!(date.len(), 10);
        assert_eq!(date, "1970-01-01");
    }
}
