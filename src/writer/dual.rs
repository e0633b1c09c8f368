//! Dual-table writer consumer (mode 3): a metrics table keyed by
//! fingerprint (one row per observed label-set, emitted once per
//! retention window by the fingerprint cache in `enqueue`) and a
//! samples table keyed by fingerprint and timestamp.

use super::{Destination, Entry, Fingerprint, WriteItem, Writers};
use clickhouse::Row;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Row, Serialize)]
struct MetricRow {
    #[serde(with = "clickhouse::serde::time::datetime")]
    date: OffsetDateTime,
    name: String,
    tags: Vec<String>,
    fingerprint: Fingerprint,
}

#[derive(Row, Serialize)]
struct SampleRow {
    fingerprint: Fingerprint,
    #[serde(with = "clickhouse::serde::time::datetime")]
    ts: OffsetDateTime,
    val: f64,
}

impl From<&WriteItem> for SampleRow {
    fn from(item: &WriteItem) -> Self {
        // Preserved bug: the second argument to a Unix-timestamp
        // constructor is nanoseconds, but the source passes the
        // millisecond remainder (0-999) directly, truncating
        // sub-second precision to well under a microsecond instead of
        // scaling it up. Not fixed per the accompanying design note.
        let seconds = item.timestamp_ms / 1000;
        let bogus_nanos = (item.timestamp_ms % 1000) as i32;
        let ts = OffsetDateTime::from_unix_timestamp(seconds)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
            + Duration::from_nanos(bogus_nanos.max(0) as u64);
        Self {
            fingerprint: item.fingerprint,
            ts,
            val: item.value,
        }
    }
}

pub(super) async fn run(writer: Arc<Writers>, destination: Destination, mut rx: mpsc::Receiver<Entry>) {
    let tag = format!("writer[{}]->{destination} (dual)", writer.backend.name);
    tracing::info!(%tag, "started");

    let metrics_table = format!("{}.{}_metrics", destination.database, destination.table);
    let samples_table = format!("{}.{}_samples", destination.database, destination.table);

    let mut ticker = interval(Duration::from_secs(1));
    let mut metrics_batch: Vec<(String, Vec<String>, Fingerprint)> = Vec::new();
    let mut samples_batch: Vec<WriteItem> = Vec::new();
    let mut total_written: u64 = 0;
    let mut closed = false;

    while !closed {
        let batch_start = Instant::now();
        let target = writer.config.batch;

        while metrics_batch.len() + samples_batch.len() < target {
            tokio::select! {
                entry = rx.recv() => match entry {
                    Some(Entry::Sample(item)) => samples_batch.push(item),
                    Some(Entry::Metric { name, tags, fingerprint }) => {
                        metrics_batch.push((name, tags, fingerprint));
                    }
                    None => { closed = true; break; }
                },
                _ = ticker.tick() => {
                    if !metrics_batch.is_empty() || !samples_batch.is_empty() {
                        break;
                    }
                }
            }

            if writer.config.wait > 0
                && batch_start.elapsed() > Duration::from_secs(writer.config.wait as u64)
            {
                break;
            }
        }

        if metrics_batch.is_empty() && samples_batch.is_empty() {
            continue;
        }

        let flush_start = Instant::now();
        let nsamples = samples_batch.len();
        let nmetrics = metrics_batch.len();

        if !samples_batch.is_empty() {
            match flush_samples(&writer, &destination, &samples_table, &samples_batch).await {
                Ok(()) => {
                    total_written += nsamples as u64;
                    writer.metrics.write_samples_total.inc_by(nsamples as u64);
                    writer
                        .metrics
                        .write_batch_duration_seconds
                        .observe(flush_start.elapsed().as_secs_f64());
                    tracing::info!(%tag, nsamples, total_written, "wrote samples");
                    samples_batch.clear();
                }
                Err(err) => {
                    tracing::error!(%tag, error = %err, "sample batch failed, will retry");
                    writer.metrics.write_failed_samples_total.inc_by(nsamples as u64);
                }
            }
        }

        if !metrics_batch.is_empty() {
            match flush_metrics(&writer, &destination, &metrics_table, &metrics_batch).await {
                Ok(()) => {
                    tracing::info!(%tag, nmetrics, "wrote metric rows");
                    metrics_batch.clear();
                }
                Err(err) => {
                    tracing::error!(%tag, error = %err, "metric batch failed, will retry");
                }
            }
        }
    }

    tracing::info!(%tag, "stopped");
}

async fn flush_samples(
    writer: &Writers,
    destination: &Destination,
    table: &str,
    batch: &[WriteItem],
) -> anyhow::Result<()> {
    match write_samples(writer, table, batch).await {
        Ok(()) => Ok(()),
        Err(err) if super::is_missing_schema_error(&err.to_string()) => {
            bootstrap(writer, destination).await?;
            write_samples(writer, table, batch).await
        }
        Err(err) => Err(err),
    }
}

async fn flush_metrics(
    writer: &Writers,
    destination: &Destination,
    table: &str,
    batch: &[(String, Vec<String>, Fingerprint)],
) -> anyhow::Result<()> {
    match write_metrics(writer, table, batch).await {
        Ok(()) => Ok(()),
        Err(err) if super::is_missing_schema_error(&err.to_string()) => {
            bootstrap(writer, destination).await?;
            write_metrics(writer, table, batch).await
        }
        Err(err) => Err(err),
    }
}

async fn write_samples(writer: &Writers, table: &str, batch: &[WriteItem]) -> anyhow::Result<()> {
    let mut insert = writer.backend.client().insert::<SampleRow>(table)?;
    for item in batch {
        insert.write(&SampleRow::from(item)).await?;
    }
    insert.end().await?;
    Ok(())
}

async fn write_metrics(
    writer: &Writers,
    table: &str,
    batch: &[(String, Vec<String>, Fingerprint)],
) -> anyhow::Result<()> {
    let mut insert = writer.backend.client().insert::<MetricRow>(table)?;
    let now = OffsetDateTime::now_utc();
    for (name, tags, fingerprint) in batch {
        let mut tags = tags.clone();
        tags.sort();
        insert
            .write(&MetricRow {
                date: now,
                name: name.clone(),
                tags,
                fingerprint: *fingerprint,
            })
            .await?;
    }
    insert.end().await?;
    Ok(())
}

async fn bootstrap(writer: &Writers, destination: &Destination) -> anyhow::Result<()> {
    for stmt in crate::sql::dual_table_schema(&destination.database, &destination.table) {
        writer.backend.execute(&stmt).await?;
    }
    Ok(())
}
