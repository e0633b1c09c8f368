//! Single-table writer consumer (modes 1/2): one row per sample.

use super::{Destination, Entry, WriteItem, Writers};
use clickhouse::Row;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::interval;

#[derive(Row, Serialize)]
struct SampleRow {
    #[serde(with = "clickhouse::serde::time::datetime")]
    date: OffsetDateTime,
    name: String,
    tags: Vec<String>,
    val: f64,
    #[serde(with = "clickhouse::serde::time::datetime")]
    ts: OffsetDateTime,
}

impl From<&WriteItem> for SampleRow {
    fn from(item: &WriteItem) -> Self {
        // Correct ms -> (seconds, nanos) split; see dual.rs for the
        // preserved bug in the dual-table writer.
        let ts = OffsetDateTime::from_unix_timestamp(item.timestamp_ms / 1000)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let mut tags = item.tags.clone();
        tags.sort();
        Self {
            date: ts,
            name: item.name.clone(),
            tags,
            val: item.value,
            ts,
        }
    }
}

pub(super) async fn run(writer: Arc<Writers>, destination: Destination, mut rx: mpsc::Receiver<Entry>) {
    let tag = format!("writer[{}]->{destination}", writer.backend.name);
    tracing::info!(%tag, "started");

    let table = format!("{}.{}", destination.database, destination.table);
    let mut ticker = interval(Duration::from_secs(1));
    let mut batch: Vec<WriteItem> = Vec::new();
    let mut total_written: u64 = 0;
    let mut closed = false;

    while !closed {
        let batch_start = Instant::now();

        while batch.len() < writer.config.batch {
            tokio::select! {
                entry = rx.recv() => match entry {
                    Some(Entry::Sample(item)) => batch.push(item),
                    // The single-table layout never produces Metric
                    // entries; see Writers::enqueue.
                    Some(Entry::Metric { .. }) => {}
                    None => { closed = true; break; }
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() {
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

        if batch.is_empty() {
            continue;
        }

        let nmetrics = batch.len();
        let flush_start = Instant::now();

        match flush(&writer, &destination, &table, &batch).await {
            Ok(()) => {
                total_written += nmetrics as u64;
                writer.metrics.write_samples_total.inc_by(nmetrics as u64);
                writer
                    .metrics
                    .write_batch_duration_seconds
                    .observe(flush_start.elapsed().as_secs_f64());
                tracing::info!(%tag, nmetrics, total_written, "write ok");
                batch.clear();
            }
            Err(err) => {
                tracing::error!(%tag, error = %err, "batch failed, will retry");
                writer.metrics.write_failed_samples_total.inc_by(nmetrics as u64);
                // Batch is kept: at-least-once delivery on commit failure.
            }
        }
    }

    tracing::info!(%tag, "stopped");
}

async fn flush(
    writer: &Writers,
    destination: &Destination,
    table: &str,
    batch: &[WriteItem],
) -> anyhow::Result<()> {
    match write_batch(writer, table, batch).await {
        Ok(()) => Ok(()),
        Err(err) if super::is_missing_schema_error(&err.to_string()) => {
            bootstrap(writer, destination).await?;
            write_batch(writer, table, batch).await
        }
        Err(err) => Err(err),
    }
}

async fn write_batch(writer: &Writers, table: &str, batch: &[WriteItem]) -> anyhow::Result<()> {
    let mut insert = writer.backend.client().insert::<SampleRow>(table)?;
    for item in batch {
        insert.write(&SampleRow::from(item)).await?;
    }
    insert.end().await?;
    Ok(())
}

async fn bootstrap(writer: &Writers, destination: &Destination) -> anyhow::Result<()> {
    for stmt in crate::sql::single_table_schema(&destination.database, &destination.table) {
        writer.backend.execute(&stmt).await?;
    }
    Ok(())
}
