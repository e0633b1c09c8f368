//! Per-destination batching writer: samples are enqueued per
//! `db.table` destination and flushed to ClickHouse by a dedicated
//! consumer task, transactionally, on a size-or-time trigger.

mod dual;
mod single;

use crate::backend::{Backend, Registry as BackendRegistry};
use crate::cache::FingerprintCache;
use crate::config::{ReaderMode, WriterConfig};
use crate::fingerprint::Fingerprint;
use crate::metrics::Metrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// How long a fingerprint is remembered in a destination's metrics-row
/// dedup cache before it is eligible for re-emission.
const FINGERPRINT_HOLD_TIME: Duration = Duration::from_secs(24 * 60 * 60);

/// One sample as handed off from the dispatcher to a destination's
/// writer task.
#[derive(Debug, Clone)]
pub struct WriteItem {
    pub name: String,
    /// Label pairs other than `__name__`, as sorted `"key=value"`
    /// strings (same order every time, since sort order can affect
    /// how the storage engine indexes the array column).
    pub tags: Vec<String>,
    pub value: f64,
    pub timestamp_ms: i64,
    pub fingerprint: Fingerprint,
}

/// One element of a destination's input queue: either a sample to
/// insert, or, in dual-table mode, a metric-dimension row to insert
/// the first time a fingerprint is observed in a retention window.
#[derive(Debug, Clone)]
pub enum Entry {
    Sample(WriteItem),
    Metric {
        name: String,
        tags: Vec<String>,
        fingerprint: Fingerprint,
    },
}

/// Whether a destination's writer persists into one combined table
/// (modes 1/2) or a metrics/samples pair joined by fingerprint
/// (mode 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    Single,
    Dual,
}

impl From<ReaderMode> for TableLayout {
    fn from(mode: ReaderMode) -> Self {
        match mode {
            ReaderMode::QuantileAggregated | ReaderMode::StreamingOrdered => TableLayout::Single,
            ReaderMode::DualTableJoin => TableLayout::Dual,
        }
    }
}

/// A `db.table` destination key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub database: String,
    pub table: String,
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

struct DestinationState {
    sender: mpsc::Sender<Entry>,
    /// Only populated (and only consulted) for [`TableLayout::Dual`].
    fingerprints: Option<FingerprintCache>,
}

/// Spawns and tracks one writer task per destination, creating them
/// lazily on first use.
pub struct Writers {
    backend: Arc<Backend>,
    config: WriterConfig,
    layout: TableLayout,
    metrics: Arc<Metrics>,
    destinations: Mutex<HashMap<Destination, DestinationState>>,
    handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Writers {
    pub async fn new(
        backends: &BackendRegistry,
        backend_name: &str,
        config: WriterConfig,
        layout: TableLayout,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Arc<Self>> {
        let backend = backends
            .get(backend_name)
            .await
            .ok_or_else(|| anyhow::anyhow!("backend '{backend_name}' not found"))?;

        Ok(Arc::new(Self {
            backend,
            config,
            layout,
            metrics,
            destinations: Mutex::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
        }))
    }

    /// Closes every destination's queue and waits (up to `deadline`)
    /// for their consumer tasks to drain and exit.
    pub async fn shutdown(&self, deadline: Duration) {
        self.destinations.lock().await.clear();
        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        if tokio::time::timeout(deadline, wait_all).await.is_err() {
            tracing::warn!("writer shutdown deadline exceeded, some batches may be lost");
        }
    }

    /// Enqueues `item` for `destination`, spawning that destination's
    /// consumer task on first use.
    ///
    /// In dual-table mode this also consults (and updates) that
    /// destination's fingerprint cache, under the same lock that guards
    /// destination creation, so the cache sees a strictly time-ordered
    /// sequence of insertions per [`FingerprintCache::shrink`]'s
    /// requirement.
    pub async fn enqueue(self: &Arc<Self>, destination: Destination, item: WriteItem) -> anyhow::Result<()> {
        self.metrics.received_samples_total.inc();

        let mut destinations = self.destinations.lock().await;
        let state = match destinations.get_mut(&destination) {
            Some(state) => state,
            None => {
                let (tx, rx) = mpsc::channel(self.config.buffer);
                self.spawn_consumer(destination.clone(), rx);
                let fingerprints = match self.layout {
                    TableLayout::Dual => Some(FingerprintCache::new(FINGERPRINT_HOLD_TIME)),
                    TableLayout::Single => None,
                };
                destinations.insert(
                    destination.clone(),
                    DestinationState {
                        sender: tx,
                        fingerprints,
                    },
                );
                destinations.get_mut(&destination).unwrap()
            }
        };

        let is_new_fingerprint = match &mut state.fingerprints {
            Some(cache) => {
                let is_new = cache.cache(item.fingerprint);
                cache.shrink();
                is_new
            }
            None => false,
        };
        let sender = state.sender.clone();
        drop(destinations);

        if is_new_fingerprint {
            sender
                .send(Entry::Metric {
                    name: item.name.clone(),
                    tags: item.tags.clone(),
                    fingerprint: item.fingerprint,
                })
                .await
                .map_err(|_| anyhow::anyhow!("writer for {destination} has stopped"))?;
        }

        sender
            .send(Entry::Sample(item))
            .await
            .map_err(|_| anyhow::anyhow!("writer for {destination} has stopped"))
    }

    fn spawn_consumer(self: &Arc<Self>, destination: Destination, rx: mpsc::Receiver<Entry>) {
        let this = self.clone();
        let handle = match this.layout {
            TableLayout::Single => tokio::spawn(single::run(this, destination, rx)),
            TableLayout::Dual => tokio::spawn(dual::run(this, destination, rx)),
        };
        // Lock is uncontended here: spawn_consumer only runs while the
        // caller already holds `destinations` locked in `enqueue`.
        if let Ok(mut handles) = self.handles.try_lock() {
            handles.push(handle);
        }
    }
}

/// Matches `(Database|Table) .* doesn't exist` against a ClickHouse
/// error message, the signal that a destination needs its schema
/// bootstrapped before the batch can be retried.
pub(crate) fn is_missing_schema_error(message: &str) -> bool {
    crate::sql::is_missing_schema_error(message)
}
