//! Named ClickHouse backends and their connection supervisors.

mod supervisor;

use crate::config::ClickhouseServerConfig;
use clickhouse::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

pub use supervisor::run_supervisor;

/// Non-blocking reconnect-signal channel capacity. Sized to absorb a
/// burst of failed queries between supervisor ticks without blocking
/// the callers that signal it.
const SIGNAL_CHANNEL_CAPACITY: usize = 16;

/// A single named ClickHouse backend: its client handle, health flag,
/// and the channel used to nudge its supervisor into an immediate
/// reconnect attempt.
pub struct Backend {
    pub name: String,
    client: Client,
    healthy: AtomicBool,
    used: AtomicBool,
    signal_tx: mpsc::Sender<()>,
}

impl Backend {
    fn new(name: String, cfg: &ClickhouseServerConfig) -> (Arc<Self>, mpsc::Receiver<()>) {
        let client = Client::default()
            .with_url(cfg.build_dsn())
            .with_user(&cfg.user)
            .with_password(&cfg.passwd)
            .with_database(&cfg.database)
            .with_option("http_receive_timeout", cfg.read_timeout.as_secs().to_string())
            .with_option("http_send_timeout", cfg.write_timeout.as_secs().to_string());

        if !cfg.alt_hosts.is_empty() {
            tracing::warn!(
                name,
                alt_hosts = ?cfg.alt_hosts,
                "alt_hosts configured but the HTTP-interface driver has no multi-host failover; ignoring"
            );
        }

        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_CHANNEL_CAPACITY);

        let backend = Arc::new(Self {
            name,
            client,
            healthy: AtomicBool::new(false),
            used: AtomicBool::new(false),
            signal_tx,
        });

        (backend, signal_rx)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    /// Requests an out-of-band reconnect attempt. Never blocks: if the
    /// supervisor hasn't drained the previous signal yet, this one is
    /// simply dropped, since one pending signal already means "check
    /// again soon".
    pub fn signal_reconnect(&self) {
        let _ = self.signal_tx.try_send(());
    }

    fn mark_used(&self) {
        self.used.store(true, Ordering::Relaxed);
    }

    fn is_used(&self) -> bool {
        self.used.load(Ordering::Relaxed)
    }

    /// Runs `query` against this backend. Returns an error without
    /// touching the network if the backend is currently marked
    /// unhealthy, signalling the supervisor to retry before returning.
    pub async fn execute(&self, query: &str) -> anyhow::Result<()> {
        if !self.is_healthy() {
            self.signal_reconnect();
            anyhow::bail!("backend '{}' is unhealthy", self.name);
        }

        self.client.query(query).execute().await.map_err(|e| {
            self.set_healthy(false);
            self.signal_reconnect();
            anyhow::anyhow!("backend '{}': {e}", self.name)
        })
    }
}

/// Registry of all configured backends, keyed by name.
pub struct Registry {
    backends: RwLock<HashMap<String, Arc<Backend>>>,
}

impl Registry {
    /// Builds a registry from configuration and spawns one supervisor
    /// task per backend.
    pub fn spawn(servers: &HashMap<String, ClickhouseServerConfig>) -> Arc<Self> {
        let mut backends = HashMap::new();

        for (name, cfg) in servers {
            let (backend, signal_rx) = Backend::new(name.clone(), cfg);
            tokio::spawn(run_supervisor(backend.clone(), signal_rx));
            backends.insert(name.clone(), backend);
        }

        Arc::new(Self {
            backends: RwLock::new(backends),
        })
    }

    /// Looks up a backend by name, marking it as in-use so its
    /// supervisor begins actively polling. Returns `None` if no backend
    /// with that name was configured.
    pub async fn get(&self, name: &str) -> Option<Arc<Backend>> {
        let backends = self.backends.read().await;
        let backend = backends.get(name)?.clone();
        backend.mark_used();
        Some(backend)
    }
}
