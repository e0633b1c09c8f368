//! Component wiring and process lifecycle: reads configuration, brings
//! up the backend registry, the writer, and the HTTP dispatcher, then
//! drives shutdown when a signal arrives.

use crate::backend::Registry as BackendRegistry;
use crate::config::Config;
use crate::http::{self, AppState};
use crate::metrics::Metrics;
use crate::writer::{TableLayout, Writers};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long shutdown waits for in-flight writer batches to drain
/// before giving up.
const SHUTDOWN_DRAIN_DEADLINE: Duration = Duration::from_secs(10);

pub struct Engine {
    config: Arc<Config>,
    writers: Arc<Writers>,
    shutdown_tx: oneshot::Sender<()>,
    server_handle: JoinHandle<()>,
}

impl Engine {
    /// Wires up backends, the writer, and the HTTP dispatcher, and
    /// starts serving. Returns an [`Engine`] handle whose [`Engine::wait`]
    /// blocks until a shutdown signal is received and everything has
    /// drained.
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let metrics = Arc::new(Metrics::new()?);
        let backends = BackendRegistry::spawn(&config.clickhouse_servers);

        let writer_defaults = config
            .clickhouse_servers
            .get(&config.writer.clickhouse)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("writer.clickhouse '{}' not configured", config.writer.clickhouse)
            })?;
        let reader_defaults = config
            .clickhouse_servers
            .get(&config.reader.clickhouse)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!("reader.clickhouse '{}' not configured", config.reader.clickhouse)
            })?;

        let writer_backend = backends
            .get(&config.writer.clickhouse)
            .await
            .ok_or_else(|| anyhow::anyhow!("writer backend not found"))?;
        let reader_backend = backends
            .get(&config.reader.clickhouse)
            .await
            .ok_or_else(|| anyhow::anyhow!("reader backend not found"))?;

        let layout = TableLayout::from(config.reader.mode);
        let writers = Writers::new(
            &backends,
            &config.writer.clickhouse,
            config.writer.clone(),
            layout,
            metrics.clone(),
        )
        .await?;

        let state = AppState {
            config: config.clone(),
            backends: backends.clone(),
            writer_backend,
            writer_defaults,
            writers: writers.clone(),
            reader_backend,
            reader_defaults,
            metrics,
        };

        let addr = config.server.addr;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let server_handle = tokio::spawn(async move {
            if let Err(err) = http::serve(addr, state, shutdown_rx).await {
                tracing::error!(error = %err, "http dispatcher exited with error");
            }
        });

        Ok(Self {
            config,
            writers,
            shutdown_tx,
            server_handle,
        })
    }

    /// Blocks until SIGHUP/SIGINT/SIGTERM/SIGQUIT is received, then
    /// stops accepting new HTTP connections, waits for in-flight
    /// requests to finish, and drains writer queues within
    /// [`SHUTDOWN_DRAIN_DEADLINE`].
    pub async fn wait(self) {
        http::wait_for_shutdown_signal().await;

        let _ = self.shutdown_tx.send(());
        let _ = self.server_handle.await;

        self.writers.shutdown(SHUTDOWN_DRAIN_DEADLINE).await;
        tracing::info!(addr = %self.config.server.addr, "engine stopped");
    }
}
