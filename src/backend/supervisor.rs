//! Per-backend connection supervisor: a background task that keeps
//! `Backend::healthy` accurate without every caller re-dialing on each
//! query.

use super::Backend;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Floor between reconnect attempts, regardless of how many signals
/// arrive in between.
const MIN_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);
/// How long an unchanged connect error is suppressed before being
/// logged again, so a backend that's been down for an hour doesn't
/// spam the log once a second.
const ERROR_LOG_REPEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Runs until `signal_rx` closes (i.e. the owning [`Backend`] and its
/// [`Registry`](super::Registry) are dropped).
pub async fn run_supervisor(backend: Arc<Backend>, mut signal_rx: mpsc::Receiver<()>) {
    let mut last_check = Instant::now() - MIN_RECONNECT_INTERVAL;
    let mut last_error: Option<String> = None;
    let mut last_logged_at = Instant::now() - ERROR_LOG_REPEAT_INTERVAL;

    loop {
        let signalled = tokio::select! {
            signal = signal_rx.recv() => match signal {
                Some(()) => true,
                None => return,
            },
            _ = sleep(Duration::from_secs(1)) => false,
        };

        if !backend.is_used() {
            continue;
        }

        let now = Instant::now();
        if now.duration_since(last_check) < MIN_RECONNECT_INTERVAL {
            continue;
        }
        if backend.is_healthy() && !signalled {
            continue;
        }

        last_check = now;

        match try_connect(&backend).await {
            Ok(()) => {
                tracing::info!(backend = %backend.name, "connected ok");
                backend.set_healthy(true);
                last_error = None;
            }
            Err(err) => {
                backend.set_healthy(false);
                let message = err.to_string();
                let changed = last_error.as_deref() != Some(message.as_str());
                let stale = Instant::now().duration_since(last_logged_at) > ERROR_LOG_REPEAT_INTERVAL;
                if changed || stale {
                    tracing::error!(backend = %backend.name, error = %message, "connect failed");
                    last_logged_at = Instant::now();
                    last_error = Some(message);
                }
            }
        }
    }
}

async fn try_connect(backend: &Backend) -> anyhow::Result<()> {
    backend
        .client()
        .query("SELECT 1")
        .execute()
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}
