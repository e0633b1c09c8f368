//! HTTP dispatcher: the axum router and its graceful-shutdown signal
//! handling.

mod error;
mod handlers;
mod state;

pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Binds `addr` and serves `/write`, `/read`, `/metrics` until
/// `shutdown_rx` fires, then waits for in-flight requests to finish.
pub async fn serve(
    addr: std::net::SocketAddr,
    state: AppState,
    shutdown_rx: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/write", post(handlers::write))
        .route("/read", post(handlers::read))
        .route("/metrics", get(handlers::metrics))
        .with_state(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("http dispatcher shut down");
    Ok(())
}

/// Resolves once any of SIGHUP/SIGINT/SIGTERM/SIGQUIT is received.
pub async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).expect("install SIGHUP handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("install SIGQUIT handler");

    tokio::select! {
        _ = hangup.recv() => tracing::info!("received SIGHUP"),
        _ = interrupt.recv() => tracing::info!("received SIGINT"),
        _ = terminate.recv() => tracing::info!("received SIGTERM"),
        _ = quit.recv() => tracing::info!("received SIGQUIT"),
    }
}
