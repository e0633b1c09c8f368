//! Prometheus remote-storage adapter for a columnar analytical
//! database: a small HTTP service that accepts Prometheus
//! remote_write/remote_read protobuf-over-snappy requests and
//! translates them into SQL.
//!
//! Architecture:
//! - `backend`: per-server connection health tracking and reconnect supervision
//! - `writer`: per-destination batching and flush to the backend
//! - `reader`: query planning across the three supported read strategies
//! - `http`: the axum dispatcher wiring `/write`, `/read`, `/metrics`
//! - `engine`: brings the above up together and drives shutdown

mod backend;
mod cache;
mod cli;
mod config;
mod engine;
mod fingerprint;
mod http;
mod labels;
mod logging;
mod metrics;
mod proto;
mod reader;
mod sql;
mod wire;
mod writer;

use clap::Parser;
use cli::Cli;
use config::Config;
use engine::Engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config_file);

    let _log_guard = logging::init(&config.logger)?;

    tracing::info!(config_file = %cli.config_file.display(), "starting");

    let engine = Engine::start(config).await?;
    engine.wait().await;

    Ok(())
}
