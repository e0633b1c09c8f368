//! Shared application state handed to every handler via axum's
//! `State` extractor.

use crate::backend::{Backend, Registry as BackendRegistry};
use crate::config::{ClickhouseServerConfig, Config};
use crate::metrics::Metrics;
use crate::writer::Writers;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backends: Arc<BackendRegistry>,
    pub writer_backend: Arc<Backend>,
    pub writer_defaults: ClickhouseServerConfig,
    pub writers: Arc<Writers>,
    pub reader_backend: Arc<Backend>,
    pub reader_defaults: ClickhouseServerConfig,
    pub metrics: Arc<Metrics>,
}
