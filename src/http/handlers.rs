//! `/write`, `/read`, `/metrics` handlers.

use super::error::DispatchError;
use super::state::AppState;
use crate::config::ClickhouseServerConfig;
use crate::fingerprint;
use crate::labels::{self, Label};
use crate::proto::{QueryResult, ReadRequest, ReadResponse, WriteRequest};
use crate::writer::{Destination, WriteItem};
use axum::extract::{Query as AxumQuery, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use std::collections::HashMap;

/// Maps a wire-decode failure to its status-code-bearing variant: a
/// snappy failure is `Decompress`, a protobuf failure is `Decode`.
fn map_wire_error(err: crate::wire::WireError) -> DispatchError {
    match &err {
        crate::wire::WireError::Decompress(_) => DispatchError::Decompress(err.to_string()),
        crate::wire::WireError::Decode(_) => DispatchError::Decode(err.to_string()),
    }
}

/// `?db=`/`?table=` query-string overrides, falling back to a
/// backend's configured defaults.
fn resolve_destination(
    params: &HashMap<String, String>,
    defaults: &ClickhouseServerConfig,
) -> Result<Destination, DispatchError> {
    let database = params
        .get("db")
        .cloned()
        .unwrap_or_else(|| defaults.database.clone());
    let table = params
        .get("table")
        .cloned()
        .unwrap_or_else(|| defaults.table.clone());

    if database.is_empty() || table.is_empty() {
        return Err(DispatchError::Decode(
            "destination db/table must not be empty".to_string(),
        ));
    }

    Ok(Destination { database, table })
}

pub async fn write(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Result<axum::http::StatusCode, DispatchError> {
    if !state.writer_backend.is_healthy() {
        return Err(DispatchError::Unhealthy(
            "writer backend is unhealthy".to_string(),
        ));
    }

    let destination = resolve_destination(&params, &state.writer_defaults)?;

    let request: WriteRequest = crate::wire::decode(&body).map_err(map_wire_error)?;

    for series in request.timeseries {
        let wire_labels: Vec<Label> = series
            .labels
            .iter()
            .map(|l| Label::new(l.name.clone(), l.value.clone()))
            .collect();

        let name = labels::metric_name(&wire_labels).unwrap_or_default().to_string();
        let tags = labels::to_tag_strings(&wire_labels);
        let fingerprint = fingerprint::compute(&wire_labels);

        for sample in &series.samples {
            let item = WriteItem {
                name: name.clone(),
                tags: tags.clone(),
                value: sample.value,
                timestamp_ms: sample.timestamp_ms,
                fingerprint,
            };

            state
                .writers
                .enqueue(destination.clone(), item)
                .await
                .map_err(|e| DispatchError::Unhealthy(e.to_string()))?;
        }
    }

    Ok(axum::http::StatusCode::OK)
}

pub async fn read(
    State(state): State<AppState>,
    AxumQuery(params): AxumQuery<HashMap<String, String>>,
    body: axum::body::Bytes,
) -> Result<axum::response::Response, DispatchError> {
    if !state.reader_backend.is_healthy() {
        return Err(DispatchError::Unhealthy(
            "reader backend is unhealthy".to_string(),
        ));
    }

    let destination = resolve_destination(&params, &state.reader_defaults)?;

    let request: ReadRequest = crate::wire::decode(&body).map_err(map_wire_error)?;

    let mut results = Vec::with_capacity(request.queries.len());
    for query in &request.queries {
        let plan = crate::reader::plan(
            query,
            &state.config.reader,
            &destination.database,
            &destination.table,
        );
        let timeseries = crate::reader::execute(&plan, &state.reader_backend, &state.config.reader)
            .await
            .map_err(|e| DispatchError::QueryFailed(e.to_string()))?;
        results.push(QueryResult { timeseries });
    }

    let response = ReadResponse { results };
    let encoded = crate::wire::encode(&response);

    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", "application/x-protobuf".parse().unwrap());
    headers.insert("Content-Encoding", "snappy".parse().unwrap());

    Ok((headers, encoded).into_response())
}

pub async fn metrics(State(state): State<AppState>) -> Result<String, DispatchError> {
    state
        .metrics
        .render()
        .map_err(|e| DispatchError::Encode(e.to_string()))
}
