//! HTTP-facing error type mapping internal failures to status codes.

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};

#[derive(Debug)]
pub enum DispatchError {
    /// Snappy decompression of the request body failed.
    Decompress(String),
    /// Protobuf decoding of an (already decompressed) request body
    /// failed, or a query-string destination override was malformed.
    Decode(String),
    /// The backend required for this request is currently unhealthy.
    Unhealthy(String),
    /// The query ran but failed against the backend — distinct from a
    /// malformed request, since the client did nothing wrong.
    QueryFailed(String),
    /// Encoding or compressing a `/read` response failed.
    Encode(String),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response<Body> {
        let (status, message) = match self {
            DispatchError::Decompress(msg) => (StatusCode::BAD_REQUEST, msg),
            DispatchError::Decode(msg) => (StatusCode::BAD_REQUEST, msg),
            DispatchError::Unhealthy(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            DispatchError::QueryFailed(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            DispatchError::Encode(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        tracing::error!(%status, %message, "dispatch error");

        Response::builder()
            .status(status)
            .body(Body::from(message))
            .unwrap_or_else(|_| Response::new(Body::from("internal error building error response")))
    }
}
