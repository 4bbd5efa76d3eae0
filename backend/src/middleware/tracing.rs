//! Request tracing middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Log each request with timing under a per-request id, echoed back in
/// `x-request-id`. An incoming id is reused so calls can be traced across
/// services.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %request_id);
    let start = Instant::now();

    let mut response = async move {
        tracing::debug!(method = %method, path = %path, "Request started");
        let response = next.run(request).await;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status().as_u16();
        if response.status().is_server_error() {
            tracing::error!(method = %method, path = %path, status, duration_ms, "Request completed with error");
        } else if response.status().is_client_error() {
            tracing::warn!(method = %method, path = %path, status, duration_ms, "Request completed with client error");
        } else {
            tracing::info!(method = %method, path = %path, status, duration_ms, "Request completed");
        }
        response
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}
