//! Request middleware: correlation ids and metrics

use crate::config::AppConfig;
use crate::metrics::{Metrics, UNMATCHED_ROUTE};
use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, info};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id of the current request, available as a request extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept a client-supplied id if it is well formed
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = !raw.is_empty()
            && raw.len() <= MAX_REQUEST_ID_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reuse or mint the request id, run the rest of the stack inside a span that
/// carries it and the service identity, and echo it on the response together
/// with the elapsed time
pub async fn request_id(
    State(app): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RequestId::parse)
        .unwrap_or_else(RequestId::generate);

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "http.request",
        service = %app.name,
        environment = app.environment.as_str(),
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let started = Instant::now();
    let mut response = async {
        info!("Request started");
        let response = next.run(request).await;
        info!(
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await;

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        headers.insert(REQUEST_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{elapsed_ms:.2}ms")) {
        headers.insert(RESPONSE_TIME_HEADER, value);
    }
    response
}

/// Count, time and track in-flight requests per route template
pub async fn record_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/metrics" {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_string(), |p| p.as_str().to_string());

    let started = Instant::now();
    let response = {
        let _in_progress = metrics.track_in_progress(&method, &route);
        next.run(request).await
    };

    metrics.observe_request(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
