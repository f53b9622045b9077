//! Prometheus metrics for Keyhold
//!
//! Exposes metrics at `/metrics` endpoint in Prometheus format.

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use keyhold_core::{Error, Result};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Metric names
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "keyhold_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "keyhold_http_request_duration_seconds";

    // Directory preview metrics
    pub const DIRECTORY_PREVIEWS_TOTAL: &str = "keyhold_directory_previews_total";
    pub const DIRECTORY_PREVIEW_DURATION_SECONDS: &str =
        "keyhold_directory_preview_duration_seconds";

    // Configuration changes
    pub const CONFIG_SAVES_TOTAL: &str = "keyhold_config_saves_total";

    // System metrics
    pub const UPTIME_SECONDS: &str = "keyhold_uptime_seconds";
    pub const INFO: &str = "keyhold_info";
}

/// Metrics recorder
#[derive(Clone)]
pub struct MetricsRecorder {
    handle: PrometheusHandle,
    start_time: Instant,
}

impl MetricsRecorder {
    /// Install the process-wide Prometheus recorder. Call once.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| Error::InternalError(format!("Failed to install metrics recorder: {}", e)))?;

        gauge!(names::INFO, "version" => keyhold_core::VERSION).set(1.0);

        Ok(Self::with_handle(handle))
    }

    /// Recorder that is not installed globally; renders an empty exposition
    pub fn detached() -> Self {
        Self::with_handle(PrometheusBuilder::new().build_recorder().handle())
    }

    fn with_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle,
            start_time: Instant::now(),
        }
    }

    /// Get metrics output in Prometheus format
    pub fn render(&self) -> String {
        gauge!(names::UPTIME_SECONDS).set(self.start_time.elapsed().as_secs_f64());

        self.handle.render()
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        counter!(
            names::HTTP_REQUESTS_TOTAL,
            "method" => method.to_string(),
            "route" => route.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            names::HTTP_REQUEST_DURATION_SECONDS,
            "method" => method.to_string(),
            "route" => route.to_string()
        )
        .record(duration_secs);
    }

    /// Record a directory preview; `outcome` is `success` or an error code
    pub fn record_preview(&self, outcome: &'static str, duration_secs: f64) {
        counter!(names::DIRECTORY_PREVIEWS_TOTAL, "outcome" => outcome).increment(1);
        histogram!(names::DIRECTORY_PREVIEW_DURATION_SECONDS).record(duration_secs);
    }

    pub fn record_config_save(&self, provider: &'static str) {
        counter!(names::CONFIG_SAVES_TOTAL, "provider" => provider).increment(1);
    }
}

/// Axum middleware for recording HTTP metrics
pub async fn metrics_middleware(
    State(metrics): State<Arc<MetricsRecorder>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Route templates keep the label set bounded
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();

    metrics.record_http_request(&method, &route, status, duration);

    debug!(
        method = %method,
        route = %route,
        status = %status,
        duration_ms = %(duration * 1000.0),
        "Request completed"
    );

    response
}

/// Handler for /metrics endpoint
pub async fn metrics_handler(State(metrics): State<Arc<MetricsRecorder>>) -> impl IntoResponse {
    let output = metrics.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}
