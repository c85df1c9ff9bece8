//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, stream status reporting, and Prometheus metrics.
//! Used by container orchestrators, load balancers, and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (any stream active)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::infrastructure::bitzlato::FeedStatus;
use crate::infrastructure::broadcast::SharedEventHub;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Per-stream status.
    pub streams: Vec<StreamInfo>,
    /// Attached event consumers.
    pub event_receivers: usize,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every stream active.
    Healthy,
    /// Some streams active.
    Degraded,
    /// No stream active.
    Unhealthy,
}

/// Individual stream status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    /// Stream name.
    pub stream: String,
    /// Session state.
    pub state: String,
    /// Whether the stream is receiving.
    pub active: bool,
    /// Frames received across sessions.
    pub messages_received: u64,
    /// Reconnects so far.
    pub reconnects: u64,
    /// Last frame time.
    pub last_message_at: Option<DateTime<Utc>>,
    /// Last session failure.
    pub last_error: Option<String>,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    streams: Vec<Arc<FeedStatus>>,
    event_hub: SharedEventHub,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, streams: Vec<Arc<FeedStatus>>, event_hub: SharedEventHub) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            streams,
            event_hub,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Routes served by the health server.
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.streams.iter().any(|s| s.is_active()) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let streams: Vec<StreamInfo> = state.streams.iter().map(|s| stream_info(s)).collect();

    HealthResponse {
        status: determine_health_status(&streams),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        streams,
        event_receivers: state.event_hub.receiver_count(),
    }
}

fn stream_info(status: &FeedStatus) -> StreamInfo {
    let state = status.state();
    StreamInfo {
        stream: status.kind().as_str().to_string(),
        state: state.as_str().to_string(),
        active: status.is_active(),
        messages_received: status.messages_received(),
        reconnects: status.reconnects(),
        last_message_at: status.last_message_at(),
        last_error: status.last_error(),
    }
}

fn determine_health_status(streams: &[StreamInfo]) -> HealthStatus {
    let active = streams.iter().filter(|s| s.active).count();

    match active {
        0 => HealthStatus::Unhealthy,
        n if n == streams.len() => HealthStatus::Healthy,
        _ => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
