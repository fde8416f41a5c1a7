//! Admin Server - Feed Service HTTP Surface
//!
//! Routes (axum 0.7):
//! - `GET  /health`      liveness plus current cycle phase
//! - `GET  /ready`       503 while stopping or a dependency is down
//! - `GET  /oracle/data` tracked ports with their stored records
//! - `POST /oracle/update` run (or join) a feed cycle now
//! - `GET  /metrics`     Prometheus text exposition
//!
//! Handlers are plain async functions so tests can call them directly.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, instrument};

use crate::adapters::metrics::FeedMetrics;
use crate::usecases::feed_service::{DependencyHealth, FeedError, FeedPhase, OracleFeedService};
use crate::usecases::oracle_store::OracleStore;

/// Shared state for all admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<OracleFeedService>,
    pub store: Arc<RwLock<OracleStore>>,
    pub metrics: Option<Arc<FeedMetrics>>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub phase: FeedPhase,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub stopping: bool,
    pub dependencies: DependencyHealth,
}

/// Presentation view of one port record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortView {
    pub performance_index: u32,
    /// e.g. `"75.0%"`.
    pub performance_percent: String,
    pub last_updated_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct OracleDataResponse {
    pub success: bool,
    pub data: BTreeMap<String, PortView>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub succeeded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

/// Build the admin router.
pub fn router(state: AdminState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .route("/oracle/data", get(oracle_data))
        .route("/oracle/update", post(trigger_update))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the admin router until `shutdown_rx` fires.
#[instrument(skip(state, shutdown_rx))]
pub async fn serve(
    state: AdminState,
    bind_address: String,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "Admin server started");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    info!("Admin server stopped");
    Ok(())
}

/// Liveness: always 200 while the process runs.
pub async fn health(State(state): State<AdminState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        phase: state.service.phase(),
        timestamp: Utc::now(),
    })
}

/// Readiness: 200 only when the source and store are healthy and the
/// service is not stopping.
pub async fn readiness(State(state): State<AdminState>) -> (StatusCode, Json<ReadyResponse>) {
    let dependencies = state.service.dependency_health().await;
    let stopping = state.service.is_stopping();
    let ready = dependencies.all_healthy() && !stopping;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready,
            stopping,
            dependencies,
        }),
    )
}

/// Stored records for every tracked port.
pub async fn oracle_data(State(state): State<AdminState>) -> Json<OracleDataResponse> {
    let store = state.store.read().await;
    let data = state
        .service
        .tracked_ports()
        .iter()
        .map(|port| {
            let record = store.get_port_data(port);
            (
                port.to_string(),
                PortView {
                    performance_index: record.performance_index.value(),
                    performance_percent: record.performance_index.percent_label(),
                    last_updated_at: record.last_updated_at,
                    active: record.active,
                },
            )
        })
        .collect();

    Json(OracleDataResponse {
        success: true,
        data,
    })
}

/// Run a feed cycle now, or join/reject per the trigger policy.
pub async fn trigger_update(State(state): State<AdminState>) -> (StatusCode, Json<UpdateResponse>) {
    match state.service.trigger().await {
        Ok(report) => (
            StatusCode::OK,
            Json(UpdateResponse {
                success: true,
                message: format!(
                    "Oracle data updated: {} succeeded, {} failed",
                    report.succeeded(),
                    report.failed()
                ),
                succeeded: Some(report.succeeded()),
                failed: Some(report.failed()),
            }),
        ),
        Err(e) => {
            // Per-port failures land in the report, never here.
            let status = match e {
                FeedError::CycleInProgress => StatusCode::CONFLICT,
                _ => StatusCode::SERVICE_UNAVAILABLE,
            };
            (
                status,
                Json(UpdateResponse {
                    success: false,
                    message: e.to_string(),
                    succeeded: None,
                    failed: None,
                }),
            )
        }
    }
}

/// Prometheus text exposition, 404 when metrics are disabled.
pub async fn metrics(State(state): State<AdminState>) -> Response {
    let Some(metrics) = state.metrics.as_ref() else {
        return (StatusCode::NOT_FOUND, "metrics disabled").into_response();
    };
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}
