//! Daemon HTTP endpoints
//!
//! `/healthz` and `/readyz` serve the health registry, `/status` the latest
//! decision loop outcome and `/metrics` the Prometheus registry.

use crate::status::{LoopStatus, SharedStatus};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use simulator_lib::{ComponentStatus, HealthRegistry, SimulatorMetrics};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: SimulatorMetrics,
    pub status: SharedStatus,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: SimulatorMetrics, status: SharedStatus) -> Self {
        Self {
            health_registry,
            metrics,
            status,
        }
    }
}

type SharedState = Arc<AppState>;

fn json_with<T: Serialize>(ok: bool, body: T) -> Response {
    let code = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body)).into_response()
}

/// A degraded component (a failing source) still counts as alive
async fn healthz(State(state): State<SharedState>) -> Response {
    let health = state.health_registry.health().await;
    json_with(health.status != ComponentStatus::Unhealthy, health)
}

/// Ready once the pod cache has synchronized and nothing is unhealthy
async fn readyz(State(state): State<SharedState>) -> Response {
    let readiness = state.health_registry.readiness().await;
    json_with(readiness.ready, readiness)
}

async fn status(State(state): State<SharedState>) -> Json<LoopStatus> {
    Json(state.status.read().await.clone())
}

async fn metrics() -> Response {
    let mut buffer = Vec::new();
    match TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/status", get(status))
        .route("/metrics", get(metrics))
        .with_state(state)
}

pub async fn serve(port: u16, state: SharedState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Serving health, status and metrics endpoints");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
