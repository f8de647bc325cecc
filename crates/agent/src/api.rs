//! Health, readiness and scrape-status endpoints
//!
//! - `/healthz`: 200 while every component is at least degraded
//! - `/readyz`: 200 once a node has been scraped and nothing is unhealthy
//! - `/targets`: latest scrape outcome per node
//! - `/metrics`: Prometheus text exposition of the agent's own metrics

use anyhow::Context;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use kubelet_metrics_lib::health::{HealthRegistry, TargetHealth};
use prometheus::{Encoder, TextEncoder};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// State shared by the handlers
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry) -> Self {
        Self { health_registry }
    }
}

fn status_for(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    (status_for(health.status.is_operational()), Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    (status_for(readiness.ready), Json(readiness))
}

async fn targets(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, TargetHealth>> {
    Json(state.health_registry.targets().await)
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/targets", get(targets))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the API port on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server to {addr}"))
}

/// Serve the API on an already bound listener until the server fails
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Serving health and metrics API");
    }

    axum::serve(listener, create_router(state))
        .await
        .context("API server stopped")
}
