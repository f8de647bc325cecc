//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kubelet_metrics::api::{create_router, AppState};
use kubelet_metrics_lib::{
    health::{components, HealthRegistry},
    observability::AgentMetrics,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::SCRAPER).await;
    health_registry.register(components::ROUTER).await;

    let state = Arc::new(AppState::new(health_registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::SCRAPER, "1 of 2 nodes failed")
        .await;

    let (status, body) = get(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::ROUTER, "Event sink stopped")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
    assert_eq!(health["components"]["router"]["message"], "Event sink stopped");
}

#[tokio::test]
async fn test_healthz_reports_target_outcomes() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_success("worker-1").await;
    state
        .health_registry
        .record_failure("worker-2", "request to worker-2 timed out after 10s")
        .await;

    let (_, body) = get(app, "/healthz").await;

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(health["components"]["scraper"].is_object());
    assert!(health["components"]["router"].is_object());
    assert_eq!(health["targets"]["worker-1"]["consecutive_failures"], 0);
    assert!(health["targets"]["worker-1"]["last_success_timestamp"].is_i64());
    assert_eq!(health["targets"]["worker-2"]["consecutive_failures"], 1);
    assert!(health["targets"]["worker-2"]["last_error"]
        .as_str()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_after_first_scrape() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state.health_registry.record_success("worker-1").await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_until_a_node_is_scraped() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .record_failure("worker-1", "kubelet returned 503: not ready")
        .await;

    let (status, body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "No node scraped successfully yet");
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;
    state.health_registry.record_success("worker-1").await;
    state
        .health_registry
        .set_unhealthy(components::SCRAPER, "All nodes failing")
        .await;

    let (status, _) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_targets_lists_latest_outcome_per_node() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_success("worker-1").await;
    state
        .health_registry
        .record_failure("worker-2", "kubelet returned 503: not ready")
        .await;
    state
        .health_registry
        .record_failure("worker-2", "kubelet returned 503: still not ready")
        .await;

    let (status, body) = get(app, "/targets").await;

    assert_eq!(status, StatusCode::OK);
    let targets: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(targets.as_object().unwrap().len(), 2);
    assert!(targets["worker-1"]["last_success_timestamp"].is_i64());
    assert_eq!(targets["worker-2"]["consecutive_failures"], 2);
    assert_eq!(
        targets["worker-2"]["last_error"],
        "kubelet returned 503: still not ready"
    );
}

#[tokio::test]
async fn test_targets_empty_before_first_scrape() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/targets").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"{}");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;

    let metrics = AgentMetrics::new();
    metrics.observe_scrape_latency(0.02);
    metrics.inc_scrapes();
    metrics.inc_scrape_errors("timeout");
    metrics.inc_events_emitted();
    metrics.inc_events_dropped();
    metrics.set_scrape_targets(2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("kubelet_metrics_scrapes_total"));
    assert!(metrics_text.contains("kubelet_metrics_scrape_errors_total{kind=\"timeout\"}"));
    assert!(metrics_text.contains("kubelet_metrics_events_emitted_total"));
    assert!(metrics_text.contains("kubelet_metrics_events_dropped_total"));
    assert!(metrics_text.contains("kubelet_metrics_scrape_targets"));
}

#[tokio::test]
async fn test_metrics_contains_histogram_buckets() {
    let (app, _state) = setup_test_app().await;

    let metrics = AgentMetrics::new();
    metrics.observe_scrape_latency(0.001);
    metrics.observe_scrape_latency(0.3);
    metrics.observe_scrape_latency(4.0);

    let (_, body) = get(app, "/metrics").await;
    let metrics_text = String::from_utf8(body).unwrap();

    assert!(metrics_text.contains("kubelet_metrics_scrape_latency_seconds_bucket"));
    assert!(metrics_text.contains("kubelet_metrics_scrape_latency_seconds_count"));
    assert!(metrics_text.contains("kubelet_metrics_scrape_latency_seconds_sum"));
}
