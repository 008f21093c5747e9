//! Integration tests for the simulator API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hpa_simulator::api::{create_router, AppState};
use hpa_simulator::status::{shared_status, StatusReporter};
use simulator_lib::{
    decision::{Decision, DecisionReason, Observation, UtilizationSample},
    health::components,
    DecisionError, HealthRegistry, Reporter, SimulatorMetrics, StructuredReporter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let state = Arc::new(AppState::new(
        health_registry,
        SimulatorMetrics::new(),
        shared_status(3),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = assert_ok!(
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    );
    let status = response.status();
    let body = assert_ok!(axum::body::to_bytes(response.into_body(), usize::MAX).await);
    (status, body.to_vec())
}

fn sample_decision() -> Decision {
    Decision {
        current_replicas: 3,
        recommended_replicas: 6,
        reason: DecisionReason::Scaled,
        observation: Observation {
            utilization: UtilizationSample {
                ratio: 2.0,
                current_utilization: 100,
                raw_average: 200,
            },
            ready: 3,
            ignored: 0,
            missing: 0,
            timestamp: None,
        },
        rebalanced: None,
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    for name in components::ALL {
        assert!(health["components"][name].is_object(), "missing {}", name);
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_when_metrics_api_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(components::METRICS_API, "no metrics returned from resource metrics API")
        .await;

    let (status, body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["metrics_api"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::DECISION_ENGINE, "loop stopped")
        .await;

    let (status, _body) = get(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_waits_for_cache_sync() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert_eq!(readiness["reason"], "Pod cache not yet synchronized");

    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::CLUSTER_CACHE, "watch closed")
        .await;

    let (status, _body) = get(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_decision_metrics() {
    let (app, state) = setup_test_app().await;
    state
        .metrics
        .record_decision(&sample_decision(), Duration::from_millis(12));
    state.metrics.inc_scale_transitions();
    state.metrics.inc_cycle_errors("missing_request");

    let response = assert_ok!(
        app.oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("hpa_simulator_recommended_replicas"));
    assert!(text.contains("hpa_simulator_utilization_ratio"));
    assert!(text.contains("hpa_simulator_pods{class=\"ready\"}"));
    assert!(text.contains("hpa_simulator_cycle_errors_total{kind=\"missing_request\"}"));
    assert!(text.contains("hpa_simulator_cycle_duration_seconds_bucket"));
    assert!(text.contains("hpa_simulator_cycle_duration_seconds_count"));
}

#[tokio::test]
async fn test_status_reports_loop_outcome() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/status").await;
    assert_eq!(status, StatusCode::OK);
    let loop_status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(loop_status["current_replicas"], 3);
    assert!(loop_status["last_decision"].is_null());

    let reporter = StatusReporter::new(
        StructuredReporter::new("default", "app=web").with_health(state.health_registry.clone()),
        state.status.clone(),
    );
    reporter
        .cycle_completed(&sample_decision(), Duration::from_millis(8))
        .await;
    reporter.scale_transition(3, 6).await;
    reporter
        .cycle_failed(&DecisionError::NoMetricsAvailable, Some(6))
        .await;

    let (_, body) = get(app, "/status").await;
    let loop_status: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(loop_status["current_replicas"], 6);
    assert_eq!(loop_status["completed_cycles"], 1);
    assert_eq!(loop_status["failed_cycles"], 1);
    assert_eq!(loop_status["scale_transitions"], 1);
    assert_eq!(loop_status["last_decision"]["recommended_replicas"], 6);
    assert_eq!(loop_status["last_decision"]["reason"], "scaled");
    assert_eq!(
        loop_status["last_error"],
        "no metrics returned from resource metrics API"
    );
}
