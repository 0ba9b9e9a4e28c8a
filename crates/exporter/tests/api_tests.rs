//! Integration tests for the exporter API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use docker_exporter::api::{create_router, AppState};
use exporter_lib::{
    health::{components, HealthRegistry},
    ContainerGauges, ContainerIdentity, ContainerStats, ExporterMetrics,
};
use prometheus::Registry;
use std::sync::Arc;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    gauges: ContainerGauges,
}

async fn setup_test_app() -> TestApp {
    let registry = Registry::new();
    let gauges = ContainerGauges::register(&registry).unwrap();
    ExporterMetrics::register(&registry).unwrap();

    let health_registry = HealthRegistry::new();
    health_registry.register(components::POLLER).await;
    health_registry.register(components::RUNTIME).await;

    let state = Arc::new(AppState::new(registry, health_registry));
    let router = create_router(state.clone());

    TestApp {
        router,
        state,
        gauges,
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_root_serves_container_gauges() {
    let app = setup_test_app().await;
    let web = ContainerIdentity::new("c1", "web");
    app.gauges.set_status(&web, true);
    app.gauges.set_usage(&ContainerStats {
        identity: web.clone(),
        cpu_percent: 2.5,
        mem_percent: 10.0,
        net_rx_bytes: 1228.8,
        net_tx_bytes: 3565158.4,
    });

    let (status, content_type, body) = get(app.router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
    assert!(body.contains("# TYPE docker_container_status gauge"));
    assert!(body.contains(r#"docker_container_status{id="c1",name="web"} 1"#));
    assert!(body.contains(r#"docker_container_cpu_usage_percent{id="c1",name="web"} 2.5"#));
    assert!(body.contains(r#"docker_container_network_received_bytes{id="c1",name="web"} 1228.8"#));
}

#[tokio::test]
async fn test_root_serves_stopped_container_as_zero() {
    let app = setup_test_app().await;
    let db = ContainerIdentity::new("c2", "db");
    app.gauges.set_status(&db, false);
    app.gauges.zero_usage(&db);

    let (status, _, body) = get(app.router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"docker_container_status{id="c2",name="db"} 0"#));
    assert!(body.contains(r#"docker_container_memory_usage_percent{id="c2",name="db"} 0"#));
}

#[tokio::test]
async fn test_root_on_empty_registry_succeeds() {
    let app = setup_test_app().await;

    let (status, _, body) = get(app.router, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body.contains("docker_container_status{"));
}

#[tokio::test]
async fn test_root_rejects_post() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_healthz_returns_ok_when_runtime_degraded() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_degraded(components::RUNTIME, "docker ps timed out")
        .await;

    let (status, _, body) = get(app.router, "/healthz").await;

    // Degraded still returns 200 (stale metrics are served)
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["runtime"]["message"],
        "docker ps timed out"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_poller_stopped() {
    let app = setup_test_app().await;
    app.state
        .health_registry
        .set_unhealthy(components::POLLER, "Poll loop stopped")
        .await;

    let (status, _, _) = get(app.router, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_readyz_waits_for_first_listing() {
    let app = setup_test_app().await;

    let (status, _, body) = get(app.router.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    app.state.health_registry.set_ready(true).await;

    let (status, _, _) = get(app.router, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}
