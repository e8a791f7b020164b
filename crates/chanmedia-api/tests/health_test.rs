mod helpers;

use axum::http::StatusCode;
use helpers::{setup_test_app, TEST_CLIENT_IP};
use serde_json::Value;

#[tokio::test]
async fn test_liveness() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/health")
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_with_healthy_backends() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .get("/health/ready")
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["index"], "ready");
    assert_eq!(body["storage"], "ready");
}
