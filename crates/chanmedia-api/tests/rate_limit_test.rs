//! Admission control tests for the upload and general request limiters.
//!
//! Run with: `cargo test -p chanmedia-api --test rate_limit_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use helpers::fixtures::create_test_png;
use helpers::{api_path, setup_test_app, setup_test_app_with, TEST_CLIENT_IP};
use serde_json::Value;

fn upload_form(seed: u8) -> MultipartForm {
    let part = Part::bytes(create_test_png(16, 16, seed))
        .file_name("rate.png")
        .mime_type("image/png");
    MultipartForm::new().add_part("file", part)
}

#[tokio::test]
async fn test_rate_limit_headers_present() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .get(&api_path("/files/stats"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.header("x-ratelimit-limit"), "1000");
    assert_eq!(response.header("x-ratelimit-remaining"), "999");

    let response = client
        .get(&api_path("/files/stats"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;
    assert_eq!(response.header("x-ratelimit-remaining"), "998");
}

#[tokio::test]
async fn test_http_rate_limit_exceeded() {
    let app = setup_test_app_with(|config| config.base.http_rate_limit = 2).await;
    let client = app.client();

    for _ in 0..2 {
        let response = client
            .get("/health")
            .add_header("x-forwarded-for", TEST_CLIENT_IP)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    let response = client
        .get("/health")
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;
    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header("x-ratelimit-remaining"), "0");
    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["recoverable"], true);
    assert!(body["error"].as_str().is_some());
    assert!(body["suggested_action"].as_str().is_some());

    // Another client has its own budget.
    let response = client
        .get("/health")
        .add_header("x-forwarded-for", "198.51.100.20")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_upload_rate_limit_exceeded() {
    let app = setup_test_app_with(|config| config.upload_rate_limit = 2).await;
    let client = app.client();

    for seed in 0..2 {
        let response = client
            .post(&api_path("/files/upload"))
            .add_header("x-forwarded-for", TEST_CLIENT_IP)
            .multipart(upload_form(seed))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
    }

    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(upload_form(2))
        .await;

    assert_eq!(response.status_code(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(body["recoverable"], true);

    // Reads are governed by the general limiter only.
    let response = client
        .get(&api_path("/files/stats"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}
