//! Upload API integration tests.
//!
//! Run with: `cargo test -p chanmedia-api --test upload_test`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use chanmedia_db::DuplicateIndex;
use helpers::fixtures::{create_oversized_png, create_test_executable, create_test_png};
use helpers::{api_path, setup_test_app, setup_test_app_with, TEST_CLIENT_IP};
use serde_json::Value;

fn png_part(data: Vec<u8>, name: &str) -> Part {
    Part::bytes(data).file_name(name).mime_type("image/png")
}

#[tokio::test]
async fn test_upload_image() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = MultipartForm::new().add_part("file", png_part(create_test_png(120, 80, 1), "cat.png"));
    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    let file = &body["files"][0];
    assert_eq!(file["mimeType"], "image/png");
    assert_eq!(file["width"], 120);
    assert_eq!(file["height"], 80);
    assert_eq!(file["originalFilename"], "cat.png");
    assert_eq!(file["duplicate"], false);
    assert_eq!(file["spoiler"], false);
    assert_eq!(file["thumbnailStatus"], "derived");
    assert!(file["thumbnailUrl"].as_str().is_some());
    assert!(file["url"].as_str().unwrap().contains("sig="));

    let digest = file["contentDigest"].as_str().unwrap();
    assert!(app.index.lookup(digest).await.unwrap().is_some());
}

#[tokio::test]
async fn test_upload_same_bytes_is_duplicate() {
    let app = setup_test_app().await;
    let client = app.client();
    let png = create_test_png(64, 64, 2);

    let first: Value = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(MultipartForm::new().add_part("file", png_part(png.clone(), "a.png")))
        .await
        .json();
    let second = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(MultipartForm::new().add_part("file", png_part(png, "renamed.png")))
        .await;

    assert_eq!(second.status_code(), StatusCode::CREATED);
    let second: Value = second.json();
    let (a, b) = (&first["files"][0], &second["files"][0]);
    assert_eq!(a["contentDigest"], b["contentDigest"]);
    assert_eq!(a["storageKey"], b["storageKey"]);
    assert_eq!(b["duplicate"], true);
    assert_eq!(b["thumbnailStatus"], "skipped");
    // The first descriptor wins, including its filename.
    assert_eq!(b["originalFilename"], "a.png");
}

#[tokio::test]
async fn test_upload_spoiler_flag_applies_to_every_file() {
    let app = setup_test_app().await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_text("spoiler", "true")
        .add_part("file", png_part(create_test_png(32, 32, 3), "one.png"))
        .add_part("file", png_part(create_test_png(32, 32, 4), "two.png"));
    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body: Value = response.json();
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f["spoiler"] == true));
}

#[tokio::test]
async fn test_upload_executable_rejected() {
    let app = setup_test_app().await;
    let client = app.client();

    // The declared type is ignored; classification comes from the bytes.
    let part = Part::bytes(create_test_executable())
        .file_name("innocent.png")
        .mime_type("image/png");
    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(MultipartForm::new().add_part("file", part))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json();
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
    assert_eq!(body["recoverable"], false);
    assert!(app.storage_is_empty().await);
}

#[tokio::test]
async fn test_upload_oversized_file_rejected() {
    let app = setup_test_app_with(|config| config.max_file_size_bytes = 1024).await;
    let client = app.client();

    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(
            MultipartForm::new().add_part("file", png_part(create_oversized_png(1025), "big.png")),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(app.storage_is_empty().await);
}

#[tokio::test]
async fn test_upload_too_many_files_rejected() {
    let app = setup_test_app_with(|config| config.max_files_per_request = 1).await;
    let client = app.client();

    let form = MultipartForm::new()
        .add_part("file", png_part(create_test_png(16, 16, 5), "one.png"))
        .add_part("file", png_part(create_test_png(16, 16, 6), "two.png"));
    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(form)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "TOO_MANY_FILES");
}

#[tokio::test]
async fn test_upload_without_file_rejected() {
    let app = setup_test_app().await;
    let client = app.client();

    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(MultipartForm::new().add_text("spoiler", "false"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_banned_digest_rejected() {
    let png = create_test_png(24, 24, 7);
    let digest = chanmedia_processing::content_digest(&png);
    let app = setup_test_app_with(move |config| config.banned_digests = vec![digest]).await;
    let client = app.client();

    let response = client
        .post(&api_path("/files/upload"))
        .add_header("x-forwarded-for", TEST_CLIENT_IP)
        .multipart(MultipartForm::new().add_part("file", png_part(png, "banned.png")))
        .await;

    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "CONTENT_BANNED");
    assert!(app.storage_is_empty().await);
}
