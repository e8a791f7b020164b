//! Test helpers: build AppState and router for integration tests.
//!
//! Everything runs in-process: the duplicate index and rate counters live in memory
//! and blobs go to a temporary directory through the local backend.
//!
//! Run from workspace root: `cargo test -p chanmedia-api`.

pub mod fixtures;

use axum_test::TestServer;
use chanmedia_api::constants;
use chanmedia_api::setup::{routes, services};
use chanmedia_core::constants::DEFAULT_ALLOWED_MIME_TYPES;
use chanmedia_core::{BaseConfig, Config, MediaServiceConfig, StorageBackend};
use chanmedia_db::MemoryDuplicateIndex;
use chanmedia_infra::MemoryCounterStore;
use chanmedia_storage::{LocalStorage, Storage, UrlSigner};
use std::sync::Arc;
use tempfile::TempDir;

pub const TEST_SIGNING_SECRET: &str = "test-signing-secret-0123456789abcdef";
pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Client identity sent through the trusted proxy header.
pub const TEST_CLIENT_IP: &str = "203.0.113.10";

/// API path prefix for tests (e.g. `/api/v1`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", constants::API_PREFIX, path)
}

/// Test application: server plus the backends behind it.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<LocalStorage>,
    pub index: Arc<MemoryDuplicateIndex>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// True when neither originals nor thumbnails were written.
    pub async fn storage_is_empty(&self) -> bool {
        let media = self.storage.list("media/").await.expect("list media");
        let thumbs = self.storage.list("thumbs/").await.expect("list thumbs");
        media.is_empty() && thumbs.is_empty()
    }
}

/// Configuration with local storage and generous limits. One trusted proxy is
/// declared so tests pick their client identity with `X-Forwarded-For`.
pub fn create_test_config(storage_path: &str) -> MediaServiceConfig {
    MediaServiceConfig {
        base: BaseConfig {
            server_port: 3000,
            environment: "test".to_string(),
            cors_origins: vec!["*".to_string()],
            database_url: "postgres://localhost/chanmedia_test".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: 5,
            redis_url: None,
            trusted_proxy_count: 1,
            http_rate_limit: 1_000,
            http_rate_window_secs: 60,
            http_concurrency_limit: 64,
        },
        storage_backend: StorageBackend::Local,
        s3_bucket: None,
        s3_region: None,
        s3_endpoint: None,
        aws_region: None,
        local_storage_path: Some(storage_path.to_string()),
        local_storage_base_url: Some(format!("{}/media", TEST_ORIGIN)),
        url_signing_secret: Some(TEST_SIGNING_SECRET.to_string()),
        signed_url_ttl_secs: 3600,
        max_file_size_bytes: 256 * 1024,
        max_files_per_request: 4,
        allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES
            .iter()
            .map(|m| m.to_string())
            .collect(),
        banned_digests: vec![],
        thumbnail_max_edge: 64,
        ffmpeg_path: "ffmpeg".to_string(),
        upload_rate_limit: 100,
        upload_rate_window_secs: 60,
        stage_timeout_secs: 10,
        purge_min_age_days: 30,
        reconcile_interval_secs: 0,
        reconcile_grace_secs: 0,
    }
}

/// Setup test app with default test configuration.
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(|_| {}).await
}

/// Setup test app, letting the caller adjust the configuration first.
pub async fn setup_test_app_with(customize: impl FnOnce(&mut MediaServiceConfig)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let storage_path = temp_dir.path().to_string_lossy().into_owned();

    let mut media_config = create_test_config(&storage_path);
    customize(&mut media_config);
    let config = Config(Box::new(media_config));

    let signer = UrlSigner::new(TEST_SIGNING_SECRET).expect("Failed to create signer");
    let storage = Arc::new(
        LocalStorage::new(
            temp_dir.path(),
            format!("{}/media", TEST_ORIGIN),
            signer.clone(),
        )
        .await
        .expect("Failed to create local storage"),
    );
    let index = Arc::new(MemoryDuplicateIndex::new());

    let state = services::build_state(
        &config,
        index.clone(),
        storage.clone() as Arc<dyn Storage>,
        Some(signer),
        Arc::new(MemoryCounterStore::new()),
    );

    let app = routes::setup_routes(&config, state).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        index,
        _temp_dir: temp_dir,
    }
}

/// Path and query of a signed URL minted for the test origin.
pub fn relative_url(url: &str) -> String {
    url.strip_prefix(TEST_ORIGIN)
        .expect("Signed URL should use the test origin")
        .to_string()
}
