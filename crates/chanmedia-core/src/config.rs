//! Configuration module
//!
//! Loads the service configuration from the environment (and `.env` via dotenvy).
//! Every knob has a default except the database URL and, for the local backend,
//! the URL signing secret.

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_SIGNED_URL_TTL_SECS, DEFAULT_THUMBNAIL_MAX_EDGE,
    MAX_SIGNED_URL_TTL_SECS, PURGE_MIN_AGE_DAYS,
};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_FILE_SIZE_MB: u64 = 10;
const MAX_FILES_PER_REQUEST: usize = 4;
const UPLOAD_RATE_LIMIT: u64 = 10;
const UPLOAD_RATE_WINDOW_SECS: u64 = 60;
const HTTP_RATE_LIMIT: u64 = 100;
const HTTP_RATE_WINDOW_SECS: u64 = 60;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const STAGE_TIMEOUT_SECS: u64 = 30;
const RECONCILE_GRACE_SECS: u64 = 3600;

/// Settings shared by every process in the deployment
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub redis_url: Option<String>,
    pub trusted_proxy_count: usize,
    pub http_rate_limit: u64,
    pub http_rate_window_secs: u64,
    /// In-flight request cap across the whole router
    pub http_concurrency_limit: usize,
}

/// Media ingestion service configuration
#[derive(Clone, Debug)]
pub struct MediaServiceConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO etc.)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub url_signing_secret: Option<String>,
    pub signed_url_ttl_secs: u64,
    // Ingestion policy
    pub max_file_size_bytes: u64,
    pub max_files_per_request: usize,
    pub allowed_mime_types: Vec<String>,
    pub banned_digests: Vec<String>,
    pub thumbnail_max_edge: u32,
    pub ffmpeg_path: String,
    pub upload_rate_limit: u64,
    pub upload_rate_window_secs: u64,
    pub stage_timeout_secs: u64,
    // Maintenance
    pub purge_min_age_days: u32,
    /// Interval in seconds between orphan reconciliation sweeps. 0 = disabled.
    pub reconcile_interval_secs: u64,
    /// Minimum age of an unindexed object before the sweep treats it as orphaned.
    pub reconcile_grace_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<MediaServiceConfig>);

impl Config {
    fn as_media(&self) -> &MediaServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_media().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = MediaServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_media().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_media().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_media().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_media().base.cors_origins
    }

    pub fn database_url(&self) -> &str {
        &self.as_media().base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_media().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_media().base.db_timeout_seconds
    }

    pub fn redis_url(&self) -> Option<&str> {
        self.as_media().base.redis_url.as_deref()
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_media().base.trusted_proxy_count
    }

    pub fn http_rate_limit(&self) -> u64 {
        self.as_media().base.http_rate_limit
    }

    pub fn http_rate_window_secs(&self) -> u64 {
        self.as_media().base.http_rate_window_secs
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.as_media().base.http_concurrency_limit.max(1)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_media().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.as_media().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_media().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_media().s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.as_media().aws_region.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_media().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_media().local_storage_base_url.as_deref()
    }

    pub fn url_signing_secret(&self) -> Option<&str> {
        self.as_media().url_signing_secret.as_deref()
    }

    /// Default signed URL lifetime, never above seven days.
    pub fn signed_url_ttl_secs(&self) -> u64 {
        self.as_media().signed_url_ttl_secs.min(MAX_SIGNED_URL_TTL_SECS)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_media().max_file_size_bytes
    }

    pub fn max_files_per_request(&self) -> usize {
        self.as_media().max_files_per_request
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.as_media().allowed_mime_types
    }

    pub fn banned_digests(&self) -> &[String] {
        &self.as_media().banned_digests
    }

    pub fn thumbnail_max_edge(&self) -> u32 {
        self.as_media().thumbnail_max_edge
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.as_media().ffmpeg_path
    }

    pub fn upload_rate_limit(&self) -> u64 {
        self.as_media().upload_rate_limit
    }

    pub fn upload_rate_window_secs(&self) -> u64 {
        self.as_media().upload_rate_window_secs
    }

    pub fn stage_timeout_secs(&self) -> u64 {
        self.as_media().stage_timeout_secs
    }

    pub fn purge_min_age_days(&self) -> u32 {
        self.as_media().purge_min_age_days
    }

    pub fn reconcile_interval_secs(&self) -> u64 {
        self.as_media().reconcile_interval_secs
    }

    pub fn reconcile_grace_secs(&self) -> u64 {
        self.as_media().reconcile_grace_secs
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_list(name: &str, default: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl MediaServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            cors_origins: cors_origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            trusted_proxy_count: env_or("TRUSTED_PROXY_COUNT", 0),
            http_rate_limit: env_or("HTTP_RATE_LIMIT", HTTP_RATE_LIMIT),
            http_rate_window_secs: env_or("HTTP_RATE_WINDOW_SECS", HTTP_RATE_WINDOW_SECS),
            http_concurrency_limit: env_or("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse::<StorageBackend>()?,
            Err(_) => StorageBackend::S3,
        };

        let config = MediaServiceConfig {
            base,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            url_signing_secret: env::var("URL_SIGNING_SECRET").ok(),
            signed_url_ttl_secs: env_or("SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS)
                .min(MAX_SIGNED_URL_TTL_SECS),
            max_file_size_bytes: env_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * 1024 * 1024,
            max_files_per_request: env_or("MAX_FILES_PER_REQUEST", MAX_FILES_PER_REQUEST),
            allowed_mime_types: env_list(
                "ALLOWED_MIME_TYPES",
                &DEFAULT_ALLOWED_MIME_TYPES.join(","),
            ),
            banned_digests: env_list("BANNED_DIGESTS", ""),
            thumbnail_max_edge: env_or("THUMBNAIL_MAX_EDGE", DEFAULT_THUMBNAIL_MAX_EDGE),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            upload_rate_limit: env_or("UPLOAD_RATE_LIMIT", UPLOAD_RATE_LIMIT),
            upload_rate_window_secs: env_or("UPLOAD_RATE_WINDOW_SECS", UPLOAD_RATE_WINDOW_SECS),
            stage_timeout_secs: env_or("STAGE_TIMEOUT_SECS", STAGE_TIMEOUT_SECS),
            purge_min_age_days: env_or("PURGE_MIN_AGE_DAYS", PURGE_MIN_AGE_DAYS)
                .max(PURGE_MIN_AGE_DAYS),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", 0),
            reconcile_grace_secs: env_or("RECONCILE_GRACE_SECS", RECONCILE_GRACE_SECS),
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.base.database_url.starts_with("postgres://")
            && !self.base.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.max_files_per_request == 0 {
            return Err(anyhow::anyhow!("MAX_FILES_PER_REQUEST must be greater than 0"));
        }

        if self.allowed_mime_types.is_empty() {
            return Err(anyhow::anyhow!("ALLOWED_MIME_TYPES must not be empty"));
        }

        if self.upload_rate_window_secs == 0 || self.base.http_rate_window_secs == 0 {
            return Err(anyhow::anyhow!("Rate limit windows must be at least 1 second"));
        }

        if self.base.http_concurrency_limit == 0 {
            return Err(anyhow::anyhow!("HTTP_CONCURRENCY_LIMIT must be greater than 0"));
        }

        if self.signed_url_ttl_secs == 0 || self.signed_url_ttl_secs > MAX_SIGNED_URL_TTL_SECS {
            return Err(anyhow::anyhow!(
                "SIGNED_URL_TTL_SECS must be between 1 and {}",
                MAX_SIGNED_URL_TTL_SECS
            ));
        }

        if self.thumbnail_max_edge == 0 {
            return Err(anyhow::anyhow!("THUMBNAIL_MAX_EDGE must be greater than 0"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                match &self.url_signing_secret {
                    Some(secret) if secret.len() >= 32 => {}
                    _ => {
                        return Err(anyhow::anyhow!(
                            "URL_SIGNING_SECRET must be at least 32 characters for local storage"
                        ))
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> MediaServiceConfig {
        MediaServiceConfig {
            base: BaseConfig {
                server_port: 8080,
                environment: "test".to_string(),
                cors_origins: vec!["*".to_string()],
                database_url: "postgres://localhost/chanmedia".to_string(),
                db_max_connections: 5,
                db_timeout_seconds: 5,
                redis_url: None,
                trusted_proxy_count: 0,
                http_rate_limit: 100,
                http_rate_window_secs: 60,
                http_concurrency_limit: 10_000,
            },
            storage_backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: Some("/tmp/chanmedia".to_string()),
            local_storage_base_url: Some("http://localhost:8080/media".to_string()),
            url_signing_secret: Some("0123456789abcdef0123456789abcdef".to_string()),
            signed_url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files_per_request: 4,
            allowed_mime_types: vec!["image/png".to_string()],
            banned_digests: vec![],
            thumbnail_max_edge: 250,
            ffmpeg_path: "ffmpeg".to_string(),
            upload_rate_limit: 10,
            upload_rate_window_secs: 60,
            stage_timeout_secs: 30,
            purge_min_age_days: 30,
            reconcile_interval_secs: 0,
            reconcile_grace_secs: 3600,
        }
    }

    #[test]
    fn test_validate_local_config() {
        assert!(local_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_signing_secret() {
        let mut config = local_config();
        config.url_signing_secret = Some("short".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_s3_requires_bucket() {
        let mut config = local_config();
        config.storage_backend = StorageBackend::S3;
        assert!(config.validate().is_err());
        config.s3_bucket = Some("chanmedia".to_string());
        config.aws_region = Some("us-east-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_postgres_url() {
        let mut config = local_config();
        config.base.database_url = "mysql://localhost/db".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_production_detection() {
        let mut config = local_config();
        config.base.environment = "Production".to_string();
        assert!(Config(Box::new(config)).is_production());
    }

    #[test]
    fn test_signed_url_ttl_capped_at_seven_days() {
        let mut config = local_config();
        config.signed_url_ttl_secs = 30 * 24 * 60 * 60;
        assert!(config.validate().is_err());
        assert_eq!(
            Config(Box::new(config.clone())).signed_url_ttl_secs(),
            MAX_SIGNED_URL_TTL_SECS
        );

        config.signed_url_ttl_secs = 0;
        assert!(config.validate().is_err());

        config.signed_url_ttl_secs = 3600;
        assert!(config.validate().is_ok());
        assert_eq!(Config(Box::new(config)).signed_url_ttl_secs(), 3600);
    }

    #[test]
    fn test_http_concurrency_limit() {
        let mut config = local_config();
        assert_eq!(Config(Box::new(config.clone())).http_concurrency_limit(), 10_000);

        config.base.http_concurrency_limit = 0;
        assert!(config.validate().is_err());
        assert_eq!(Config(Box::new(config)).http_concurrency_limit(), 1);
    }
}
