//! Storage setup and initialization

use anyhow::{Context, Result};
use chanmedia_core::{Config, StorageBackend};
use chanmedia_storage::{create_storage, Storage, UrlSigner};
use std::sync::Arc;

/// Build the configured backend and, for the local backend, the signer that
/// `/media/{*key}` verifies against.
pub async fn setup_storage(config: &Config) -> Result<(Arc<dyn Storage>, Option<UrlSigner>)> {
    tracing::info!("Initializing storage...");
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage backend")?;

    let signer = match storage.backend_type() {
        StorageBackend::Local => {
            let secret = config
                .url_signing_secret()
                .context("URL_SIGNING_SECRET must be set for local storage")?;
            Some(UrlSigner::new(secret.as_bytes().to_vec())?)
        }
        StorageBackend::S3 => None,
    };

    tracing::info!(
        backend = %storage.backend_type(),
        serves_media_route = signer.is_some(),
        "Storage initialized successfully"
    );

    Ok((storage, signer))
}
