use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chanmedia_core::constants::{is_content_digest, MAX_SIGNED_URL_TTL_SECS};
use chanmedia_core::models::MediaResponse;
use chanmedia_core::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::response::with_signed_urls;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::{IngestState, MaintenanceState, MediaState};

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub ttl_secs: Option<u64>,
}

/// Lifetime for a caller-requested URL: the configured default when absent,
/// never longer than seven days.
fn resolve_ttl(requested: Option<u64>, default: Duration) -> Result<Duration, AppError> {
    match requested {
        None => Ok(default.min(Duration::from_secs(MAX_SIGNED_URL_TTL_SECS))),
        Some(0) => Err(AppError::InvalidInput(
            "ttl_secs must be greater than 0".to_string(),
        )),
        Some(secs) => Ok(Duration::from_secs(secs.min(MAX_SIGNED_URL_TTL_SECS))),
    }
}

fn normalize_digest(raw: &str) -> Result<String, AppError> {
    let digest = raw.trim().to_ascii_lowercase();
    if !is_content_digest(&digest) {
        return Err(AppError::InvalidInput(
            "Expected a 64-character hex SHA-256 digest".to_string(),
        ));
    }
    Ok(digest)
}

/// Descriptor plus fresh signed URLs for the original and its thumbnail.
#[tracing::instrument(skip(media, query), fields(digest = %digest))]
pub async fn get_file(
    State(media): State<MediaState>,
    Path(digest): Path<String>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let digest = normalize_digest(&digest)?;
    let ttl = resolve_ttl(query.ttl_secs, media.signed_url_ttl)?;

    let descriptor = media
        .index
        .lookup(&digest)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

    let response = with_signed_urls(&media, descriptor, false, ttl).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub hash: String,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<MediaResponse>,
}

/// Ask whether content with a given digest is already stored, so a client can skip
/// the upload.
pub async fn check_file(
    State(media): State<MediaState>,
    ValidatedJson(request): ValidatedJson<CheckRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let digest = normalize_digest(&request.hash)?;

    let file = match media.index.lookup(&digest).await? {
        Some(descriptor) => {
            Some(with_signed_urls(&media, descriptor, true, media.signed_url_ttl).await?)
        }
        None => None,
    };

    Ok(Json(CheckResponse {
        exists: file.is_some(),
        file,
    }))
}

pub async fn get_stats(
    State(maintenance): State<MaintenanceState>,
) -> Result<impl IntoResponse, HttpAppError> {
    let stats = maintenance.stats.summary().await?;
    Ok(Json(stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannedResponse {
    pub data: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Digests that ingestion refuses, so clients can skip doomed uploads.
pub async fn get_banned(State(ingest): State<IngestState>) -> impl IntoResponse {
    Json(BannedResponse {
        data: ingest.pipeline.policy().banned_list(),
        updated_at: ingest.banned_loaded_at,
    })
}
