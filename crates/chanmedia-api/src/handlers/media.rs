use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use chanmedia_core::AppError;
use chanmedia_storage::keys::{mime_for_key, validate_key};
use chanmedia_storage::signing::SignatureError;
use serde::Deserialize;

use crate::error::HttpAppError;
use crate::state::MediaState;

#[derive(Debug, Deserialize)]
pub struct SignatureQuery {
    pub expires: u64,
    pub sig: String,
}

/// Serve a stored object behind a signed URL minted by the local backend.
#[tracing::instrument(skip(media, query), fields(storage_key = %key))]
pub async fn serve_media(
    State(media): State<MediaState>,
    Path(key): Path<String>,
    Query(query): Query<SignatureQuery>,
) -> Result<Response, HttpAppError> {
    let signer = media
        .signer
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Not found".to_string()))?;

    validate_key(&key)?;

    signer
        .verify(&key, query.expires, &query.sig)
        .map_err(|e| match e {
            SignatureError::Expired => AppError::Forbidden("Signed URL has expired".to_string()),
            SignatureError::Invalid => AppError::Forbidden("Invalid signature".to_string()),
        })?;

    let data = media.storage.get(&key).await?;

    let mut response = data.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime_for_key(&key)),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600, immutable"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    Ok(response)
}
