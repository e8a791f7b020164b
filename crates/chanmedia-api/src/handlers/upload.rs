use axum::{
    extract::{multipart::Field, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::BytesMut;
use chanmedia_core::models::MediaResponse;
use chanmedia_core::AppError;
use chanmedia_processing::{IngestError, IngestPermit, ThumbnailStatus, Upload};
use serde::Serialize;

use super::response::with_signed_urls;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::error::HttpAppError;
use crate::state::{IngestState, MediaState};
use crate::utils::ip_extraction::ClientIp;

const FILE_FIELDS: &[&str] = &["file", "files", "file[]"];
const SPOILER_FIELD: &str = "spoiler";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(flatten)]
    pub media: MediaResponse,
    pub thumbnail_status: ThumbnailStatus,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<UploadedFile>,
}

/// Largest body a well-formed upload request can have.
pub fn request_body_limit(max_file_size: u64, max_files: usize) -> u64 {
    max_file_size
        .saturating_mul(max_files as u64)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

fn multipart_error(err: axum::extract::multipart::MultipartError, limit: u64) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge {
            size: limit.saturating_add(1),
            limit,
        }
    } else {
        AppError::InvalidInput(format!("Malformed multipart body: {}", err.body_text()))
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Buffer one file field, rejecting it as soon as it outgrows the per-file limit.
async fn read_file_field(
    field: &mut Field<'_>,
    permit: &IngestPermit<'_>,
    body_limit: u64,
) -> Result<BytesMut, HttpAppError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| multipart_error(e, body_limit))?
    {
        permit.check_size((buffer.len() + chunk.len()) as u64)?;
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

/// Upload one or more files
///
/// Multipart fields named `file` (repeatable, capped per request) carry the content;
/// an optional `spoiler` field applies to every file in the request. The rate
/// limiter is consulted before any of the body is read, and each file is
/// size-checked while it streams in.
///
/// # Returns
/// `201 Created` with one entry per file, each carrying fresh signed URLs. Content
/// that was already stored comes back with `duplicate: true`.
///
/// # Errors
/// - `429` rate limited (with `Retry-After`)
/// - `413` file or request too large
/// - `415` type not allowed
/// - `403` banned content
/// - `503` store failure (retryable)
#[tracing::instrument(skip_all, fields(client_ip = %client_ip))]
pub async fn upload_files(
    State(ingest): State<IngestState>,
    State(media): State<MediaState>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let pipeline = &ingest.pipeline;
    let policy = pipeline.policy();
    let body_limit = request_body_limit(policy.max_file_size, policy.max_files_per_request);

    let permit = pipeline.admit(&client_ip, None).await?;

    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(size) = declared {
        if size > body_limit {
            return Err(AppError::PayloadTooLarge {
                size,
                limit: body_limit,
            }
            .into());
        }
    }

    let mut uploads: Vec<Upload> = Vec::new();
    let mut spoiler = false;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, body_limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == SPOILER_FIELD {
            let value = field
                .text()
                .await
                .map_err(|e| multipart_error(e, body_limit))?;
            spoiler = parse_flag(&value);
            continue;
        }

        if !FILE_FIELDS.contains(&name.as_str()) {
            tracing::debug!(field = %name, "Ignoring unknown multipart field");
            continue;
        }

        if uploads.len() >= policy.max_files_per_request {
            return Err(IngestError::TooManyFiles {
                max: policy.max_files_per_request,
            }
            .into());
        }

        let filename = field.file_name().map(String::from);
        let data = read_file_field(&mut field, &permit, body_limit).await?;

        let mut upload = Upload::new(data.freeze());
        if let Some(filename) = filename {
            upload = upload.with_filename(filename);
        }
        uploads.push(upload);
    }

    if uploads.is_empty() {
        return Err(AppError::InvalidInput("No file provided".to_string()).into());
    }

    let mut files = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let outcome = permit.ingest(upload.with_spoiler(spoiler)).await?;
        let response = with_signed_urls(
            &media,
            outcome.descriptor,
            outcome.duplicate,
            media.signed_url_ttl,
        )
        .await?;
        files.push(UploadedFile {
            media: response,
            thumbnail_status: outcome.thumbnail,
        });
    }

    Ok((StatusCode::CREATED, Json(UploadResponse { files })))
}
