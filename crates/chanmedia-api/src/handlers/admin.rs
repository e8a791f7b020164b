//! Maintenance routes. Access control is expected from the gateway in front of
//! `/api/v1/admin`.

use axum::{extract::State, response::IntoResponse, Json};
use chanmedia_core::models::PurgeRequest;
use chanmedia_core::AppError;
use serde::Deserialize;
use validator::Validate;

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::MaintenanceState;

/// Policy-driven bulk deletion. `dryRun: true` selects and reports without deleting.
#[tracing::instrument(
    skip_all,
    fields(
        older_than_days = request.older_than_days,
        dry_run = request.dry_run,
        mime_filter = request.mime_types.len(),
        exclusions = request.exclude_keys.len()
    )
)]
pub async fn purge_files(
    State(maintenance): State<MaintenanceState>,
    ValidatedJson(request): ValidatedJson<PurgeRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    request.validate().map_err(AppError::from)?;

    let report = maintenance.purge.purge(&request).await?;

    tracing::info!(
        task_id = %report.task_id,
        estimated_count = report.estimated_count,
        estimated_bytes = report.estimated_bytes,
        deleted = report.deleted_count,
        failed = report.failed_count,
        "Purge request handled"
    );

    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRequest {
    #[serde(default, alias = "dry_run")]
    pub dry_run: bool,
}

/// On-demand orphan sweep, same rules as the scheduled one.
pub async fn reconcile_storage(
    State(maintenance): State<MaintenanceState>,
    ValidatedJson(request): ValidatedJson<ReconcileRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = maintenance.reconcile.sweep(request.dry_run).await?;
    Ok(Json(report))
}
