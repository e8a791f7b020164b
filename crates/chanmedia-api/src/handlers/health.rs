use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::constants::READINESS_TIMEOUT_SECS;
use crate::state::MediaState;

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub index: String,
    pub storage: String,
}

/// Liveness probe: the process is up and serving.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive"
        })),
    )
}

/// Readiness probe
///
/// The duplicate index gates readiness. Storage problems are reported but only
/// degrade the answer, since lookups and duplicate checks still work without it.
pub async fn readiness_check(State(media): State<MediaState>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(READINESS_TIMEOUT_SECS);

    let mut response = ReadinessResponse {
        status: "ready",
        index: "unknown".to_string(),
        storage: "unknown".to_string(),
    };
    let mut ready = true;

    match tokio::time::timeout(TIMEOUT, media.index.ping()).await {
        Ok(Ok(())) => response.index = "ready".to_string(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Duplicate index readiness check failed");
            response.index = format!("not_ready: {}", e);
            ready = false;
        }
        Err(_) => {
            tracing::error!("Duplicate index readiness check timed out");
            response.index = "timeout".to_string();
            ready = false;
        }
    }

    // Probe with a key that never exists; only connectivity matters.
    match tokio::time::timeout(TIMEOUT, media.storage.exists("health/probe")).await {
        Ok(Ok(_)) => response.storage = "ready".to_string(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Storage readiness check degraded");
            response.storage = format!("degraded: {}", e);
        }
        Err(_) => {
            tracing::warn!("Storage readiness check timed out");
            response.storage = "timeout".to_string();
        }
    }

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        response.status = "not_ready";
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
