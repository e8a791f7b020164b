use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::constants::PURGE_MIN_AGE_DAYS;

/// Policy-driven bulk deletion request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurgeRequest {
    #[validate(range(
        min = 30,
        max = 36500,
        message = "olderThanDays must be between 30 and 36500"
    ))]
    pub older_than_days: u32,
    /// Empty means every type
    #[serde(default)]
    pub mime_types: Vec<String>,
    /// Digests or storage keys that must survive the purge
    #[serde(default)]
    pub exclude_keys: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
}

impl PurgeRequest {
    pub fn new(older_than_days: u32, dry_run: bool) -> Self {
        Self {
            older_than_days,
            mime_types: Vec::new(),
            exclude_keys: Vec::new(),
            dry_run,
        }
    }

    /// True when `older_than_days` respects both the hard floor and `configured_floor`.
    pub fn meets_floor(&self, configured_floor: u32) -> bool {
        self.older_than_days >= configured_floor.max(PURGE_MIN_AGE_DAYS)
    }
}

/// Outcome of a purge run. Estimates are reported for dry runs and real runs alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub task_id: Uuid,
    pub estimated_count: u64,
    pub estimated_bytes: u64,
    pub dry_run: bool,
    pub deleted_count: u64,
    pub failed_count: u64,
}

/// Outcome of an orphan reconciliation sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub scanned: u64,
    pub orphaned: u64,
    pub orphaned_bytes: u64,
    pub deleted: u64,
    pub failed: u64,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PURGE_MAX_AGE_DAYS;

    #[test]
    fn test_validation_enforces_floor() {
        assert!(PurgeRequest::new(29, true).validate().is_err());
        assert!(PurgeRequest::new(30, true).validate().is_ok());
    }

    #[test]
    fn test_validation_enforces_ceiling() {
        assert!(PurgeRequest::new(PURGE_MAX_AGE_DAYS, true).validate().is_ok());
        assert!(PurgeRequest::new(PURGE_MAX_AGE_DAYS + 1, true).validate().is_err());
        assert!(PurgeRequest::new(u32::MAX, true).validate().is_err());
    }

    #[test]
    fn test_meets_floor_never_below_thirty() {
        assert!(!PurgeRequest::new(20, false).meets_floor(7));
        assert!(PurgeRequest::new(30, false).meets_floor(7));
        assert!(!PurgeRequest::new(45, false).meets_floor(60));
    }

    #[test]
    fn test_deserialize_defaults() {
        let req: PurgeRequest = serde_json::from_str(r#"{"olderThanDays":31}"#).unwrap();
        assert_eq!(req.older_than_days, 31);
        assert!(req.mime_types.is_empty());
        assert!(req.exclude_keys.is_empty());
        assert!(!req.dry_run);
    }
}
