use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Aggregate counters over the duplicate index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStats {
    pub total_files: i64,
    pub total_size: i64,
    pub files_by_type: BTreeMap<String, i64>,
    pub average_file_size: f64,
    pub files_last_day: i64,
    pub files_last_week: i64,
}
