//! Aggregate counters over the duplicate index.

use std::sync::Arc;

use chanmedia_core::models::MediaStats;
use chanmedia_db::{DuplicateIndex, IndexError};
use chrono::Utc;

#[derive(Clone)]
pub struct StatsService {
    index: Arc<dyn DuplicateIndex>,
}

impl StatsService {
    pub fn new(index: Arc<dyn DuplicateIndex>) -> Self {
        Self { index }
    }

    #[tracing::instrument(skip(self))]
    pub async fn summary(&self) -> Result<MediaStats, IndexError> {
        let stats = self.index.stats(Utc::now()).await?;
        tracing::debug!(
            total_files = stats.total_files,
            total_size = stats.total_size,
            "Computed media stats"
        );
        Ok(stats)
    }
}
