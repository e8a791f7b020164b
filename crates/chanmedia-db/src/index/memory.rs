use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chanmedia_core::models::{MediaDescriptor, MediaStats};
use chrono::{DateTime, Duration, Utc};

use super::{DuplicateIndex, IndexError, IndexResult, InsertOutcome, PurgeFilter};

/// Process-local duplicate index. Used for single-node development and tests.
#[derive(Default)]
pub struct MemoryDuplicateIndex {
    entries: RwLock<HashMap<String, MediaDescriptor>>,
}

impl MemoryDuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> IndexError {
    IndexError::Unavailable("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl DuplicateIndex for MemoryDuplicateIndex {
    async fn lookup(&self, content_digest: &str) -> IndexResult<Option<MediaDescriptor>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(content_digest).cloned())
    }

    async fn record(&self, descriptor: &MediaDescriptor) -> IndexResult<InsertOutcome> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.entry(descriptor.content_digest.clone()) {
            Entry::Occupied(existing) => Ok(InsertOutcome::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(descriptor.clone());
                Ok(InsertOutcome::Inserted(descriptor.clone()))
            }
        }
    }

    async fn purge_candidates(&self, filter: &PurgeFilter) -> IndexResult<Vec<MediaDescriptor>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let mut found: Vec<MediaDescriptor> = entries
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn remove(&self, content_digest: &str) -> IndexResult<bool> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(entries.remove(content_digest).is_some())
    }

    async fn references_key(&self, storage_key: &str) -> IndexResult<bool> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.values().any(|d| {
            d.storage_key == storage_key || d.thumbnail_key.as_deref() == Some(storage_key)
        }))
    }

    async fn stats(&self, now: DateTime<Utc>) -> IndexResult<MediaStats> {
        let entries = self.entries.read().map_err(poisoned)?;
        let day_ago = now - Duration::days(1);
        let week_ago = now - Duration::days(7);

        let mut stats = MediaStats::default();
        let mut by_type: BTreeMap<String, i64> = BTreeMap::new();
        for d in entries.values() {
            stats.total_files += 1;
            stats.total_size += d.size_bytes;
            if d.created_at > day_ago {
                stats.files_last_day += 1;
            }
            if d.created_at > week_ago {
                stats.files_last_week += 1;
            }
            *by_type.entry(d.mime_type.clone()).or_default() += 1;
        }
        stats.files_by_type = by_type;
        if stats.total_files > 0 {
            stats.average_file_size = stats.total_size as f64 / stats.total_files as f64;
        }
        Ok(stats)
    }

    async fn ping(&self) -> IndexResult<()> {
        self.entries.read().map(|_| ()).map_err(poisoned)
    }
}
