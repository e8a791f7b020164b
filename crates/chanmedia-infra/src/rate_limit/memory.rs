use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::store::{CounterStore, RateLimitError, WindowCount};

#[derive(Debug, Clone)]
struct Slot {
    count: u64,
    expires_at: Instant,
}

/// Process-local counter store with per-key expiry.
///
/// Expired counters are treated as absent on access, the same way Redis expires
/// keys lazily. Only suitable for a single replica; use Redis across processes.
pub struct MemoryCounterStore {
    shards: Vec<Mutex<HashMap<String, Slot>>>,
    max_keys_per_shard: usize,
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::with_shards(16)
    }
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(HashMap::new())).collect(),
            max_keys_per_shard: 10_000,
        }
    }

    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards.len()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_with_expiry(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<WindowCount, RateLimitError> {
        let now = Instant::now();
        let mut slots = self.shards[self.shard_index(key)].lock().await;

        if slots.len() >= self.max_keys_per_shard {
            let before = slots.len();
            slots.retain(|_, slot| slot.expires_at > now);
            tracing::debug!(
                evicted = before - slots.len(),
                "Dropped expired rate limit counters"
            );
        }

        let slot = slots.entry(key.to_string()).or_insert(Slot {
            count: 0,
            expires_at: now + window,
        });
        if slot.expires_at <= now {
            slot.count = 0;
            slot.expires_at = now + window;
        }
        slot.count += 1;

        Ok(WindowCount {
            count: slot.count,
            resets_in: slot.expires_at.saturating_duration_since(now),
        })
    }
}
