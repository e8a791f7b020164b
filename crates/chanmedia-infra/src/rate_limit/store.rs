use async_trait::async_trait;
use chanmedia_core::AppError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Counter state observed by one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Value after this increment
    pub count: u64,
    /// Time until the store expires the counter
    pub resets_in: Duration,
}

/// Atomic increment-with-expiry, the only primitive the limiter needs.
///
/// Implementations must perform read-increment-expire as one operation so
/// concurrent admits for the same key never undercount.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn incr_with_expiry(&self, key: &str, window: Duration)
        -> Result<WindowCount, RateLimitError>;
}
