//! Chanmedia Infrastructure Library
//!
//! Shared infrastructure used by the ingestion pipeline and the HTTP surface:
//! - Rate limiting over an external atomic counter store (Redis) or process memory
//! - Telemetry initialization

#[cfg(feature = "observability-basic")]
pub mod telemetry;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-export commonly used types
#[cfg(feature = "observability-basic")]
pub use telemetry::{init_telemetry, shutdown_telemetry, LogFormat};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{
    CounterStore, Decision, MemoryCounterStore, RateLimitError, RateLimiter, RatePolicy,
    WindowCount,
};

#[cfg(feature = "redis")]
pub use rate_limit::RedisCounterStore;
