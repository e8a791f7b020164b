//! Fixed-window request admission over an atomic counter store.
//!
//! The first call for an identity in a window sets its counter to 1 with an expiry
//! equal to the window width. Later calls increment it. A call that observes
//! `count > limit` is denied and still counted. Window rollover relies entirely on the
//! store's per-key expiry; nothing here runs a cleanup timer.

mod limiter;
mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod store;

pub use limiter::{Decision, RateLimiter, RatePolicy};
pub use memory::MemoryCounterStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, RateLimitError, WindowCount};
