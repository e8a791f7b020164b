//! Chanmedia Services
//!
//! Operations that run beside ingestion:
//! - [`purge`]: policy-driven bulk deletion with a dry-run mode
//! - [`reconcile`]: removal of stored blobs that no descriptor references
//! - [`stats`]: aggregate counters for the admin surface

#[cfg(feature = "purge")]
pub mod purge;
#[cfg(feature = "reconcile")]
pub mod reconcile;
pub mod stats;

#[cfg(feature = "purge")]
pub use purge::{PurgeError, PurgeService};
#[cfg(feature = "reconcile")]
pub use reconcile::{ReconcileError, ReconcileService};
pub use stats::StatsService;
