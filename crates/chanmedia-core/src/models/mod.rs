//! Data models shared by the ingestion pipeline, the index and the HTTP surface.

mod media;
mod purge;
mod stats;

pub use media::*;
pub use purge::*;
pub use stats::*;
