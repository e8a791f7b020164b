//! Ingestion pipeline.
//!
//! Orchestrates rate admission, sniffing, the duplicate index, thumbnailing and the
//! object store into one operation. Multipart framing is the caller's job; the
//! pipeline receives already extracted bytes and metadata.

mod pipeline;
mod types;

pub use pipeline::{IngestPermit, IngestPipeline};
pub use types::{
    IngestError, IngestOutcome, IngestPolicy, IngestStage, ThumbnailStatus, Upload,
};
