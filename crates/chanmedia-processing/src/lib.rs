//! Chanmedia Processing Library
//!
//! The CPU-side of ingestion and its orchestration:
//! - [`sniff`]: content digest and MIME classification from magic bytes
//! - [`thumbnail`]: reduced-size renditions for visual media
//! - [`upload`]: the ingestion pipeline tying sniffing, the duplicate index,
//!   thumbnailing and the object store together

pub mod sniff;
pub mod thumbnail;
pub mod upload;

pub use sniff::{content_digest, Fingerprint, SniffError, Sniffer};
pub use thumbnail::{MediaThumbnailer, Thumbnail, ThumbnailDeriver, ThumbnailError, ThumbnailOutcome};
pub use upload::{
    IngestError, IngestOutcome, IngestPermit, IngestPipeline, IngestPolicy, IngestStage,
    ThumbnailStatus, Upload,
};
