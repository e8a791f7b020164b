//! Chanmedia Storage Library
//!
//! The object store adapter: the only component that touches the durable backing
//! store. It provides the [`Storage`] trait with S3-compatible and local filesystem
//! implementations, plus time-limited signed URL issuance.
//!
//! # Storage key format
//!
//! Keys are content-addressed and never contain user input:
//!
//! - **Originals**: `media/{digest[0..2]}/{digest}.{ext}`
//! - **Thumbnails**: `thumbs/{digest[0..2]}/{digest}s.{ext}`
//!
//! Writing the same key twice with the same bytes is a no-op from the caller's
//! perspective, so concurrent ingestion of identical content needs no lock here.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod signing;
pub mod traits;

// Re-export commonly used types
pub use chanmedia_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use signing::UrlSigner;
pub use traits::{ObjectEntry, Storage, StorageError, StorageResult};
