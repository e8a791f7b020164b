//! Chanmedia database layer
//!
//! Hosts the duplicate index: the content digest to [`MediaDescriptor`] map that is
//! consulted before any object store write and updated with an atomic
//! insert-if-absent once a write has succeeded.
//!
//! [`MediaDescriptor`]: chanmedia_core::models::MediaDescriptor

pub mod index;
pub mod pool;

pub use index::{
    DuplicateIndex, IndexError, IndexResult, InsertOutcome, MemoryDuplicateIndex,
    PgDuplicateIndex, PurgeFilter,
};
pub use pool::connect;
