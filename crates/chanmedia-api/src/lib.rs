//! Chanmedia API Library
//!
//! The HTTP surface over the ingestion pipeline: multipart uploads, descriptor lookup
//! with fresh signed URLs, signed local media delivery and the admin maintenance
//! routes. Also hosts application setup for the `chanmedia-api` binary.

pub mod constants;
pub mod error;
mod handlers;
mod middleware;
pub mod setup;
pub mod state;
mod utils;

pub use error::{ErrorResponse, HttpAppError};
