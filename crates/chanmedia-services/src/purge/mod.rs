mod service;

pub use service::{PurgeError, PurgeService};
