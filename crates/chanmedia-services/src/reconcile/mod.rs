mod service;

pub use service::{ReconcileError, ReconcileService};
