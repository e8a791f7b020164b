/// Prefix for versioned JSON routes.
pub const API_PREFIX: &str = "/api/v1";

/// Public prefix of the signed local media route.
pub const MEDIA_ROUTE_PREFIX: &str = "/media";

/// Multipart framing allowance on top of the summed file limits.
pub const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Deadline for each dependency probed by the readiness check.
pub const READINESS_TIMEOUT_SECS: u64 = 5;
