//! Client identity extraction
//!
//! The rate limiter keys on the client IP. Forwarding headers are only consulted when
//! the deployment declares trusted proxies; otherwise any client could pick its own
//! identity by sending `X-Forwarded-For`.

use axum::extract::{ConnectInfo, FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::state::HttpLimitState;

const UNKNOWN: &str = "unknown";

/// Extract the client IP.
///
/// # Arguments
/// * `headers` - HTTP request headers
/// * `socket_addr` - Peer address of the TCP connection
/// * `trusted_proxy_count` - Number of proxies in front of this service
///
/// # Returns
/// The client IP as a string, or "unknown" when nothing usable is present
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    if trusted_proxy_count > 0 {
        if let Some(forwarded_for) = headers.get("x-forwarded-for") {
            if let Ok(header_value) = forwarded_for.to_str() {
                if let Some(ip) = extract_from_forwarded_for(header_value, trusted_proxy_count) {
                    return ip;
                }
            }
        }

        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(header_value) = real_ip.to_str() {
                let trimmed = header_value.trim();
                if is_valid_ip(trimmed) {
                    return trimmed.to_string();
                }
            }
        }
    }

    if let Some(addr) = socket_addr {
        return addr.ip().to_string();
    }

    UNKNOWN.to_string()
}

/// Pick the client out of an `X-Forwarded-For` chain (`client, proxy1, proxy2, ...`).
///
/// With N trusted proxies the last N entries were appended by infrastructure we
/// control; the entry just before them is the client. A chain shorter than that
/// falls back to its last entry.
fn extract_from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if ips.len() <= trusted_proxy_count {
        ips.last()?
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)?
    };

    is_valid_ip(candidate).then(|| candidate.to_string())
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

/// Client IP as resolved by [`extract_client_ip`] with the configured proxy trust.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    HttpLimitState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let http = HttpLimitState::from_ref(state);
        let socket_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientIp(extract_client_ip(
            &parts.headers,
            socket_addr.as_ref(),
            http.trusted_proxy_count,
        )))
    }
}
