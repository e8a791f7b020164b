use crate::error::HttpAppError;
use crate::state::HttpLimitState;
use crate::utils::ip_extraction::extract_client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chanmedia_core::AppError;
use chanmedia_infra::Decision;
use std::net::SocketAddr;

static X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

fn set_header(response: &mut Response, name: &HeaderName, value: u64) {
    if let Ok(header_value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name.clone(), header_value);
    }
}

/// HTTP rate limiting middleware
///
/// Keys the shared `http` limiter on the client IP (see
/// [`extract_client_ip`](crate::utils::ip_extraction::extract_client_ip)), so the
/// budget holds across every replica that shares the counter store.
///
/// # Headers
/// - `X-RateLimit-Limit`: requests allowed per window
/// - `X-RateLimit-Remaining`: requests left in the current window
/// - `Retry-After`: seconds until the window resets (429 only)
pub async fn rate_limit_middleware(
    State(http): State<HttpLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let socket_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = extract_client_ip(request.headers(), socket_addr.as_ref(), http.trusted_proxy_count);
    let limit = http.limiter.policy().limit;

    match http.limiter.admit(&ip).await {
        Decision::Admitted { remaining, .. } => {
            let mut response = next.run(request).await;
            set_header(&mut response, &X_RATELIMIT_LIMIT, limit);
            set_header(&mut response, &X_RATELIMIT_REMAINING, remaining);
            response
        }
        Decision::Denied { retry_after } => {
            tracing::info!(
                client_ip = %ip,
                path = %request.uri().path(),
                limit,
                "HTTP rate limit exceeded"
            );

            let retry_after_secs =
                (retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0)).max(1);

            let mut response =
                HttpAppError(AppError::RateLimited { retry_after_secs }).into_response();
            set_header(&mut response, &X_RATELIMIT_LIMIT, limit);
            set_header(&mut response, &X_RATELIMIT_REMAINING, 0);

            response
        }
    }
}
