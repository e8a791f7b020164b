//! Route configuration and setup

use crate::constants::{API_PREFIX, MEDIA_ROUTE_PREFIX};
use crate::handlers;
use crate::handlers::upload::request_body_limit;
use crate::middleware::rate_limit_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use chanmedia_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config);

    let body_limit = usize::try_from(request_body_limit(
        config.max_file_size_bytes(),
        config.max_files_per_request(),
    ))
    .unwrap_or(usize::MAX);

    let http_concurrency_limit = config.http_concurrency_limit();

    tracing::info!(
        body_limit_bytes = body_limit,
        http_concurrency_limit,
        http_rate_limit = config.http_rate_limit(),
        http_rate_window_secs = config.http_rate_window_secs(),
        "HTTP limits configured"
    );

    let app = Router::new()
        .merge(health_routes())
        .merge(file_routes(body_limit))
        .merge(admin_routes())
        .merge(media_routes())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn_with_state(
            state.http.clone(),
            rate_limit_middleware,
        ))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(origin) => Some(origin),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    }
}

fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(handlers::health::liveness_check))
        .route("/health/ready", get(handlers::health::readiness_check))
}

fn file_routes(body_limit: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/files/upload", API_PREFIX),
            post(handlers::upload::upload_files).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            &format!("{}/files/check", API_PREFIX),
            post(handlers::files::check_file),
        )
        .route(
            &format!("{}/files/stats", API_PREFIX),
            get(handlers::files::get_stats),
        )
        .route(
            &format!("{}/files/banned", API_PREFIX),
            get(handlers::files::get_banned),
        )
        .route(
            &format!("{}/files/{{digest}}", API_PREFIX),
            get(handlers::files::get_file),
        )
}

/// Maintenance routes; protect `/api/v1/admin` at the gateway.
fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            &format!("{}/admin/files/purge", API_PREFIX),
            post(handlers::admin::purge_files),
        )
        .route(
            &format!("{}/admin/files/reconcile", API_PREFIX),
            post(handlers::admin::reconcile_storage),
        )
}

fn media_routes() -> Router<Arc<AppState>> {
    Router::new().route(
        &format!("{}/{{*key}}", MEDIA_ROUTE_PREFIX),
        get(handlers::media::serve_media),
    )
}
