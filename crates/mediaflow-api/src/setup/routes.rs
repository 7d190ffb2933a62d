//! Route configuration and setup

use crate::constants::ADMIN_MEDIA_PREFIX;
use crate::handlers::{health, media, multipart, upload};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router<()> {
    let body_limit = state.config.max_upload_size_bytes();

    let media_routes = Router::new()
        .route("/upload", post(upload::basic_upload))
        .route(
            "/multipart/upload/{*key}",
            post(multipart::initiate_or_complete)
                .put(multipart::upload_part)
                .delete(multipart::abort),
        )
        .route("/{id}", get(media::get_media))
        .route("/{id}/metadata", get(media::get_media_metadata))
        .route("/{id}/reprocess", post(media::reprocess_media));

    Router::new()
        .route("/health", get(health::liveness_check))
        .nest(ADMIN_MEDIA_PREFIX, media_routes)
        .layer(ConcurrencyLimitLayer::new(state.config.http_concurrency_limit()))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable())
        .layer(setup_cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn setup_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers(Any)
}
