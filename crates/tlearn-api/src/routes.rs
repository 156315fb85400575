//! API routes.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::chat::{get_chat, post_chat};
use crate::handlers::health::{health, ready};
use crate::handlers::settings::{get_settings, update_settings};
use crate::handlers::summaries::{
    delete_summary, list_summaries, start_summary, translate_summary,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let summary_routes = Router::new()
        // Trigger + poll
        .route(
            "/videos/:youtube_id/summaries",
            get(list_summaries).post(start_summary),
        )
        .route(
            "/videos/:youtube_id/summaries/:summary_id",
            delete(delete_summary),
        )
        // On-demand translation of a stored summary
        .route("/summaries/:summary_id/translate", post(translate_summary));

    let chat_routes = Router::new().route("/videos/:youtube_id/chat", get(get_chat).post(post_chat));

    let settings_routes = Router::new().route("/settings", get(get_settings).post(update_settings));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(summary_routes)
        .merge(chat_routes)
        .merge(settings_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
