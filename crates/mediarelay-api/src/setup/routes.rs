//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use mediarelay_core::policy::cors_headers;
use mediarelay_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router {
    let http_concurrency_limit = state.config.http_concurrency_limit.max(1);
    tracing::info!(
        http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    let mut app = Router::new()
        .route(
            "/relay",
            get(handlers::relay::relay_media).options(handlers::relay::relay_preflight),
        )
        .route("/health", get(handlers::health::health_check))
        .with_state(state);

    // CORS on every response, errors and preflights included
    for (name, value) in cors_headers() {
        app = app.layer(SetResponseHeaderLayer::overriding(name, value));
    }

    app.layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
}
