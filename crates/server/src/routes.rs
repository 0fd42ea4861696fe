//! Route configuration.

use crate::auth::trace_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{any, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        // Script management, principal from gateway headers
        .route(
            "/v1/scripts",
            get(handlers::list_scripts).post(handlers::create_script),
        )
        .route(
            "/v1/scripts/{id}",
            get(handlers::get_script)
                .put(handlers::update_script)
                .delete(handlers::delete_script),
        )
        .route(
            "/v1/scripts/{id}/content",
            get(handlers::get_script_content),
        )
        .route("/v1/scripts/{id}/rename", post(handlers::rename_script));

    let lambda_routes = Router::new()
        .route("/lambda/{scope}/{name}", any(handlers::invoke_script))
        .route(
            "/lambda/{scope}/{name}/{*rest}",
            any(handlers::invoke_script_path),
        );

    let mut router = Router::new().merge(api_routes).merge(lambda_routes);

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router
        .layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
