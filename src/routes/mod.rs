//! HTTP route handlers for the diagnostic pages.
//!
//! Dispatch depends only on the first path segment (plus the second one under
//! `/json`) and the query string: `/env/anything` is the same page as `/env`.
//! Diagnostic routes are never cached; everything unmatched falls through to
//! the static file service.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod env;
pub mod health;
pub mod home;
pub mod json;
pub mod ping;
pub mod status;
pub mod write;

use axum::{
    middleware,
    routing::{get, MethodRouter},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CACHE_CONTROL_NO_STORE, CACHE_CONTROL_STATIC};
use crate::http::create_static_service;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Route `/{segment}` and everything below it to the same handler.
fn route_segment(
    router: Router<AppState>,
    segment: &str,
    handler: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(&format!("/{}", segment), handler.clone())
        .route(&format!("/{}/{{*rest}}", segment), handler)
}

/// Creates the Axum router with all routes and cache headers.
pub fn create_router(state: AppState) -> Router {
    // Diagnostic pages - never cached, they report live store state
    let mut diagnostic_routes = Router::new()
        .route("/", get(home::index))
        .route("/json/read", get(json::read))
        .route("/json/dbstatus", get(json::dbstatus));
    diagnostic_routes = route_segment(diagnostic_routes, "env", get(env::env));
    diagnostic_routes = route_segment(diagnostic_routes, "ping", get(ping::ping));
    diagnostic_routes = route_segment(diagnostic_routes, "dbstatus", get(status::dbstatus));
    diagnostic_routes = route_segment(
        diagnostic_routes,
        "write",
        get(write::write).post(write::write),
    );
    let diagnostic_routes = diagnostic_routes.layer(SetResponseHeaderLayer::if_not_present(
        CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
    ));

    // Health check - no caching, always fresh for liveness probes
    let health_routes = Router::new().route("/health", get(health::health));

    // Static files - anything no handler claims, 404 from the file service
    let static_routes = Router::new()
        .fallback_service(create_static_service(&state.config.http.static_dir))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_STATIC),
        ));

    Router::new()
        .merge(diagnostic_routes)
        .merge(health_routes)
        .merge(static_routes)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
