//! Admin page and JSON API routes.

use crate::handlers::{admin_page, api_request};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Form and JSON bodies above this size are rejected.
pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// `/admin/:module[/*rest]` (GET, POST) and `/api/:module[/:id]` (GET, PUT, POST, DELETE).
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/:module", get(admin_page).post(admin_page))
        .route("/admin/:module/*rest", get(admin_page).post(admin_page))
        .route("/api/:module", get(api_request).post(api_request).put(api_request).delete(api_request))
        .route(
            "/api/:module/:id",
            get(api_request).post(api_request).put(api_request).delete(api_request),
        )
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
