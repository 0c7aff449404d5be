//! Tradepost storefront library.
//!
//! Server-rendered shop front for the Tradepost marketplace. Catalogue,
//! carts, orders and accounts live in the Tradepost REST backend; this crate
//! renders them, keeps per-visitor state (guest cart, applied coupon, flash
//! messages) in the session store, and prices checkouts.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::services::ServeDir;

use state::AppState;

/// Directory of the compiled stylesheet and images, relative to the
/// workspace root.
pub const STATIC_DIR: &str = "crates/storefront/static";

/// Pages, health checks and static assets.
///
/// Session, request id, tracing and Sentry layers are added by the binary.
pub fn router() -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR));

    middleware::security_headers()
        .into_iter()
        .fold(router, |router, layer| router.layer(layer))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the session database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match db::ping(state.pool()).await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
