//! Dub economy server library.
//!
//! Storage, the ledger/reward/shop services and the HTTP surface, exposed as
//! a library so the CLI and the integration tests can drive them directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::from_fn,
    routing::get,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
///
/// Layers, outermost first: Sentry, tracing, request id. The request id runs
/// inside the trace span so it can record itself there.
pub fn app(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
            account = tracing::field::Empty,
        )
    });

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .merge(routes::routes())
        .with_state(state)
        .layer(from_fn(middleware::request_id_middleware))
        .layer(trace)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
