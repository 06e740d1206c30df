//! Nonito Storefront library.
//!
//! Catalog, cart, checkout and order fulfillment for the Nonito shop,
//! exposed as a library so the binary, the CLI and the integration tests
//! share one router.
//!
//! # Modules
//!
//! - [`catalog_cache`] - Stale-while-revalidate catalog snapshot
//! - [`checkout`] - Checkout request validation and order pricing
//! - [`payment`] - Payment provider boundary and webhook verification
//! - [`fulfillment`] - Idempotent stock deduction for paid orders
//! - [`store`] - Storage seams, implemented by [`db::PgStore`]

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog_cache;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod fulfillment;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "memory-store"))]
pub mod test_support;

use std::time::Duration;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::{SessionManagerLayer, SessionStore};
use tracing::Span;

use crate::state::AppState;

/// Build the storefront router with its request-scoped middleware.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app<S>(state: AppState, session_layer: SessionManagerLayer<S>) -> Router
where
    S: SessionStore + Clone,
{
    routes::routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
