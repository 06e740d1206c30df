//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (store reachable)
//!
//! # Catalog
//! GET  /api/products           - Active products and fabrics (cached)
//!
//! # Cart (session-persisted, JSON)
//! GET  /cart                   - Cart with resolved lines and totals
//! POST /cart/add               - Add item (merges identical selections)
//! POST /cart/update            - Set quantity (<= 0 removes)
//! POST /cart/remove            - Remove item
//! POST /cart/clear             - Empty the cart
//! GET  /cart/count             - Item count
//!
//! # Checkout
//! POST /api/checkout           - Validate and create payment session (rate limited)
//! POST /api/webhook/stripe     - Signed payment provider events
//! GET  /api/session            - Order confirmation lookup
//! ```

pub mod api;
pub mod cart;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::checkout_rate_limiter;
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .route("/count", get(cart::count))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(api::products::index))
        .route(
            "/checkout",
            post(api::checkout::create).layer(checkout_rate_limiter()),
        )
        .route("/webhook/stripe", post(api::webhook::stripe))
        .route("/session", get(api::session::show))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/cart", cart_routes())
        .nest("/api", api_routes())
}
