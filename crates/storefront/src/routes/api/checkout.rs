//! Checkout session creation.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::checkout::{CheckoutError, build_order, parse_items};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::state::AppState;

/// Redirect target for the hosted checkout page.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub url: String,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Validate a checkout request and open a payment session for it.
///
/// Items are re-priced from the catalog store; any client-sent prices are
/// ignored. One bad item rejects the whole request.
#[instrument(skip(state, headers, body))]
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CheckoutResponse>> {
    let gateway = state.payment().ok_or(CheckoutError::NotConfigured)?;
    if !is_json(&headers) {
        return Err(AppError::UnsupportedMediaType);
    }

    let items = parse_items(&body)?;
    let order = build_order(state.catalog_store(), items).await?;

    add_breadcrumb("checkout", "Creating checkout session", None);
    let session = gateway.create_checkout_session(&order).await?;
    info!(
        session_id = %session.id,
        lines = order.lines.len(),
        subtotal = order.subtotal().amount(),
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse { url: session.url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_is_json() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_json(&headers));
    }
}
