//! Order confirmation lookup.
//!
//! The confirmation page polls this after the provider redirects back. The
//! lookup can also fulfill the order, converging with the webhook on the
//! same ledger claim, and it clears the shopper's cart once per session.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{error, info, instrument};

use nonito_core::{Cart, CheckoutSessionId, PaymentStatus};

use crate::checkout::CheckoutError;
use crate::error::{AppError, Result};
use crate::fulfillment::fulfill_session;
use crate::models::session_keys;
use crate::payment::{CheckoutSession, SessionLineItem};
use crate::routes::cart::write_cart;
use crate::state::AppState;

/// Confirmed session ids remembered per shopper session.
const MAX_CONFIRMED_ORDERS: usize = 20;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Order summary for the confirmation page.
#[derive(Debug, Serialize)]
pub struct OrderSummary {
    pub id: CheckoutSessionId,
    pub status: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub shipping: Option<serde_json::Value>,
    /// Minor units.
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub line_items: Vec<SessionLineItem>,
    pub metadata: BTreeMap<String, String>,
    pub payment_status: PaymentStatus,
    pub cart_cleared: bool,
}

impl OrderSummary {
    fn new(session: CheckoutSession, cart_cleared: bool) -> Self {
        let customer = session.customer_details.unwrap_or_default();
        Self {
            id: session.id,
            status: session.status,
            customer_email: customer.email,
            customer_name: customer.name,
            shipping: session.shipping_details,
            amount_total: session.amount_total,
            currency: session.currency,
            line_items: session.line_items.map(|items| items.data).unwrap_or_default(),
            metadata: session.metadata,
            payment_status: session.payment_status,
            cart_cleared,
        }
    }
}

/// Clear the cart the first time a paid session is confirmed in this
/// shopper session. Returns whether the cart was cleared now.
async fn clear_cart_once(session: &Session, id: &CheckoutSessionId) -> Result<bool> {
    let mut confirmed: Vec<String> = session
        .get(session_keys::CONFIRMED_ORDERS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    if confirmed.iter().any(|seen| seen == id.as_str()) {
        return Ok(false);
    }

    write_cart(session, &Cart::new()).await?;

    confirmed.push(id.to_string());
    if confirmed.len() > MAX_CONFIRMED_ORDERS {
        confirmed.drain(..confirmed.len() - MAX_CONFIRMED_ORDERS);
    }
    session
        .insert(session_keys::CONFIRMED_ORDERS, confirmed)
        .await
        .map_err(|e| AppError::Internal(format!("failed to persist session: {e}")))?;

    Ok(true)
}

/// Look up a checkout session.
#[instrument(skip(state, session, query))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<SessionQuery>,
) -> Result<Json<OrderSummary>> {
    let gateway = state.payment().ok_or(CheckoutError::NotConfigured)?;

    let raw_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("Session ID is required".to_string()))?;
    let id = CheckoutSessionId::parse(&raw_id)
        .map_err(|_| AppError::BadRequest("Invalid session ID".to_string()))?;

    let checkout = gateway.retrieve_session(&id).await?;

    if state.config().fulfill_on_session_poll {
        // Lookup succeeds even if fulfillment fails; the webhook retries it.
        if let Err(e) = fulfill_session(state.store(), &checkout).await {
            error!(session_id = %id, error = %e, "Fulfillment from session lookup failed");
        }
    }

    let cart_cleared = if checkout.payment_status.is_paid() {
        clear_cart_once(&session, &checkout.id).await?
    } else {
        false
    };
    if cart_cleared {
        info!(session_id = %id, "Cart cleared after confirmed order");
    }

    Ok(Json(OrderSummary::new(checkout, cart_cleared)))
}
