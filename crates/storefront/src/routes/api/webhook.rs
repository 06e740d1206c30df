//! Payment provider webhook.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde::Serialize;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::fulfillment::fulfill_session;
use crate::payment::webhook::{SIGNATURE_HEADER, WebhookError, construct_event};
use crate::state::AppState;

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Receive a signed event.
///
/// Completed (or asynchronously succeeded) checkout sessions are fulfilled;
/// other event types are acknowledged and ignored. Fulfillment is guarded by
/// the order ledger, so provider retries are harmless.
#[instrument(skip(state, headers, body))]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let secret = state
        .config()
        .payment
        .webhook_secret
        .as_ref()
        .ok_or_else(|| AppError::Configuration("STRIPE_WEBHOOK_SECRET is not set".to_string()))?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let event = construct_event(&body, signature, secret)?;
    info!(event_id = %event.id, event_type = %event.event_type, "Webhook received");

    match event.confirmed_session()? {
        Some(session) => {
            fulfill_session(state.store(), &session).await?;
        }
        None => info!(event_type = %event.event_type, "Ignoring event type"),
    }

    Ok(Json(WebhookAck { received: true }))
}
