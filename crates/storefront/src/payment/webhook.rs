//! Signed webhook deliveries.
//!
//! The provider signs each delivery with HMAC-SHA256 over `"{t}.{body}"` and
//! sends `t=<unix seconds>,v1=<hex>[,v1=<hex>...]` in the signature header.
//! Deliveries older than [`TOLERANCE_SECS`] are rejected as replays.

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use super::CheckoutSession;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum age of a delivery.
pub const TOLERANCE_SECS: i64 = 300;

/// Events that confirm a paid checkout.
const FULFILLING_EVENTS: [&str; 2] = [
    "checkout.session.completed",
    "checkout.session.async_payment_succeeded",
];

/// Errors from verifying or parsing a delivery.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid event payload: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A verified event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

impl WebhookEvent {
    /// The checkout session this event confirms, or `None` for event types
    /// that do not trigger fulfillment.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if a fulfilling event does not carry a session.
    pub fn confirmed_session(&self) -> Result<Option<CheckoutSession>, WebhookError> {
        if !FULFILLING_EVENTS.contains(&self.event_type.as_str()) {
            return Ok(None);
        }
        let session = CheckoutSession::deserialize(&self.data.object)?;
        Ok(Some(session))
    }
}

/// Verify a delivery and parse its event, using the current time.
///
/// # Errors
///
/// Returns `InvalidSignature` if verification fails, or `Parse` if the
/// verified payload is not an event.
pub fn construct_event(
    payload: &[u8],
    signature_header: &str,
    secret: &SecretString,
) -> Result<WebhookEvent, WebhookError> {
    verify_signature(payload, signature_header, secret, Utc::now().timestamp())?;
    Ok(serde_json::from_slice(payload)?)
}

/// Verify a signature header against `payload` at time `now`.
///
/// # Errors
///
/// Returns `InvalidSignature` if the header is malformed, the timestamp is
/// outside the tolerance, or no `v1` signature matches.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &SecretString,
    now: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| WebhookError::InvalidSignature("missing timestamp".into()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| WebhookError::InvalidSignature("invalid timestamp".into()))?;

    if (now - ts).abs() > TOLERANCE_SECS {
        return Err(WebhookError::InvalidSignature(
            "timestamp outside tolerance".into(),
        ));
    }
    if signatures.is_empty() {
        return Err(WebhookError::InvalidSignature("no v1 signature".into()));
    }

    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| WebhookError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !matched {
        return Err(WebhookError::InvalidSignature("signature mismatch".into()));
    }

    debug!("Webhook signature verified");
    Ok(())
}

/// Build a signature header for `payload`, as the provider would.
#[cfg(any(test, feature = "memory-store"))]
#[must_use]
#[allow(clippy::missing_panics_doc, clippy::expect_used)]
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn secret() -> SecretString {
        SecretString::from(SECRET.to_string())
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, SECRET, NOW);
        assert!(verify_signature(body, &header, &secret(), NOW + 10).is_ok());
    }

    #[test]
    fn test_any_matching_v1_is_accepted() {
        let body = br#"{"id":"evt_1"}"#;
        let header = sign(body, SECRET, NOW).replace(",v1=", ",v1=deadbeef,v1=");
        assert!(verify_signature(body, &header, &secret(), NOW).is_ok());
    }

    #[test]
    fn test_tampered_body() {
        let header = sign(b"original", SECRET, NOW);
        assert!(matches!(
            verify_signature(b"tampered", &header, &secret(), NOW),
            Err(WebhookError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(b"body", "whsec_other", NOW);
        assert!(verify_signature(b"body", &header, &secret(), NOW).is_err());
    }

    #[test]
    fn test_replayed_delivery() {
        let header = sign(b"body", SECRET, NOW);
        assert!(verify_signature(b"body", &header, &secret(), NOW + TOLERANCE_SECS).is_ok());
        assert!(verify_signature(b"body", &header, &secret(), NOW + TOLERANCE_SECS + 1).is_err());
    }

    #[test]
    fn test_malformed_headers() {
        for header in ["", "v1=abc", "t=abc,v1=abc", "t=1700000000", "garbage"] {
            assert!(
                verify_signature(b"body", header, &secret(), NOW).is_err(),
                "{header:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_confirmed_session() {
        let event: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_test_1",
                "payment_status": "paid",
                "metadata": { "item_0_productSlug": "necessar" }
            }}
        }))
        .unwrap();
        let session = event.confirmed_session().unwrap().unwrap();
        assert_eq!(session.id.as_str(), "cs_test_1");
        assert!(session.payment_status.is_paid());

        let other: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "payment_intent.created",
            "data": { "object": { "id": "pi_1" } }
        }))
        .unwrap();
        assert!(other.confirmed_session().unwrap().is_none());
    }
}
