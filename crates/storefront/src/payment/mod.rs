//! Payment provider boundary.
//!
//! # Architecture
//!
//! - [`PaymentGateway`] is the seam: create a hosted checkout session for a
//!   priced order, and read a session back
//! - [`StripeClient`] talks to the Stripe REST API with form-encoded requests
//! - [`webhook`] verifies signed event deliveries and parses them
//!
//! The provider owns the checkout page and the payment itself; this crate
//! only ever sees session ids, payment status and the metadata it attached.

mod stripe;
pub mod webhook;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nonito_core::{CheckoutSessionId, PaymentStatus};

use crate::checkout::CheckoutOrder;

pub use stripe::{StripeClient, encode_checkout_form};

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider rejected the request.
    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Session does not exist at the provider.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The provider answered without a redirect URL.
    #[error("checkout session has no redirect URL")]
    MissingUrl,
}

/// A freshly created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: CheckoutSessionId,
    pub url: String,
}

/// Customer details collected by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A line as the provider reports it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItems {
    #[serde(default)]
    pub data: Vec<SessionLineItem>,
}

/// A checkout session as returned by the provider, either from a lookup or
/// embedded in a webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: CheckoutSessionId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub shipping_details: Option<serde_json::Value>,
    /// Minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub line_items: Option<SessionLineItems>,
    #[serde(default)]
    pub url: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The payment provider, as seen by checkout and fulfillment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session for `order`.
    async fn create_checkout_session(
        &self,
        order: &CheckoutOrder,
    ) -> Result<CreatedSession, PaymentError>;

    /// Look a session up, including its line items.
    async fn retrieve_session(
        &self,
        id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError>;
}
