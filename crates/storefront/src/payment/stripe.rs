//! Stripe REST client.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed
//! keys for nested values (`line_items[0][quantity]=2`), and amounts in
//! minor units.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{error, instrument};

use nonito_core::{CheckoutSessionId, CurrencyCode};

use super::{CheckoutSession, CreatedSession, PaymentError, PaymentGateway};
use crate::checkout::{CheckoutOrder, ShippingOption};
use crate::config::StorefrontConfig;

/// Accepted payment methods.
const PAYMENT_METHODS: [&str; 2] = ["card", "klarna"];

/// Countries shipped to.
const SHIPPING_COUNTRIES: [&str; 4] = ["SE", "NO", "DK", "FI"];

/// Checkout page language.
const LOCALE: &str = "sv";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for Stripe Checkout.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    success_url: String,
    cancel_url: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedSessionBody {
    id: CheckoutSessionId,
    #[serde(default)]
    url: Option<String>,
}

impl StripeClient {
    /// Create a client.
    #[must_use]
    pub fn new(
        secret_key: SecretString,
        api_base: &str,
        success_url: String,
        cancel_url: String,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: api_base.trim_end_matches('/').to_string(),
                secret_key,
                success_url,
                cancel_url,
            }),
        }
    }

    /// Create a client from configuration, or `None` without a secret key.
    #[must_use]
    pub fn from_config(config: &StorefrontConfig) -> Option<Self> {
        let secret_key = config.payment.secret_key.clone()?;
        Some(Self::new(
            secret_key,
            &config.payment.api_base,
            config.checkout_success_url(),
            config.checkout_cancel_url(),
        ))
    }

    /// Read a response body, mapping non-success statuses to `PaymentError`.
    async fn read_body(response: reqwest::Response) -> Result<String, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message)
            .unwrap_or_else(|| body.chars().take(200).collect());

        error!(status = %status, message = %message, "Stripe API returned non-success status");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound(message));
        }
        Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, order), fields(lines = order.lines.len()))]
    async fn create_checkout_session(
        &self,
        order: &CheckoutOrder,
    ) -> Result<CreatedSession, PaymentError> {
        let form = encode_checkout_form(order, &self.inner.success_url, &self.inner.cancel_url);

        let response = self
            .inner
            .client
            .post(format!("{}/v1/checkout/sessions", self.inner.api_base))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        let created: CreatedSessionBody = serde_json::from_str(&body)?;
        let url = created.url.ok_or(PaymentError::MissingUrl)?;

        Ok(CreatedSession {
            id: created.id,
            url,
        })
    }

    #[instrument(skip(self), fields(session_id = %id))]
    async fn retrieve_session(
        &self,
        id: &CheckoutSessionId,
    ) -> Result<CheckoutSession, PaymentError> {
        let response = self
            .inner
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}?expand[]=line_items",
                self.inner.api_base,
                id.as_str()
            ))
            .bearer_auth(self.inner.secret_key.expose_secret())
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Encode a checkout order as Stripe form fields.
#[must_use]
pub fn encode_checkout_form(
    order: &CheckoutOrder,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let currency = CurrencyCode::SEK.provider_code();
    let mut form: Vec<(String, String)> = vec![("mode".into(), "payment".into())];

    for (i, method) in PAYMENT_METHODS.iter().enumerate() {
        form.push((format!("payment_method_types[{i}]"), (*method).to_string()));
    }

    for (i, line) in order.lines.iter().enumerate() {
        let prefix = format!("line_items[{i}]");
        let price = format!("{prefix}[price_data]");
        let product = format!("{price}[product_data]");

        form.push((format!("{price}[currency]"), currency.to_string()));
        form.push((
            format!("{price}[unit_amount]"),
            line.unit_price().minor_units().to_string(),
        ));
        form.push((format!("{product}[name]"), line.product.name.clone()));
        form.push((format!("{product}[description]"), line.description()));
        for (key, value) in line.product_metadata() {
            form.push((format!("{product}[metadata][{key}]"), value));
        }
        form.push((format!("{prefix}[quantity]"), line.quantity.to_string()));
    }

    for (i, country) in SHIPPING_COUNTRIES.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            (*country).to_string(),
        ));
    }

    for (i, option) in order.shipping_options.iter().enumerate() {
        encode_shipping_option(&mut form, i, option, currency);
    }

    for (key, value) in &order.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }

    form.push(("success_url".into(), success_url.to_string()));
    form.push(("cancel_url".into(), cancel_url.to_string()));
    form.push(("locale".into(), LOCALE.to_string()));
    form
}

fn encode_shipping_option(
    form: &mut Vec<(String, String)>,
    index: usize,
    option: &ShippingOption,
    currency: &str,
) {
    let rate = format!("shipping_options[{index}][shipping_rate_data]");
    form.push((format!("{rate}[type]"), "fixed_amount".into()));
    form.push((
        format!("{rate}[fixed_amount][amount]"),
        option.amount.minor_units().to_string(),
    ));
    form.push((format!("{rate}[fixed_amount][currency]"), currency.to_string()));
    form.push((format!("{rate}[display_name]"), option.display_name.to_string()));
    for (bound, days) in [
        ("minimum", option.min_business_days),
        ("maximum", option.max_business_days),
    ] {
        form.push((
            format!("{rate}[delivery_estimate][{bound}][unit]"),
            "business_day".into(),
        ));
        form.push((
            format!("{rate}[delivery_estimate][{bound}][value]"),
            days.to_string(),
        ));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::checkout::OrderLine;
    use crate::test_support::{fabric, product};
    use nonito_core::{FabricRole, Notes};

    fn order() -> CheckoutOrder {
        CheckoutOrder::new(vec![
            OrderLine {
                product: product("necessar", 350, 10),
                fabric: fabric("linne", FabricRole::Outer),
                lining: Some(fabric("bomull-rosa", FabricRole::Inner)),
                quantity: 2,
                notes: Notes::sanitize("Alva").unwrap(),
            },
            OrderLine {
                product: product("mini-pouch", 150, 10),
                fabric: fabric("manchester", FabricRole::Outer),
                lining: None,
                quantity: 1,
                notes: None,
            },
        ])
    }

    fn encoded() -> HashMap<String, String> {
        encode_checkout_form(&order(), "https://nonito.se/ok", "https://nonito.se/produkter")
            .into_iter()
            .collect()
    }

    #[test]
    fn test_line_amounts_in_minor_units() {
        let form = encoded();
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "35000");
        assert_eq!(form["line_items[0][quantity]"], "2");
        assert_eq!(form["line_items[1][price_data][unit_amount]"], "15000");
        assert_eq!(form["line_items[0][price_data][currency]"], "sek");
        assert_eq!(
            form["line_items[0][price_data][product_data][metadata][lining]"],
            "bomull-rosa"
        );
    }

    #[test]
    fn test_session_options() {
        let form = encoded();
        assert_eq!(form["mode"], "payment");
        assert_eq!(form["payment_method_types[1]"], "klarna");
        assert_eq!(form["shipping_address_collection[allowed_countries][3]"], "FI");
        assert_eq!(form["locale"], "sv");
        assert_eq!(form["cancel_url"], "https://nonito.se/produkter");
    }

    #[test]
    fn test_shipping_and_metadata() {
        let form = encoded();
        // Subtotal 850: free option first.
        assert_eq!(
            form["shipping_options[0][shipping_rate_data][fixed_amount][amount]"],
            "0"
        );
        assert_eq!(
            form["shipping_options[1][shipping_rate_data][fixed_amount][amount]"],
            "4900"
        );
        assert_eq!(
            form["shipping_options[1][shipping_rate_data][delivery_estimate][maximum][value]"],
            "7"
        );
        assert_eq!(form["metadata[item_1_productSlug]"], "mini-pouch");
        assert_eq!(form["metadata[item_0_notes]"], "Alva");
    }
}
