//! Server-side checkout validation.
//!
//! Turns a client-asserted list of items into a [`CheckoutOrder`] priced from
//! the catalog store. Validation is fail-closed: the first item that does not
//! parse or does not resolve rejects the whole batch.

mod order;
mod request;

use thiserror::Error;
use tracing::{debug, instrument};

use nonito_core::{FabricRole, Price};

use crate::db::RepositoryError;
use crate::store::CatalogStore;

pub use order::{CheckoutOrder, DELIVERY_ESTIMATE_DAYS, OrderLine, ShippingOption, shipping_options};
pub use request::{CheckoutItem, parse_items};

/// Maximum number of items in one checkout.
pub const MAX_ITEMS: usize = 20;

/// Maximum quantity of a single item.
pub const MAX_QUANTITY: u32 = 10;

/// Subtotal at which shipping becomes free.
pub const FREE_SHIPPING_THRESHOLD: Price = Price::new(500);

/// Flat shipping fee below the threshold.
pub const STANDARD_SHIPPING: Price = Price::new(49);

/// Reasons a checkout is rejected.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Invalid request body")]
    MalformedBody,

    #[error("No items in cart")]
    EmptyCart,

    #[error("Too many items (max {MAX_ITEMS})")]
    TooManyItems,

    #[error("Invalid item in cart")]
    InvalidItem { index: usize },

    #[error("Invalid product: {0}")]
    UnknownProduct(String),

    #[error("Invalid fabric selection for {0}")]
    InvalidFabric(String),

    #[error("Product {0} does not have lining option")]
    LiningNotOffered(String),

    #[error("Invalid lining selection")]
    InvalidLining,

    /// Payment credentials or redirect base are missing.
    #[error("Server configuration error")]
    NotConfigured,

    #[error("catalog lookup failed: {0}")]
    Repository(#[from] RepositoryError),
}

impl PartialEq for CheckoutError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidItem { index: a }, Self::InvalidItem { index: b }) => a == b,
            (Self::UnknownProduct(a), Self::UnknownProduct(b))
            | (Self::InvalidFabric(a), Self::InvalidFabric(b))
            | (Self::LiningNotOffered(a), Self::LiningNotOffered(b)) => a == b,
            (Self::Repository(_), Self::Repository(_)) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl CheckoutError {
    /// Whether the shopper can fix this by changing the request.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::NotConfigured | Self::Repository(_))
    }
}

/// Resolve every item against the store and price the order.
///
/// Per item, in order: the product must exist and be active; the fabric must
/// be an active outer fabric offered for the product; a lining requires the
/// product's lining option and must be an active inner fabric the product
/// accepts. Prices come from the store only.
///
/// # Errors
///
/// Returns the first referential error, or `Repository` if a lookup fails.
#[instrument(skip(store, items), fields(items = items.len()))]
pub async fn build_order(
    store: &dyn CatalogStore,
    items: Vec<CheckoutItem>,
) -> Result<CheckoutOrder, CheckoutError> {
    let (outer, inner) = tokio::try_join!(
        store.active_fabrics(FabricRole::Outer),
        store.active_fabrics(FabricRole::Inner),
    )?;

    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = store
            .product_by_slug(&item.product)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CheckoutError::UnknownProduct(item.product.to_string()))?;

        let fabric = outer
            .iter()
            .find(|f| f.slug == item.fabric && product.offers_outer(&f.slug))
            .cloned()
            .ok_or_else(|| CheckoutError::InvalidFabric(product.name.clone()))?;

        let lining = match &item.lining {
            Some(slug) => {
                if !product.has_lining_option {
                    return Err(CheckoutError::LiningNotOffered(product.name));
                }
                let lining = inner
                    .iter()
                    .find(|f| &f.slug == slug && product.offers_lining(slug))
                    .cloned()
                    .ok_or(CheckoutError::InvalidLining)?;
                Some(lining)
            }
            None => None,
        };

        lines.push(OrderLine {
            product,
            fabric,
            lining,
            quantity: item.quantity,
            notes: item.notes,
        });
    }

    let order = CheckoutOrder::new(lines);
    debug!(subtotal = %order.subtotal(), "Order priced");
    Ok(order)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::{fabric_slug, fixture_store};

    async fn validate(body: serde_json::Value) -> Result<CheckoutOrder, CheckoutError> {
        let store = fixture_store();
        let items = parse_items(body.to_string().as_bytes())?;
        build_order(&store, items).await
    }

    fn item(product: &str, fabric: &str, quantity: u32) -> serde_json::Value {
        json!({ "productId": product, "selectedFabric": fabric, "quantity": quantity })
    }

    #[tokio::test]
    async fn test_prices_from_store() {
        let mut forged = item("necessar", "linne", 2);
        forged["price"] = json!(1);
        let order = validate(json!({ "items": [forged] })).await.unwrap();

        assert_eq!(order.lines[0].unit_price(), Price::new(350));
        assert_eq!(order.lines[0].amount(), Price::new(700));
        assert_eq!(order.subtotal(), Price::new(700));
    }

    #[tokio::test]
    async fn test_unknown_product_rejects_batch() {
        let result = validate(json!({ "items": [
            item("necessar", "linne", 1),
            item("mini-pouch", "linne", 1),
            item("skotvaska", "manchester", 1),
            item("finns-inte", "linne", 1),
        ]}))
        .await;
        assert_eq!(result, Err(CheckoutError::UnknownProduct("finns-inte".into())));
    }

    #[tokio::test]
    async fn test_inactive_product_is_unknown() {
        let store = fixture_store();
        let mut pouch = store
            .product_by_slug(&crate::test_support::slug("mini-pouch"))
            .await
            .unwrap()
            .unwrap();
        pouch.is_active = false;
        store.upsert_product(pouch);

        let items = parse_items(
            json!({ "items": [item("mini-pouch", "linne", 1)] })
                .to_string()
                .as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            build_order(&store, items).await,
            Err(CheckoutError::UnknownProduct(_))
        ));
    }

    #[tokio::test]
    async fn test_fabric_must_be_outer_and_offered() {
        // Inner fabric used as the outer selection.
        let result = validate(json!({ "items": [item("necessar", "bomull-rosa", 1)] })).await;
        assert!(matches!(result, Err(CheckoutError::InvalidFabric(_))));

        // Unknown fabric.
        let result = validate(json!({ "items": [item("necessar", "sammet", 1)] })).await;
        assert!(matches!(result, Err(CheckoutError::InvalidFabric(_))));
    }

    #[tokio::test]
    async fn test_lining_rules() {
        let mut no_option = item("mini-pouch", "linne", 1);
        no_option["selectedLining"] = json!("bomull-rosa");
        let result = validate(json!({ "items": [no_option] })).await;
        assert!(matches!(result, Err(CheckoutError::LiningNotOffered(_))));

        let mut outer_as_lining = item("necessar", "linne", 1);
        outer_as_lining["selectedLining"] = json!("manchester");
        let result = validate(json!({ "items": [outer_as_lining] })).await;
        assert_eq!(result, Err(CheckoutError::InvalidLining));

        let mut ok = item("necessar", "linne", 1);
        ok["selectedLining"] = json!("bomull-rosa");
        let order = validate(json!({ "items": [ok] })).await.unwrap();
        assert_eq!(
            order.lines[0].lining.as_ref().unwrap().slug,
            fabric_slug("bomull-rosa")
        );
    }

    #[tokio::test]
    async fn test_shipping_edge() {
        // 350 + 150 hits the threshold exactly.
        let order = validate(json!({ "items": [
            item("necessar", "linne", 1),
            item("mini-pouch", "linne", 1),
        ]}))
        .await
        .unwrap();
        assert_eq!(order.subtotal(), Price::new(500));
        assert_eq!(order.shipping_options[0].amount, Price::ZERO);

        let order = validate(json!({ "items": [item("necessar", "linne", 1)] }))
            .await
            .unwrap();
        assert_eq!(order.shipping_options.len(), 1);
        assert_eq!(order.shipping_options[0].amount, STANDARD_SHIPPING);
    }

    #[test]
    fn test_client_errors() {
        assert!(CheckoutError::EmptyCart.is_client_error());
        assert!(CheckoutError::InvalidLining.is_client_error());
        assert!(!CheckoutError::NotConfigured.is_client_error());
    }
}
