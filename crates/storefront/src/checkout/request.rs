//! Strict parsing of checkout request bodies.
//!
//! Parsing happens in two stages so the error taxonomy stays precise:
//!
//! 1. The body must be a JSON object with an `items` array. Anything else is
//!    a malformed body.
//! 2. Each element must match [`RawItem`] and pass sanitizing. One failing
//!    element rejects the whole batch.
//!
//! Unknown fields (a client-supplied `price`, for instance) are ignored; they
//! never reach the order.

use serde::Deserialize;

use nonito_core::sanitize::sanitize_identifier;
use nonito_core::{FabricSlug, Notes, ProductSlug};

use super::{CheckoutError, MAX_ITEMS, MAX_QUANTITY};

#[derive(Debug, Deserialize)]
struct RawBody {
    items: Vec<serde_json::Value>,
}

/// Wire shape of one item. Quantity must be a JSON integer.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    product_id: String,
    quantity: i64,
    selected_fabric: String,
    #[serde(default)]
    selected_lining: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

/// A sanitized, bounded checkout item. Nothing here has been checked
/// against the catalog yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutItem {
    pub product: ProductSlug,
    pub fabric: FabricSlug,
    pub lining: Option<FabricSlug>,
    pub quantity: u32,
    pub notes: Option<Notes>,
}

impl TryFrom<RawItem> for CheckoutItem {
    type Error = ();

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        let product = sanitize_identifier(&raw.product_id).map_err(drop)?;
        let fabric = sanitize_identifier(&raw.selected_fabric).map_err(drop)?;

        // An empty lining is the same as no lining.
        let lining = match raw.selected_lining.as_deref() {
            None | Some("") => None,
            Some(s) => Some(sanitize_identifier(s).map_err(drop)?),
        };

        let quantity = u32::try_from(raw.quantity).map_err(drop)?;
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return Err(());
        }

        let notes = match raw.notes.as_deref() {
            None => None,
            Some(s) => Notes::sanitize(s).map_err(drop)?,
        };

        Ok(Self {
            product,
            fabric,
            lining,
            quantity,
            notes,
        })
    }
}

/// Parse and bound a checkout body.
///
/// # Errors
///
/// - `MalformedBody` if the body is not `{ "items": [...] }`
/// - `EmptyCart` if `items` is empty
/// - `TooManyItems` if `items` exceeds [`MAX_ITEMS`]
/// - `InvalidItem` if any element fails shape, bounds, or sanitizing
pub fn parse_items(body: &[u8]) -> Result<Vec<CheckoutItem>, CheckoutError> {
    let raw: RawBody = serde_json::from_slice(body).map_err(|_| CheckoutError::MalformedBody)?;

    if raw.items.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    if raw.items.len() > MAX_ITEMS {
        return Err(CheckoutError::TooManyItems);
    }

    raw.items
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            serde_json::from_value::<RawItem>(value)
                .ok()
                .and_then(|raw| CheckoutItem::try_from(raw).ok())
                .ok_or(CheckoutError::InvalidItem { index })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: &serde_json::Value) -> Result<Vec<CheckoutItem>, CheckoutError> {
        parse_items(value.to_string().as_bytes())
    }

    fn item() -> serde_json::Value {
        json!({ "productId": "necessar", "quantity": 2, "selectedFabric": "linne" })
    }

    #[test]
    fn test_valid_item() {
        let items = parse(&json!({ "items": [{
            "productId": "necessar",
            "quantity": 2,
            "selectedFabric": "linne",
            "selectedLining": "bomull-rosa",
            "notes": "  <b>Alva</b> ",
        }]}))
        .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product.as_str(), "necessar");
        assert_eq!(items[0].lining.as_ref().unwrap().as_str(), "bomull-rosa");
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].notes.as_ref().unwrap().as_str(), "Alva");
    }

    #[test]
    fn test_malformed_body() {
        assert_eq!(parse_items(b"not json"), Err(CheckoutError::MalformedBody));
        assert_eq!(parse(&json!([item()])), Err(CheckoutError::MalformedBody));
        assert_eq!(
            parse(&json!({ "items": "necessar" })),
            Err(CheckoutError::MalformedBody)
        );
        assert_eq!(parse(&json!({})), Err(CheckoutError::MalformedBody));
    }

    #[test]
    fn test_item_count_bounds() {
        assert_eq!(parse(&json!({ "items": [] })), Err(CheckoutError::EmptyCart));

        let items: Vec<_> = (0..MAX_ITEMS).map(|_| item()).collect();
        assert_eq!(parse(&json!({ "items": items })).unwrap().len(), MAX_ITEMS);

        let items: Vec<_> = (0..=MAX_ITEMS).map(|_| item()).collect();
        assert_eq!(
            parse(&json!({ "items": items })),
            Err(CheckoutError::TooManyItems)
        );
    }

    #[test]
    fn test_quantity_bounds() {
        for quantity in [json!(0), json!(-1), json!(11), json!(2.5), json!("2"), json!(null)] {
            let mut bad = item();
            bad["quantity"] = quantity.clone();
            assert_eq!(
                parse(&json!({ "items": [bad] })),
                Err(CheckoutError::InvalidItem { index: 0 }),
                "quantity {quantity} should be rejected"
            );
        }

        let mut max = item();
        max["quantity"] = json!(MAX_QUANTITY);
        assert!(parse(&json!({ "items": [max] })).is_ok());
    }

    #[test]
    fn test_one_bad_item_rejects_batch() {
        let mut bad = item();
        bad["selectedFabric"] = json!("linne beige");
        assert_eq!(
            parse(&json!({ "items": [item(), item(), bad, item()] })),
            Err(CheckoutError::InvalidItem { index: 2 })
        );
    }

    #[test]
    fn test_identifier_and_notes_ceilings() {
        let mut long_id = item();
        long_id["productId"] = json!("a".repeat(51));
        assert!(parse(&json!({ "items": [long_id] })).is_err());

        let mut long_notes = item();
        long_notes["notes"] = json!("x".repeat(501));
        assert!(parse(&json!({ "items": [long_notes] })).is_err());

        let mut markup_only = item();
        markup_only["productId"] = json!("<script></script>");
        assert!(parse(&json!({ "items": [markup_only] })).is_err());
    }

    #[test]
    fn test_empty_optionals_are_absent() {
        let mut with_empty = item();
        with_empty["selectedLining"] = json!("");
        with_empty["notes"] = json!("<br>");
        let items = parse(&json!({ "items": [with_empty] })).unwrap();
        assert_eq!(items[0].lining, None);
        assert_eq!(items[0].notes, None);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let mut forged = item();
        forged["price"] = json!(1);
        forged["unitAmount"] = json!(100);
        let items = parse(&json!({ "items": [forged] })).unwrap();
        assert_eq!(items[0].quantity, 2);
    }
}
