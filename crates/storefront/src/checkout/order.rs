//! Priced orders handed to the payment boundary.

use std::collections::BTreeMap;

use serde::Serialize;

use nonito_core::{Fabric, Notes, Price, Product};

use super::{FREE_SHIPPING_THRESHOLD, STANDARD_SHIPPING};

/// Delivery estimate shown for every shipping option, in business days.
pub const DELIVERY_ESTIMATE_DAYS: (u32, u32) = (3, 7);

/// One priced order line. The unit price is the catalog's, never the client's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    pub product: Product,
    pub fabric: Fabric,
    pub lining: Option<Fabric>,
    pub quantity: u32,
    pub notes: Option<Notes>,
}

impl OrderLine {
    /// Authoritative unit price.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        self.product.price
    }

    /// Line amount: unit price times quantity.
    #[must_use]
    pub const fn amount(&self) -> Price {
        self.product.price.times(self.quantity)
    }

    /// Human-readable description, e.g. `Tyg: Linne | Foder: Rosa | Önskemål: Alva`.
    #[must_use]
    pub fn description(&self) -> String {
        let mut description = format!("Tyg: {}", self.fabric.name);
        if let Some(lining) = &self.lining {
            description.push_str(" | Foder: ");
            description.push_str(&lining.name);
        }
        if let Some(notes) = &self.notes {
            description.push_str(" | Önskemål: ");
            description.push_str(notes.as_str());
        }
        description
    }

    /// Metadata attached to the line itself at the payment provider.
    #[must_use]
    pub fn product_metadata(&self) -> BTreeMap<String, String> {
        let lining_id = self.lining.as_ref().map(|l| l.slug.to_string());
        let lining_name = self.lining.as_ref().map(|l| l.name.clone());
        BTreeMap::from([
            ("productId".to_string(), self.product.slug.to_string()),
            ("fabric".to_string(), self.fabric.slug.to_string()),
            ("fabricName".to_string(), self.fabric.name.clone()),
            ("lining".to_string(), lining_id.unwrap_or_default()),
            ("liningName".to_string(), lining_name.unwrap_or_default()),
            (
                "customerNotes".to_string(),
                self.notes.as_ref().map(ToString::to_string).unwrap_or_default(),
            ),
        ])
    }
}

/// A fixed-amount shipping option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShippingOption {
    pub display_name: &'static str,
    pub amount: Price,
    pub min_business_days: u32,
    pub max_business_days: u32,
}

impl ShippingOption {
    const fn fixed(display_name: &'static str, amount: Price) -> Self {
        Self {
            display_name,
            amount,
            min_business_days: DELIVERY_ESTIMATE_DAYS.0,
            max_business_days: DELIVERY_ESTIMATE_DAYS.1,
        }
    }
}

/// Shipping options for a pre-shipping subtotal.
///
/// Standard shipping is always offered; at or above the free-shipping
/// threshold a zero-fee option is offered first.
#[must_use]
pub fn shipping_options(subtotal: Price) -> Vec<ShippingOption> {
    let standard = ShippingOption::fixed("Standard frakt", STANDARD_SHIPPING);
    if subtotal >= FREE_SHIPPING_THRESHOLD {
        vec![ShippingOption::fixed("Fri frakt", Price::ZERO), standard]
    } else {
        vec![standard]
    }
}

/// A validated, priced order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutOrder {
    pub lines: Vec<OrderLine>,
    pub shipping_options: Vec<ShippingOption>,
    /// Order-level metadata; the fulfillment processor reads this back.
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutOrder {
    /// Price the lines and derive shipping and metadata.
    #[must_use]
    pub fn new(lines: Vec<OrderLine>) -> Self {
        let subtotal = lines.iter().map(OrderLine::amount).sum();
        let metadata = order_metadata(&lines);
        Self {
            shipping_options: shipping_options(subtotal),
            lines,
            metadata,
        }
    }

    /// Sum of line amounts, before shipping.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.lines.iter().map(OrderLine::amount).sum()
    }
}

/// `item_<i>_*` keys describing every line, indexed by position.
///
/// Only identifiers are recorded; display names travel on the line items.
/// The provider accepts at most 50 metadata keys, so a session holds 16 plain
/// lines, or 10 lines that all carry a lining and notes.
fn order_metadata(lines: &[OrderLine]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    for (i, line) in lines.iter().enumerate() {
        metadata.insert(format!("item_{i}_productSlug"), line.product.slug.to_string());
        metadata.insert(format!("item_{i}_fabric"), line.fabric.slug.to_string());
        if let Some(lining) = &line.lining {
            metadata.insert(format!("item_{i}_lining"), lining.slug.to_string());
        }
        metadata.insert(format!("item_{i}_quantity"), line.quantity.to_string());
        if let Some(notes) = &line.notes {
            metadata.insert(format!("item_{i}_notes"), notes.to_string());
        }
    }
    metadata
}
