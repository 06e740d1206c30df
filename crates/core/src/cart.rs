//! Shopping cart state machine.
//!
//! A cart is an ordered list of lines keyed by (product, fabric, lining).
//! Each key appears at most once; adding an existing key merges quantities.
//!
//! # Line lifecycle
//!
//! ```text
//! absent --add_item--> present(q > 0) --update_quantity(<= 0) / remove_item--> absent
//!                      present(q)     --add_item(n)--> present(q + n)
//!                      present(q)     --update_quantity(n > 0)--> present(n)
//! ```
//!
//! The cart never trusts its persisted form: [`Cart::from_persisted`] drops
//! anything that does not match the expected line shape. Catalog validity is
//! applied separately by [`Cart::reconcile`] because the catalog may not be
//! available when the cart is loaded.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, ResolvedLine};
use crate::sanitize::Notes;
use crate::types::{FabricSlug, Price, ProductSlug};

/// Composite identity of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product: ProductSlug,
    pub fabric: FabricSlug,
    pub lining: Option<FabricSlug>,
}

impl CartKey {
    #[must_use]
    pub const fn new(product: ProductSlug, fabric: FabricSlug, lining: Option<FabricSlug>) -> Self {
        Self {
            product,
            fabric,
            lining,
        }
    }
}

/// One shopper selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PersistedLine", try_from = "PersistedLine")]
pub struct CartLine {
    pub key: CartKey,
    pub quantity: u32,
    pub notes: Option<Notes>,
}

impl CartLine {
    /// Create a line without notes.
    #[must_use]
    pub const fn new(key: CartKey, quantity: u32) -> Self {
        Self {
            key,
            quantity,
            notes: None,
        }
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: Option<Notes>) -> Self {
        self.notes = notes;
        self
    }
}

/// Persisted/wire shape of a cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLine {
    product_id: ProductSlug,
    quantity: u32,
    selected_fabric: FabricSlug,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected_lining: Option<FabricSlug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

impl From<CartLine> for PersistedLine {
    fn from(line: CartLine) -> Self {
        Self {
            product_id: line.key.product,
            quantity: line.quantity,
            selected_fabric: line.key.fabric,
            selected_lining: line.key.lining,
            notes: line.notes.map(|n| n.as_str().to_owned()),
        }
    }
}

impl TryFrom<PersistedLine> for CartLine {
    type Error = String;

    fn try_from(raw: PersistedLine) -> Result<Self, Self::Error> {
        if raw.quantity == 0 {
            return Err("quantity must be positive".to_owned());
        }
        let notes = match raw.notes.as_deref() {
            Some(text) => Notes::sanitize(text).map_err(|e| e.to_string())?,
            None => None,
        };
        Ok(Self {
            key: CartKey::new(raw.product_id, raw.selected_fabric, raw.selected_lining),
            quantity: raw.quantity,
            notes,
        })
    }
}

/// Derived cart totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: u32,
    pub total_price: Price,
}

/// The shopper's cart.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Rebuild a cart from its persisted representation.
    ///
    /// Persisted state is untrusted: anything that is not an array of
    /// well-formed lines (string product id, string fabric, positive integer
    /// quantity, valid identifiers) is dropped. Duplicate keys are merged.
    #[must_use]
    pub fn from_persisted(value: &serde_json::Value) -> Self {
        let mut cart = Self::new();
        let Some(items) = value.as_array() else {
            return cart;
        };
        for item in items {
            if let Ok(line) = serde_json::from_value::<CartLine>(item.clone()) {
                cart.add_item(line);
            }
        }
        cart
    }

    /// Serialize the whole cart for persistence.
    #[must_use]
    pub fn to_persisted(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.lines
                .iter()
                .filter_map(|line| serde_json::to_value(line).ok())
                .collect(),
        )
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for `key`.
    #[must_use]
    pub fn get(&self, key: &CartKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.key == key)
    }

    /// Add a line, merging quantities with an existing line of the same key.
    ///
    /// No upper bound is applied here; bounds are enforced by callers and at
    /// checkout.
    pub fn add_item(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }
        match self.lines.iter_mut().find(|l| l.key == line.key) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(line.quantity);
            }
            None => self.lines.push(line),
        }
    }

    /// Set the quantity of a line. Zero or negative removes it.
    ///
    /// Returns `true` if the cart changed.
    pub fn update_quantity(&mut self, key: &CartKey, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_item(key);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        match self.lines.iter_mut().find(|l| &l.key == key) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove a line. Returns `true` if it was present.
    pub fn remove_item(&mut self, key: &CartKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| &l.key != key);
        self.lines.len() != before
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Drop every line that no longer resolves against `catalog`.
    ///
    /// Does nothing while the catalog or the cart is empty, so a missing
    /// catalog never wipes a cart. Returns the number of removed lines.
    pub fn reconcile(&mut self, catalog: &Catalog) -> usize {
        if catalog.is_empty() || self.lines.is_empty() {
            return 0;
        }
        let before = self.lines.len();
        self.lines.retain(|line| catalog.resolve(line).is_some());
        before - self.lines.len()
    }

    /// Lines that currently resolve against `catalog`.
    #[must_use]
    pub fn resolved<'a>(&'a self, catalog: &'a Catalog) -> Vec<ResolvedLine<'a>> {
        self.lines
            .iter()
            .filter_map(|line| catalog.resolve(line))
            .collect()
    }

    /// Item count and price over resolving lines only.
    ///
    /// Unresolved lines contribute nothing, so the displayed total never
    /// exceeds what checkout will charge.
    #[must_use]
    pub fn totals(&self, catalog: &Catalog) -> CartTotals {
        self.resolved(catalog)
            .iter()
            .fold(CartTotals::default(), |acc, r| CartTotals {
                item_count: acc.item_count.saturating_add(r.line.quantity),
                total_price: acc.total_price + r.total(),
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::catalog::fixtures::{catalog, fabric_slug, slug};

    fn key(product: &str, fabric: &str, lining: Option<&str>) -> CartKey {
        CartKey::new(slug(product), fabric_slug(fabric), lining.map(fabric_slug))
    }

    #[test]
    fn test_add_same_key_merges() {
        let mut cart = Cart::new();
        let k = key("necessar", "linne", Some("bomull-rosa"));
        for q in [1, 2, 4] {
            cart.add_item(CartLine::new(k.clone(), q));
        }
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.get(&k).unwrap().quantity, 7);
    }

    #[test]
    fn test_lining_is_part_of_key() {
        let mut cart = Cart::new();
        cart.add_item(CartLine::new(key("necessar", "linne", None), 1));
        cart.add_item(CartLine::new(key("necessar", "linne", Some("bomull-rosa")), 1));
        assert_eq!(cart.lines().len(), 2);
    }

    #[test]
    fn test_update_to_zero_equals_remove() {
        let mut base = Cart::new();
        base.add_item(CartLine::new(key("necessar", "linne", None), 2));
        base.add_item(CartLine::new(key("mini-pouch", "linne", None), 1));
        let k = key("necessar", "linne", None);

        let mut updated = base.clone();
        let mut removed = base.clone();
        assert!(updated.update_quantity(&k, 0));
        assert!(removed.remove_item(&k));
        assert_eq!(updated, removed);

        let mut negative = base;
        negative.update_quantity(&k, -3);
        assert_eq!(negative, removed);
    }

    #[test]
    fn test_update_sets_quantity() {
        let mut cart = Cart::new();
        let k = key("necessar", "linne", None);
        cart.add_item(CartLine::new(k.clone(), 2));
        assert!(cart.update_quantity(&k, 5));
        assert_eq!(cart.get(&k).unwrap().quantity, 5);
        assert!(!cart.update_quantity(&key("necessar", "manchester", None), 5));
    }

    #[test]
    fn test_reconcile_prunes_invalid_and_is_idempotent() {
        let catalog = catalog();
        let mut cart = Cart::new();
        cart.add_item(CartLine::new(key("necessar", "linne", Some("bomull-rosa")), 1));
        // Inner fabric in the outer slot: exists, wrong role.
        cart.add_item(CartLine::new(key("necessar", "bomull-rosa", None), 1));
        cart.add_item(CartLine::new(key("gone", "linne", None), 1));

        assert_eq!(cart.reconcile(&catalog), 2);
        let once = cart.clone();
        assert_eq!(cart.reconcile(&catalog), 0);
        assert_eq!(cart, once);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_reconcile_skips_empty_catalog() {
        let mut cart = Cart::new();
        cart.add_item(CartLine::new(key("gone", "linne", None), 1));
        assert_eq!(cart.reconcile(&Catalog::default()), 0);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn test_totals_ignore_unresolved_lines() {
        let catalog = catalog();
        let mut cart = Cart::new();
        cart.add_item(CartLine::new(key("necessar", "linne", None), 2));
        cart.add_item(CartLine::new(key("mini-pouch", "linne", None), 1));
        cart.add_item(CartLine::new(key("unknown", "linne", None), 5));

        let totals = cart.totals(&catalog);
        assert_eq!(totals.item_count, 3);
        assert_eq!(totals.total_price, Price::new(850));

        assert_eq!(cart.totals(&Catalog::default()), CartTotals::default());
    }

    #[test]
    fn test_from_persisted_drops_malformed_lines() {
        let raw = json!([
            { "productId": "necessar", "selectedFabric": "linne", "quantity": 2 },
            { "productId": "necessar", "selectedFabric": "linne", "quantity": 1 },
            { "productId": "mini-pouch", "selectedFabric": "linne", "quantity": 0 },
            { "productId": 42, "selectedFabric": "linne", "quantity": 1 },
            { "productId": "mini-pouch", "quantity": 1 },
            { "productId": "mini-pouch", "selectedFabric": "linne", "quantity": "1" },
            { "productId": "<b>x</b>", "selectedFabric": "linne", "quantity": 1 },
            "garbage",
            null
        ]);
        let cart = Cart::from_persisted(&raw);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
    }

    #[test]
    fn test_from_persisted_non_array() {
        assert!(Cart::from_persisted(&json!({ "items": [] })).is_empty());
        assert!(Cart::from_persisted(&serde_json::Value::Null).is_empty());
    }

    #[test]
    fn test_persisted_round_trip_keeps_shape() {
        let mut cart = Cart::new();
        cart.add_item(
            CartLine::new(key("necessar", "linne", Some("bomull-rosa")), 1)
                .with_notes(Notes::sanitize("Alva").unwrap()),
        );
        let persisted = cart.to_persisted();
        assert_eq!(persisted[0]["selectedLining"], "bomull-rosa");
        assert_eq!(persisted[0]["notes"], "Alva");
        assert_eq!(Cart::from_persisted(&persisted), cart);
    }
}
