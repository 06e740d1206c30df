//! Catalog fixtures for unit and integration tests.

use nonito_core::{Fabric, FabricRole, FabricSlug, Price, Product, ProductSlug};

use crate::store::MemoryStore;

/// Parse a product slug, panicking on fixture typos.
#[must_use]
pub fn slug(s: &str) -> ProductSlug {
    ProductSlug::parse(s).unwrap_or_else(|e| panic!("bad fixture slug {s}: {e}"))
}

/// Parse a fabric slug, panicking on fixture typos.
#[must_use]
pub fn fabric_slug(s: &str) -> FabricSlug {
    FabricSlug::parse(s).unwrap_or_else(|e| panic!("bad fixture slug {s}: {e}"))
}

/// An active fabric.
#[must_use]
pub fn fabric(s: &str, role: FabricRole) -> Fabric {
    Fabric {
        slug: fabric_slug(s),
        name: format!("Tyg {s}"),
        image: format!("/images/fabrics/{s}.jpg"),
        role,
        is_active: true,
    }
}

/// An active product offering `linne` and `manchester` outside and any
/// inner fabric as lining.
#[must_use]
pub fn product(s: &str, price: i64, stock: u32) -> Product {
    Product {
        slug: slug(s),
        name: format!("Produkt {s}"),
        description: String::new(),
        short_description: None,
        price: Price::new(price),
        stock,
        is_active: true,
        available_fabrics: vec![fabric_slug("linne"), fabric_slug("manchester")],
        available_inner_fabrics: None,
        has_lining_option: true,
        image: None,
    }
}

/// The standard fixture catalog:
///
/// - `necessar` 350 SEK, stock 10, lining offered
/// - `mini-pouch` 150 SEK, stock 5, no lining
/// - `skotvaska` 500 SEK, stock 2, lining offered
/// - outer fabrics `linne`, `manchester`; inner fabric `bomull-rosa`
#[must_use]
pub fn fixture_store() -> MemoryStore {
    let mut pouch = product("mini-pouch", 150, 5);
    pouch.has_lining_option = false;
    MemoryStore::new(
        vec![
            product("necessar", 350, 10),
            pouch,
            product("skotvaska", 500, 2),
        ],
        vec![
            fabric("linne", FabricRole::Outer),
            fabric("manchester", FabricRole::Outer),
            fabric("bomull-rosa", FabricRole::Inner),
        ],
    )
}
