//! Catalog model: products, fabrics, and the rules that tie a cart line to them.
//!
//! A [`Catalog`] is an immutable snapshot. Whether a cart line is still
//! purchasable is decided by [`Catalog::resolve`]; both the cart's
//! reconciliation pass and its derived totals go through it so they can never
//! disagree.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::cart::CartLine;
use crate::types::{FabricRole, FabricSlug, Price, ProductSlug};

/// A sellable product.
///
/// Serializes with an `id` alongside `slug`; they carry the same value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Stable identifier; also used as the public id.
    pub slug: ProductSlug,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    /// Unit price in whole currency units.
    pub price: Price,
    pub stock: u32,
    pub is_active: bool,
    /// Fabrics offered as outer material.
    pub available_fabrics: Vec<FabricSlug>,
    /// Fabrics offered as lining. `None` means any active inner fabric.
    #[serde(default)]
    pub available_inner_fabrics: Option<Vec<FabricSlug>>,
    pub has_lining_option: bool,
    #[serde(default)]
    pub image: Option<String>,
}

impl Serialize for Product {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Product", 12)?;
        state.serialize_field("id", &self.slug)?;
        state.serialize_field("slug", &self.slug)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("shortDescription", &self.short_description)?;
        state.serialize_field("price", &self.price)?;
        state.serialize_field("stock", &self.stock)?;
        state.serialize_field("isActive", &self.is_active)?;
        state.serialize_field("availableFabrics", &self.available_fabrics)?;
        state.serialize_field("availableInnerFabrics", &self.available_inner_fabrics)?;
        state.serialize_field("hasLiningOption", &self.has_lining_option)?;
        state.serialize_field("image", &self.image)?;
        state.end()
    }
}

impl Product {
    /// Whether `fabric` is offered as this product's outer material.
    #[must_use]
    pub fn offers_outer(&self, fabric: &FabricSlug) -> bool {
        self.available_fabrics.contains(fabric)
    }

    /// Whether `lining` may be chosen as this product's lining.
    #[must_use]
    pub fn offers_lining(&self, lining: &FabricSlug) -> bool {
        self.has_lining_option
            && self
                .available_inner_fabrics
                .as_ref()
                .is_none_or(|inner| inner.contains(lining))
    }
}

/// A fabric that can be chosen for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fabric {
    pub slug: FabricSlug,
    pub name: String,
    pub image: String,
    #[serde(rename = "type")]
    pub role: FabricRole,
    pub is_active: bool,
}

/// Fabrics split by role, as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogFabrics {
    pub outer: Vec<Fabric>,
    pub inner: Vec<Fabric>,
}

impl CatalogFabrics {
    /// Split a flat fabric list by role.
    #[must_use]
    pub fn from_fabrics(fabrics: impl IntoIterator<Item = Fabric>) -> Self {
        let (outer, inner) = fabrics
            .into_iter()
            .partition(|f| f.role == FabricRole::Outer);
        Self { outer, inner }
    }

    /// Find a fabric of the given role.
    #[must_use]
    pub fn find(&self, role: FabricRole, slug: &FabricSlug) -> Option<&Fabric> {
        let list = match role {
            FabricRole::Outer => &self.outer,
            FabricRole::Inner => &self.inner,
        };
        list.iter().find(|f| &f.slug == slug && f.role == role)
    }
}

/// An immutable catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<Product>,
    pub fabrics: CatalogFabrics,
}

impl Catalog {
    /// Create a snapshot.
    #[must_use]
    pub const fn new(products: Vec<Product>, fabrics: CatalogFabrics) -> Self {
        Self { products, fabrics }
    }

    /// A catalog without products cannot validate anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Look up a product by slug, active or not.
    #[must_use]
    pub fn product(&self, slug: &ProductSlug) -> Option<&Product> {
        self.products.iter().find(|p| &p.slug == slug)
    }

    /// Resolve a cart line against this snapshot.
    ///
    /// Returns `None` unless the product exists and is active, the outer
    /// fabric is an active outer fabric offered for the product, and the
    /// lining (if any) is an active inner fabric the product offers as lining.
    #[must_use]
    pub fn resolve<'a>(&'a self, line: &'a CartLine) -> Option<ResolvedLine<'a>> {
        let product = self
            .product(&line.key.product)
            .filter(|p| p.is_active && p.offers_outer(&line.key.fabric))?;

        let fabric = self
            .fabrics
            .find(FabricRole::Outer, &line.key.fabric)
            .filter(|f| f.is_active)?;

        let lining = match &line.key.lining {
            Some(slug) => {
                if !product.offers_lining(slug) {
                    return None;
                }
                Some(
                    self.fabrics
                        .find(FabricRole::Inner, slug)
                        .filter(|f| f.is_active)?,
                )
            }
            None => None,
        };

        Some(ResolvedLine {
            line,
            product,
            fabric,
            lining,
        })
    }
}

/// A cart line joined with the catalog entries it references.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLine<'a> {
    pub line: &'a CartLine,
    pub product: &'a Product,
    pub fabric: &'a Fabric,
    pub lining: Option<&'a Fabric>,
}

impl ResolvedLine<'_> {
    /// Line total at the snapshot's price.
    #[must_use]
    pub const fn total(&self) -> Price {
        self.product.price.times(self.line.quantity)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small catalog shared by the core tests.

    use super::*;

    pub fn slug(s: &str) -> ProductSlug {
        ProductSlug::parse(s).unwrap_or_else(|e| panic!("bad test slug {s}: {e}"))
    }

    pub fn fabric_slug(s: &str) -> FabricSlug {
        FabricSlug::parse(s).unwrap_or_else(|e| panic!("bad test slug {s}: {e}"))
    }

    pub fn fabric(s: &str, role: FabricRole) -> Fabric {
        Fabric {
            slug: fabric_slug(s),
            name: format!("Fabric {s}"),
            image: format!("/images/fabrics/{s}.jpg"),
            role,
            is_active: true,
        }
    }

    pub fn product(s: &str, price: i64, outer: &[&str]) -> Product {
        Product {
            slug: slug(s),
            name: format!("Product {s}"),
            description: String::new(),
            short_description: None,
            price: Price::new(price),
            stock: 10,
            is_active: true,
            available_fabrics: outer.iter().map(|f| fabric_slug(f)).collect(),
            available_inner_fabrics: None,
            has_lining_option: true,
            image: None,
        }
    }

    /// Two products, two outer fabrics, one inner fabric.
    pub fn catalog() -> Catalog {
        let mut pouch = product("mini-pouch", 150, &["linne"]);
        pouch.has_lining_option = false;
        Catalog::new(
            vec![product("necessar", 350, &["linne", "manchester"]), pouch],
            CatalogFabrics::from_fabrics([
                fabric("linne", FabricRole::Outer),
                fabric("manchester", FabricRole::Outer),
                fabric("bomull-rosa", FabricRole::Inner),
            ]),
        )
    }
}
