//! Product and fabric queries.

use async_trait::async_trait;
use tracing::instrument;

use nonito_core::{Fabric, FabricRole, FabricSlug, Price, Product, ProductSlug};

use super::{PgStore, RepositoryError};
use crate::store::CatalogStore;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Product columns plus the fabric slugs linked to it, per role.
///
/// `inner_fabrics` is `NULL` when the product has no inner links at all,
/// which means any active inner fabric may be used as lining.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    slug: String,
    name: String,
    description: String,
    short_description: Option<String>,
    price: i32,
    stock: i32,
    is_active: bool,
    has_lining_option: bool,
    image_url: Option<String>,
    outer_fabrics: Vec<String>,
    inner_fabrics: Option<Vec<String>>,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::DataCorruption(format!("invalid {what} in database: {err}"))
}

fn parse_fabric_slugs(raw: Vec<String>) -> Result<Vec<FabricSlug>, RepositoryError> {
    raw.into_iter()
        .map(|s| FabricSlug::try_from(s).map_err(|e| corrupt("fabric slug", e)))
        .collect()
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let slug = ProductSlug::try_from(row.slug).map_err(|e| corrupt("product slug", e))?;
        let stock = u32::try_from(row.stock).map_err(|e| corrupt("stock", e))?;

        Ok(Self {
            slug,
            name: row.name,
            description: row.description,
            short_description: row.short_description,
            price: Price::new(i64::from(row.price)),
            stock,
            is_active: row.is_active,
            available_fabrics: parse_fabric_slugs(row.outer_fabrics)?,
            available_inner_fabrics: row.inner_fabrics.map(parse_fabric_slugs).transpose()?,
            has_lining_option: row.has_lining_option,
            image: row.image_url,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FabricRow {
    slug: String,
    name: String,
    image_url: String,
    fabric_type: String,
    is_active: bool,
}

impl TryFrom<FabricRow> for Fabric {
    type Error = RepositoryError;

    fn try_from(row: FabricRow) -> Result<Self, Self::Error> {
        Ok(Self {
            slug: FabricSlug::try_from(row.slug).map_err(|e| corrupt("fabric slug", e))?,
            name: row.name,
            image: row.image_url,
            role: row
                .fabric_type
                .parse::<FabricRole>()
                .map_err(|e| corrupt("fabric type", e))?,
            is_active: row.is_active,
        })
    }
}

const PRODUCT_SELECT: &str = r"
    SELECT p.slug, p.name, p.description, p.short_description,
           p.price, p.stock, p.is_active, p.has_lining_option, p.image_url,
           ARRAY(
               SELECT f.slug FROM product_fabrics pf
               JOIN fabrics f ON f.id = pf.fabric_id
               WHERE pf.product_id = p.id AND pf.fabric_role = 'outer'
               ORDER BY f.sort_order, f.slug
           ) AS outer_fabrics,
           CASE WHEN EXISTS (
               SELECT 1 FROM product_fabrics pf
               WHERE pf.product_id = p.id AND pf.fabric_role = 'inner'
           ) THEN ARRAY(
               SELECT f.slug FROM product_fabrics pf
               JOIN fabrics f ON f.id = pf.fabric_id
               WHERE pf.product_id = p.id AND pf.fabric_role = 'inner'
               ORDER BY f.sort_order, f.slug
           ) END AS inner_fabrics
    FROM products p
";

// =============================================================================
// Queries
// =============================================================================

#[async_trait]
impl CatalogStore for PgStore {
    #[instrument(skip(self))]
    async fn active_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} WHERE p.is_active ORDER BY p.created_at DESC"
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self), fields(product = %slug))]
    async fn product_by_slug(
        &self,
        slug: &ProductSlug,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.slug = $1"))
            .bind(slug.as_str())
            .fetch_optional(self.pool())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self), fields(role = %role))]
    async fn active_fabrics(&self, role: FabricRole) -> Result<Vec<Fabric>, RepositoryError> {
        let rows = sqlx::query_as::<_, FabricRow>(
            r"
            SELECT slug, name, image_url, fabric_type, is_active
            FROM fabrics
            WHERE fabric_type = $1 AND is_active
            ORDER BY sort_order, slug
            ",
        )
        .bind(role.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }
}
