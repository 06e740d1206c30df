//! Seed the catalog from a YAML file.
//!
//! Fabrics and products are upserted by slug, and each product's fabric
//! links are replaced with the ones in the file. Everything runs in one
//! transaction.
//!
//! # File Format
//!
//! ```yaml
//! fabrics:
//!   - slug: linne
//!     name: Linne
//!     image: /images/fabrics/linne.jpg
//!     type: outer
//! products:
//!   - slug: necessar
//!     name: Necessär
//!     price: 350
//!     stock: 10
//!     has_lining_option: true
//!     fabrics: [linne]
//!     inner_fabrics: [bomull-rosa]   # omit to offer every inner fabric
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{error, info};

use nonito_core::{FabricRole, FabricSlug, ProductSlug};
use nonito_storefront::db;

fn default_true() -> bool {
    true
}

/// A fabric entry.
#[derive(Debug, Deserialize)]
pub struct SeedFabric {
    pub slug: String,
    pub name: String,
    pub image: String,
    #[serde(rename = "type")]
    pub role: FabricRole,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Defaults to the fabric's position in the file.
    #[serde(default)]
    pub sort_order: Option<i32>,
}

/// A product entry.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    pub price: i32,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub has_lining_option: bool,
    #[serde(default)]
    pub image: Option<String>,
    /// Outer fabric slugs.
    #[serde(default)]
    pub fabrics: Vec<String>,
    /// Inner fabric slugs; `None` offers every inner fabric.
    #[serde(default)]
    pub inner_fabrics: Option<Vec<String>>,
}

/// The whole seed file.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub fabrics: Vec<SeedFabric>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// Check a seed file before touching the database.
///
/// Returns one message per problem; an empty list means the file is valid.
#[must_use]
pub fn validate(file: &SeedFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut roles: HashMap<&str, FabricRole> = HashMap::new();

    for fabric in &file.fabrics {
        if let Err(e) = FabricSlug::parse(&fabric.slug) {
            errors.push(format!("fabric '{}': {e}", fabric.slug));
        }
        if roles.insert(fabric.slug.as_str(), fabric.role).is_some() {
            errors.push(format!("fabric '{}' is listed twice", fabric.slug));
        }
    }

    let mut seen = HashSet::new();
    for product in &file.products {
        let label = &product.slug;
        if let Err(e) = ProductSlug::parse(&product.slug) {
            errors.push(format!("product '{label}': {e}"));
        }
        if !seen.insert(product.slug.as_str()) {
            errors.push(format!("product '{label}' is listed twice"));
        }
        if product.price < 0 {
            errors.push(format!("product '{label}': price must not be negative"));
        }
        if product.stock < 0 {
            errors.push(format!("product '{label}': stock must not be negative"));
        }
        for slug in &product.fabrics {
            if roles.get(slug.as_str()) != Some(&FabricRole::Outer) {
                errors.push(format!("product '{label}': '{slug}' is not an outer fabric"));
            }
        }
        for slug in product.inner_fabrics.iter().flatten() {
            if roles.get(slug.as_str()) != Some(&FabricRole::Inner) {
                errors.push(format!("product '{label}': '{slug}' is not an inner fabric"));
            }
        }
        let lists_inner = product.inner_fabrics.as_ref().is_some_and(|i| !i.is_empty());
        if !product.has_lining_option && lists_inner {
            errors.push(format!(
                "product '{label}': inner fabrics listed without a lining option"
            ));
        }
    }

    errors
}

/// Seed the catalog from a YAML file.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the file cannot be read
/// or fails validation, or a database operation fails.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog seed");
    let content = tokio::fs::read_to_string(path).await?;
    let file: SeedFile = serde_yaml::from_str(&content)?;
    info!(
        fabrics = file.fabrics.len(),
        products = file.products.len(),
        "Parsed seed file"
    );

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Seed validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }
    info!("Seed file validated successfully");

    if dry_run {
        info!("Dry run, database untouched");
        return Ok(());
    }

    let database_url = super::database_url()?;
    let pool = db::create_pool(&database_url).await?;
    info!("Connected to database");

    seed(&pool, &file).await?;

    info!("Seeding complete!");
    info!("  Fabrics upserted: {}", file.fabrics.len());
    info!("  Products upserted: {}", file.products.len());
    Ok(())
}

/// Apply a validated seed file in one transaction.
///
/// # Errors
///
/// Returns `sqlx::Error` if any statement fails; nothing is committed then.
pub async fn seed(pool: &PgPool, file: &SeedFile) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    let mut fabric_ids = HashMap::new();
    for (position, fabric) in file.fabrics.iter().enumerate() {
        let sort_order = fabric
            .sort_order
            .unwrap_or_else(|| i32::try_from(position).unwrap_or(i32::MAX));
        let id = upsert_fabric(&mut tx, fabric, sort_order).await?;
        fabric_ids.insert(fabric.slug.as_str(), id);
    }

    for product in &file.products {
        let product_id = upsert_product(&mut tx, product).await?;

        sqlx::query("DELETE FROM product_fabrics WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let outer = product.fabrics.iter().map(|s| (s, FabricRole::Outer));
        let inner = product
            .inner_fabrics
            .iter()
            .flatten()
            .map(|s| (s, FabricRole::Inner));
        for (slug, role) in outer.chain(inner) {
            let Some(fabric_id) = fabric_ids.get(slug.as_str()) else {
                continue;
            };
            sqlx::query(
                "INSERT INTO product_fabrics (product_id, fabric_id, fabric_role) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(fabric_id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await
}

async fn upsert_fabric(
    tx: &mut Transaction<'_, Postgres>,
    fabric: &SeedFabric,
    sort_order: i32,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r"
        INSERT INTO fabrics (slug, name, image_url, fabric_type, is_active, sort_order)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            image_url = EXCLUDED.image_url,
            fabric_type = EXCLUDED.fabric_type,
            is_active = EXCLUDED.is_active,
            sort_order = EXCLUDED.sort_order
        RETURNING id
        ",
    )
    .bind(&fabric.slug)
    .bind(&fabric.name)
    .bind(&fabric.image)
    .bind(fabric.role.as_str())
    .bind(fabric.active)
    .bind(sort_order)
    .fetch_one(&mut **tx)
    .await
}

async fn upsert_product(
    tx: &mut Transaction<'_, Postgres>,
    product: &SeedProduct,
) -> Result<i32, sqlx::Error> {
    sqlx::query_scalar(
        r"
        INSERT INTO products (
            slug, name, description, short_description, price, stock,
            is_active, has_lining_option, image_url
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (slug) DO UPDATE SET
            name = EXCLUDED.name,
            description = EXCLUDED.description,
            short_description = EXCLUDED.short_description,
            price = EXCLUDED.price,
            stock = EXCLUDED.stock,
            is_active = EXCLUDED.is_active,
            has_lining_option = EXCLUDED.has_lining_option,
            image_url = EXCLUDED.image_url,
            updated_at = NOW()
        RETURNING id
        ",
    )
    .bind(&product.slug)
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.short_description)
    .bind(product.price)
    .bind(product.stock)
    .bind(product.active)
    .bind(product.has_lining_option)
    .bind(&product.image)
    .fetch_one(&mut **tx)
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED: &str = r"
fabrics:
  - slug: linne
    name: Linne
    image: /images/fabrics/linne.jpg
    type: outer
  - slug: bomull-rosa
    name: Rosa bomull
    image: /images/fabrics/bomull-rosa.jpg
    type: inner
products:
  - slug: necessar
    name: Necessär
    price: 350
    stock: 10
    has_lining_option: true
    fabrics: [linne]
    inner_fabrics: [bomull-rosa]
  - slug: mini-pouch
    name: Mini pouch
    price: 150
    fabrics: [linne]
";

    #[test]
    fn test_parse_and_validate() {
        let file: SeedFile = serde_yaml::from_str(SEED).unwrap();
        assert_eq!(file.fabrics.len(), 2);
        assert_eq!(file.fabrics[1].role, FabricRole::Inner);
        assert!(file.products[0].active);
        assert_eq!(file.products[1].stock, 0);
        assert_eq!(file.products[1].inner_fabrics, None);
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validation_errors() {
        let mut file: SeedFile = serde_yaml::from_str(SEED).unwrap();
        file.products[0].fabrics.push("bomull-rosa".to_string());
        file.products[1].slug = "Mini Pouch".to_string();
        file.products[1].inner_fabrics = Some(vec!["bomull-rosa".to_string()]);
        file.products[1].price = -1;

        let errors = validate(&file);
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors[0].contains("'bomull-rosa' is not an outer fabric"));
    }

    #[test]
    fn test_shipped_catalog_is_valid() {
        let file: SeedFile =
            serde_yaml::from_str(include_str!("../../seed/catalog.yaml")).unwrap();
        assert_eq!(file.products.len(), 4);
        assert!(validate(&file).is_empty(), "{:?}", validate(&file));
    }
}
