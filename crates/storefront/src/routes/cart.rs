//! Cart route handlers.
//!
//! The cart is kept in the session in its persisted form. Every handler
//! parses and validates it, reconciles it against the cached catalog (persisting
//! if lines were pruned), applies its change, and rewrites the whole cart.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, instrument};

use nonito_core::sanitize::sanitize_identifier;
use nonito_core::{Cart, CartKey, CartLine, CartTotals, Catalog, Notes, Price};

use crate::checkout::MAX_QUANTITY;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session_keys;
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// One cart line as shown to the shopper.
///
/// Catalog-derived fields are `None` while the line does not resolve.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: String,
    pub selected_fabric: String,
    pub selected_lining: Option<String>,
    pub quantity: u32,
    pub notes: Option<String>,
    pub product_name: Option<String>,
    pub fabric_name: Option<String>,
    pub lining_name: Option<String>,
    pub image: Option<String>,
    pub unit_price: Option<Price>,
    pub line_total: Option<Price>,
}

/// Cart contents with totals over resolving lines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

impl CartView {
    fn new(cart: &Cart, catalog: &Catalog) -> Self {
        let items = cart
            .lines()
            .iter()
            .map(|line| {
                let resolved = catalog.resolve(line);
                CartItemView {
                    product_id: line.key.product.to_string(),
                    selected_fabric: line.key.fabric.to_string(),
                    selected_lining: line.key.lining.as_ref().map(ToString::to_string),
                    quantity: line.quantity,
                    notes: line.notes.as_ref().map(ToString::to_string),
                    product_name: resolved.map(|r| r.product.name.clone()),
                    fabric_name: resolved.map(|r| r.fabric.name.clone()),
                    lining_name: resolved.and_then(|r| r.lining).map(|l| l.name.clone()),
                    image: resolved.and_then(|r| r.product.image.clone()),
                    unit_price: resolved.map(|r| r.product.price),
                    line_total: resolved.map(|r| r.total()),
                }
            })
            .collect();

        Self {
            items,
            totals: cart.totals(catalog),
        }
    }
}

/// Cart count badge.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u32,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Read the persisted cart. Anything unreadable yields an empty cart.
pub(crate) async fn read_cart(session: &Session) -> Cart {
    session
        .get::<serde_json::Value>(session_keys::CART)
        .await
        .ok()
        .flatten()
        .map(|value| Cart::from_persisted(&value))
        .unwrap_or_default()
}

/// Rewrite the whole persisted cart.
pub(crate) async fn write_cart(session: &Session, cart: &Cart) -> Result<()> {
    session
        .insert(session_keys::CART, cart.to_persisted())
        .await
        .map_err(|e| AppError::Internal(format!("failed to persist cart: {e}")))
}

/// Load the cart and the catalog, pruning lines the catalog no longer
/// supports.
async fn load_reconciled(state: &AppState, session: &Session) -> Result<(Cart, Arc<Catalog>)> {
    let mut cart = read_cart(session).await;
    let catalog = state.catalog().load().await;

    let removed = cart.reconcile(&catalog);
    if removed > 0 {
        info!(removed, "Pruned cart lines no longer in the catalog");
        write_cart(session, &cart).await?;
    }
    Ok((cart, catalog))
}

// =============================================================================
// Requests
// =============================================================================

/// Identifies a cart line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRef {
    pub product_id: String,
    pub selected_fabric: String,
    #[serde(default)]
    pub selected_lining: Option<String>,
}

impl CartLineRef {
    fn key(&self) -> Result<CartKey> {
        let invalid = |_| AppError::BadRequest("Invalid item".to_string());
        let lining = match self.selected_lining.as_deref() {
            None | Some("") => None,
            Some(s) => Some(sanitize_identifier(s).map_err(invalid)?),
        };
        Ok(CartKey::new(
            sanitize_identifier(&self.product_id).map_err(invalid)?,
            sanitize_identifier(&self.selected_fabric).map_err(invalid)?,
            lining,
        ))
    }
}

/// Add to cart request.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    #[serde(flatten)]
    pub line: CartLineRef,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

const fn default_quantity() -> u32 {
    1
}

/// Update quantity request. Zero or negative removes the line.
#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    #[serde(flatten)]
    pub line: CartLineRef,
    pub quantity: i64,
}

/// Largest quantity a shopper may hold of `key`.
///
/// Bounded by the per-line maximum and, when the catalog knows the product,
/// by its stock. A product missing from a loaded catalog cannot be added.
fn quantity_ceiling(catalog: &Catalog, key: &CartKey) -> Result<u32> {
    if catalog.is_empty() {
        return Ok(MAX_QUANTITY);
    }
    let product = catalog
        .product(&key.product)
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::BadRequest("Invalid product".to_string()))?;
    Ok(MAX_QUANTITY.min(product.stock))
}

fn check_quantity(quantity: u32, ceiling: u32) -> Result<()> {
    if quantity > ceiling {
        return Err(AppError::BadRequest(format!(
            "Quantity exceeds the maximum of {ceiling}"
        )));
    }
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Show the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let (cart, catalog) = load_reconciled(&state, &session).await?;
    Ok(Json(CartView::new(&cart, &catalog)))
}

/// Add an item, merging with an existing line of the same selection.
#[instrument(skip(state, session, request))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let key = request.line.key()?;
    if request.quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    let notes = match request.notes.as_deref() {
        Some(text) => Notes::sanitize(text).map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => None,
    };

    let (mut cart, catalog) = load_reconciled(&state, &session).await?;
    let existing = cart.get(&key).map_or(0, |line| line.quantity);
    check_quantity(
        existing.saturating_add(request.quantity),
        quantity_ceiling(&catalog, &key)?,
    )?;

    add_breadcrumb("cart", "Added item", Some(&[("product", key.product.as_str())]));
    cart.add_item(CartLine::new(key, request.quantity).with_notes(notes));
    write_cart(&session, &cart).await?;

    Ok(Json(CartView::new(&cart, &catalog)))
}

/// Change a line's quantity.
#[instrument(skip(state, session, request))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let key = request.line.key()?;
    let (mut cart, catalog) = load_reconciled(&state, &session).await?;

    if let Ok(quantity) = u32::try_from(request.quantity) {
        if quantity > 0 && cart.get(&key).is_some() {
            check_quantity(quantity, quantity_ceiling(&catalog, &key)?)?;
        }
    } else if request.quantity > 0 {
        return Err(AppError::BadRequest("Quantity out of range".to_string()));
    }

    if cart.update_quantity(&key, request.quantity) {
        write_cart(&session, &cart).await?;
    }
    Ok(Json(CartView::new(&cart, &catalog)))
}

/// Remove a line.
#[instrument(skip(state, session, request))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<CartLineRef>,
) -> Result<Json<CartView>> {
    let key = request.key()?;
    let (mut cart, catalog) = load_reconciled(&state, &session).await?;

    if cart.remove_item(&key) {
        write_cart(&session, &cart).await?;
    }
    Ok(Json(CartView::new(&cart, &catalog)))
}

/// Empty the cart.
#[instrument(skip(state, session))]
pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = Cart::new();
    write_cart(&session, &cart).await?;
    let catalog = state.catalog().load().await;
    Ok(Json(CartView::new(&cart, &catalog)))
}

/// Item count over resolving lines.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CartCount>> {
    let (cart, catalog) = load_reconciled(&state, &session).await?;
    Ok(Json(CartCount {
        count: cart.totals(&catalog).item_count,
    }))
}
