//! Catalog fetch.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tracing::{error, instrument};

use nonito_core::{CatalogFabrics, Product};

use crate::state::AppState;

/// Catalog as served to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub success: bool,
    pub products: Vec<Product>,
    pub fabrics: CatalogFabrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Active products and fabrics, served from the catalog cache.
///
/// A failure without any cached snapshot answers 500 with an empty catalog,
/// so clients can always read the same shape.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> (StatusCode, Json<CatalogResponse>) {
    match state.catalog().try_load().await {
        Ok(catalog) => (
            StatusCode::OK,
            Json(CatalogResponse {
                success: true,
                products: catalog.products.clone(),
                fabrics: catalog.fabrics.clone(),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Failed to fetch products");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CatalogResponse {
                    success: false,
                    products: Vec::new(),
                    fabrics: CatalogFabrics::default(),
                    error: Some("Failed to fetch products"),
                }),
            )
        }
    }
}
