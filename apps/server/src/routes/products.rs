//! Product endpoints.
//!
//! Reads go through the optional Redis cache; every write invalidates the
//! product's cache entry before returning.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::cache::product_key;
use crate::error::{ApiError, ApiResult};
use crate::routes::Pagination;
use crate::state::AppState;
use regal_core::access::{MANAGER_UP, STAFF};
use regal_core::Product;
use regal_db::NewProduct;

#[derive(Debug, Deserialize)]
pub struct ProductCreateRequest {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    #[serde(default)]
    pub cost_price_cents: i64,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount_bps: u32,
    #[serde(default)]
    pub initial_stock: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProductUpdateRequest {
    pub name: String,
    pub description: Option<String>,
    pub barcode: Option<String>,
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    #[serde(default)]
    pub tax_rate_bps: u32,
    #[serde(default)]
    pub discount_bps: u32,
}

/// GET /api/products
pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Vec<Product>>> {
    caller.require(STAFF)?;

    let products = state.db.products().list(page.limit(), page.offset()).await?;
    Ok(Json(products))
}

/// POST /api/products
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<ProductCreateRequest>,
) -> ApiResult<Json<Product>> {
    caller.require(MANAGER_UP)?;

    let product = state
        .db
        .products()
        .insert(&NewProduct {
            sku: req.sku,
            barcode: req.barcode,
            name: req.name,
            description: req.description,
            unit_price_cents: req.unit_price_cents,
            cost_price_cents: req.cost_price_cents,
            tax_rate_bps: req.tax_rate_bps,
            discount_bps: req.discount_bps,
            initial_stock: req.initial_stock,
        })
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Product",
            &product.id,
            "CREATE",
            Some(json!({"sku": product.sku, "initial_stock": product.stock_level})),
        )
        .await;

    Ok(Json(product))
}

/// GET /api/products/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    caller.require(STAFF)?;

    let key = product_key(&id);
    if let Some(cached) = state.cache.get_json::<Product>(&key).await {
        return Ok(Json(cached));
    }

    let product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;

    state.cache.set_json(&key, &product).await;

    Ok(Json(product))
}

/// PUT /api/products/:id
pub async fn update(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ProductUpdateRequest>,
) -> ApiResult<Json<Product>> {
    caller.require(MANAGER_UP)?;

    let product = state
        .db
        .products()
        .update(
            &id,
            &req.name,
            req.description.as_deref(),
            req.barcode.as_deref(),
            req.unit_price_cents,
            req.cost_price_cents,
            req.tax_rate_bps,
            req.discount_bps,
        )
        .await?;

    state.cache.invalidate(&product_key(&id)).await;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Product",
            &id,
            "UPDATE",
            Some(json!({"name": product.name, "unit_price_cents": product.unit_price_cents})),
        )
        .await;

    Ok(Json(product))
}

/// DELETE /api/products/:id
///
/// Soft delete: the row stays for ledger entries and historical invoices.
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(MANAGER_UP)?;

    state.db.products().soft_delete(&id).await?;
    state.cache.invalidate(&product_key(&id)).await;

    state
        .db
        .audit()
        .record(&caller.user_id, "Product", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}
