//! Invoice endpoints.
//!
//! Status changes ride on a compare-and-swap in the repository; when the
//! swap loses to a concurrent writer the handler retries once against the
//! fresh row, then surfaces 409.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use regal_core::access::{MANAGER_UP, STAFF};
use regal_core::{Invoice, InvoiceItem, InvoiceStatus, LineQuantity, RefundState};
use regal_db::{DbError, InvoiceWithItems, NewInvoice};

#[derive(Debug, Deserialize)]
pub struct InvoiceListQuery {
    pub customer_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceCreateRequest {
    pub customer_id: Option<String>,
    pub items: Vec<LineItemRequest>,
    #[serde(default)]
    pub tax_cents: i64,
    #[serde(default)]
    pub discount_cents: i64,
    /// Defaults to Draft; Issued/Paid decrease stock immediately.
    pub status: Option<InvoiceStatus>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsUpdateRequest {
    pub items: Vec<LineItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: InvoiceStatus,
}

/// Invoice plus its line items and derived refund state.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub refund_state: RefundState,
}

impl From<InvoiceWithItems> for InvoiceResponse {
    fn from(value: InvoiceWithItems) -> Self {
        InvoiceResponse {
            invoice: value.invoice,
            items: value.items,
            refund_state: value.refund_state,
        }
    }
}

fn to_line_items(items: &[LineItemRequest]) -> Vec<LineQuantity> {
    items
        .iter()
        .map(|i| LineQuantity::new(i.product_id.clone(), i.quantity))
        .collect()
}

/// GET /api/invoices
pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<InvoiceListQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    caller.require(STAFF)?;

    let invoices = state
        .db
        .invoices()
        .list(
            query.customer_id.as_deref(),
            query.limit.unwrap_or(100).clamp(1, 500),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;

    Ok(Json(invoices))
}

/// POST /api/invoices
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<InvoiceCreateRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let created = state
        .db
        .invoices()
        .create(&NewInvoice {
            customer_id: req.customer_id,
            line_items: to_line_items(&req.items),
            tax_cents: req.tax_cents,
            discount_cents: req.discount_cents,
            status: req.status.unwrap_or(InvoiceStatus::Draft),
            created_by: caller.user_id.clone(),
        })
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Invoice",
            &created.invoice.id,
            "CREATE",
            Some(json!({
                "invoice_no": created.invoice.invoice_no,
                "status": created.invoice.status,
                "items_count": created.items.len(),
                "total_cents": created.invoice.total_cents,
            })),
        )
        .await;

    Ok(Json(created.into()))
}

/// GET /api/invoices/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let invoice = state
        .db
        .invoices()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Invoice", &id))?;

    Ok(Json(invoice.into()))
}

/// PUT /api/invoices/:id/items (Draft only)
pub async fn update_items(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<ItemsUpdateRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let updated = state
        .db
        .invoices()
        .replace_items(&id, &to_line_items(&req.items))
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Invoice",
            &id,
            "UPDATE",
            Some(json!({"items_count": updated.items.len()})),
        )
        .await;

    Ok(Json(updated.into()))
}

/// PUT /api/invoices/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let updated = transition_with_retry(&state, &id, req.status).await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Invoice",
            &id,
            "UPDATE",
            Some(json!({"status": updated.invoice.status})),
        )
        .await;

    Ok(Json(updated.into()))
}

/// POST /api/invoices/:id/pay
pub async fn pay(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let updated = transition_with_retry(&state, &id, InvoiceStatus::Paid).await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Invoice",
            &id,
            "UPDATE",
            Some(json!({"status": InvoiceStatus::Paid})),
        )
        .await;

    Ok(Json(updated.into()))
}

/// DELETE /api/invoices/:id
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(MANAGER_UP)?;

    state.db.invoices().delete(&id).await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "Invoice", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}

/// One retry on a lost compare-and-swap; a second loss is a real conflict
/// the client has to look at.
async fn transition_with_retry(
    state: &AppState,
    id: &str,
    status: InvoiceStatus,
) -> Result<InvoiceWithItems, ApiError> {
    match state.db.invoices().update_status(id, status).await {
        Err(DbError::ConcurrentModification { .. }) => {
            Ok(state.db.invoices().update_status(id, status).await?)
        }
        other => Ok(other?),
    }
}
