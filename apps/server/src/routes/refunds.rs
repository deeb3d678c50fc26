//! Refund endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::routes::invoices::LineItemRequest;
use crate::state::AppState;
use regal_core::access::{MANAGER_UP, STAFF};
use regal_core::{LineQuantity, Refund, RefundItem};
use regal_db::{NewRefund, RefundWithItems};

#[derive(Debug, Deserialize)]
pub struct RefundListQuery {
    pub invoice_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RefundCreateRequest {
    pub invoice_id: String,
    pub items: Vec<LineItemRequest>,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    #[serde(flatten)]
    pub refund: Refund,
    pub items: Vec<RefundItem>,
}

impl From<RefundWithItems> for RefundResponse {
    fn from(value: RefundWithItems) -> Self {
        RefundResponse {
            refund: value.refund,
            items: value.items,
        }
    }
}

/// GET /api/refunds
pub async fn list(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<RefundListQuery>,
) -> ApiResult<Json<Vec<Refund>>> {
    caller.require(STAFF)?;

    let refunds = state
        .db
        .refunds()
        .list(
            query.invoice_id.as_deref(),
            query.limit.unwrap_or(100).clamp(1, 500),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;

    Ok(Json(refunds))
}

/// POST /api/refunds
pub async fn create(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<RefundCreateRequest>,
) -> ApiResult<Json<RefundResponse>> {
    caller.require(STAFF)?;

    let items: Vec<LineQuantity> = req
        .items
        .iter()
        .map(|i| LineQuantity::new(i.product_id.clone(), i.quantity))
        .collect();

    let created = state
        .db
        .refunds()
        .create(&NewRefund {
            invoice_id: req.invoice_id,
            items,
            reason: req.reason,
            processed_by: caller.user_id.clone(),
        })
        .await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "Refund",
            &created.refund.id,
            "CREATE",
            Some(json!({
                "invoice_id": created.refund.invoice_id,
                "amount_cents": created.refund.amount_cents,
                "reason": created.refund.reason,
            })),
        )
        .await;

    Ok(Json(created.into()))
}

/// GET /api/refunds/:id
pub async fn get(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<RefundResponse>> {
    caller.require(STAFF)?;

    let refund = state
        .db
        .refunds()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Refund", &id))?;

    Ok(Json(refund.into()))
}

/// DELETE /api/refunds/:id
///
/// Compensating action: reverses the refund's restock and may drive the
/// quantity negative if the returned units were sold again in between.
pub async fn delete(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(MANAGER_UP)?;

    state.db.refunds().delete(&id).await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "Refund", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}
