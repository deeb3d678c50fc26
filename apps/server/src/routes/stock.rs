//! Stock ledger endpoints.
//!
//! Manual entries (goods received, spoilage, corrections) go through the
//! same coordinator as sales and refunds, so the ledger invariant holds
//! no matter which door the change came in through.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;
use regal_core::access::{MANAGER_UP, STAFF};
use regal_core::{StockEntry, StockEntryKind, StockMutation};

#[derive(Debug, Deserialize)]
pub struct EntryListQuery {
    pub product_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EntryCreateRequest {
    pub product_id: String,
    /// Signed delta: positive for In, negative for Out, either for Adjust.
    pub qty_delta: i64,
    pub kind: StockEntryKind,
    pub batch: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub location: Option<String>,
    pub reference: Option<String>,
    /// Only honored for Adjust entries.
    #[serde(default)]
    pub allow_negative: bool,
}

#[derive(Debug, Serialize)]
pub struct StockLevelResponse {
    pub product_id: String,
    pub stock_level: i64,
    /// Sum of the product's ledger deltas. Always equals `stock_level`;
    /// exposed so dashboards can verify the books.
    pub ledger_total: i64,
}

/// GET /api/stock/entries
pub async fn list_entries(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(query): Query<EntryListQuery>,
) -> ApiResult<Json<Vec<StockEntry>>> {
    caller.require(STAFF)?;

    let entries = state
        .db
        .stock()
        .list_entries(
            query.product_id.as_deref(),
            query.limit.unwrap_or(100).clamp(1, 500),
            query.offset.unwrap_or(0).max(0),
        )
        .await?;

    Ok(Json(entries))
}

/// POST /api/stock/entries
pub async fn create_entry(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<EntryCreateRequest>,
) -> ApiResult<Json<StockEntry>> {
    caller.require(MANAGER_UP)?;

    let mut mutation = StockMutation::new(&req.product_id, req.qty_delta, req.kind);
    mutation.batch = req.batch;
    mutation.expiry = req.expiry;
    mutation.location = req.location;
    mutation.reference = req.reference;
    mutation.allow_negative = req.allow_negative && req.kind == StockEntryKind::Adjust;

    let entry = state.db.stock().create_entry(&mutation).await?;

    state
        .db
        .audit()
        .record(
            &caller.user_id,
            "StockEntry",
            &entry.id,
            "CREATE",
            Some(json!({
                "product_id": entry.product_id,
                "qty_delta": entry.qty_delta,
                "kind": entry.kind,
            })),
        )
        .await;

    Ok(Json(entry))
}

/// DELETE /api/stock/entries/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    caller.require(MANAGER_UP)?;

    state.db.stock().delete_entry(&id).await?;

    state
        .db
        .audit()
        .record(&caller.user_id, "StockEntry", &id, "DELETE", None)
        .await;

    Ok(Json(json!({"deleted": id})))
}

/// GET /api/stock/level/:product_id
pub async fn level(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(product_id): Path<String>,
) -> ApiResult<Json<StockLevelResponse>> {
    caller.require(STAFF)?;

    let stock = state.db.stock();
    let stock_level = stock.quantity(&product_id).await?;
    let ledger_total = stock.ledger_total(&product_id).await?;

    if stock_level != ledger_total {
        // Should be impossible; if it ever fires, the books need an audit.
        tracing::error!(
            product_id = %product_id,
            stock_level,
            ledger_total,
            "Ledger does not reconcile with on-hand quantity"
        );
    }

    Ok(Json(StockLevelResponse {
        product_id,
        stock_level,
        ledger_total,
    }))
}
