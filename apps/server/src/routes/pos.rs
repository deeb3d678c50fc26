//! Point-of-sale convenience endpoints for cashiers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::routes::invoices::InvoiceResponse;
use crate::state::AppState;
use regal_core::access::STAFF;
use regal_core::{InvoiceStatus, LineQuantity};
use regal_db::NewInvoice;

#[derive(Debug, Deserialize)]
pub struct QuickSellRequest {
    pub product_id: String,
    /// Defaults to a single unit.
    pub quantity: Option<i64>,
    pub customer_id: Option<String>,
}

/// POST /api/pos/quick-sell
///
/// One product, issued immediately. Availability is checked by the stock
/// coordinator inside the same transaction that writes the invoice, so a
/// shortage leaves nothing behind.
pub async fn quick_sell(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<QuickSellRequest>,
) -> ApiResult<Json<InvoiceResponse>> {
    caller.require(STAFF)?;

    let quantity = req.quantity.unwrap_or(1);

    let created = state
        .db
        .invoices()
        .create(&NewInvoice {
            customer_id: req.customer_id,
            line_items: vec![LineQuantity::new(req.product_id, quantity)],
            tax_cents: 0,
            discount_cents: 0,
            status: InvoiceStatus::Issued,
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
                "quick_sell": true,
                "total_cents": created.invoice.total_cents,
            })),
        )
        .await;

    Ok(Json(created.into()))
}
