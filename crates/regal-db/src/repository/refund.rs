//! # Refund Repository
//!
//! Database operations for refunds.
//!
//! A refund is a compensating action against an Issued or Paid invoice:
//! it re-credits stock for the returned items and advances each invoice
//! line's `refunded_qty` counter. The counter is what keeps the rest of
//! the lifecycle honest: cancellations and deletions restore only what
//! refunds have not already returned, and the per-line cap makes
//! over-refunding impossible across any number of partial refunds.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::{apply_delta_tx, apply_line_items_tx};
use regal_core::{
    validation, InvoiceStatus, LineQuantity, MutationIntent, Refund, RefundItem, StockEntryKind,
    StockMutation,
};

/// Parameters for creating a refund.
#[derive(Debug, Clone)]
pub struct NewRefund {
    pub invoice_id: String,
    /// Subset of the invoice's items, by product and quantity.
    pub items: Vec<LineQuantity>,
    pub reason: String,
    /// User who processed the refund.
    pub processed_by: String,
}

/// A refund joined with its items.
#[derive(Debug, Clone)]
pub struct RefundWithItems {
    pub refund: Refund,
    pub items: Vec<RefundItem>,
}

/// Repository for refund database operations.
#[derive(Debug, Clone)]
pub struct RefundRepository {
    pool: SqlitePool,
}

impl RefundRepository {
    /// Creates a new RefundRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RefundRepository { pool }
    }

    /// Creates a refund and re-credits stock for every returned item.
    ///
    /// ## Validation
    /// * the invoice exists and is Issued or Paid
    /// * every refunded product appears on the invoice
    /// * per product, this refund plus all prior refunds stays within the
    ///   originally sold quantity
    ///
    /// The refund amount is computed from the invoice's frozen unit
    /// prices, not taken from the caller.
    pub async fn create(&self, new: &NewRefund) -> DbResult<RefundWithItems> {
        if new.reason.trim().is_empty() {
            return Err(regal_core::CoreError::from(
                regal_core::ValidationError::Required {
                    field: "reason".to_string(),
                },
            )
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let status: Option<InvoiceStatus> =
            sqlx::query_scalar("SELECT status FROM invoices WHERE id = ?1")
                .bind(&new.invoice_id)
                .fetch_optional(&mut *tx)
                .await?;

        let status = status.ok_or_else(|| DbError::not_found("Invoice", &new.invoice_id))?;
        if !matches!(status, InvoiceStatus::Issued | InvoiceStatus::Paid) {
            return Err(regal_core::CoreError::NotRefundable { status }.into());
        }

        let invoice_items = super::invoice::items_rows(&mut tx, &new.invoice_id).await?;
        let amount_cents = validation::validate_refund_items(&invoice_items, &new.items)
            .map_err(DbError::from)?;

        let now = Utc::now();
        let refund = Refund {
            id: Uuid::new_v4().to_string(),
            invoice_id: new.invoice_id.clone(),
            amount_cents,
            reason: new.reason.trim().to_string(),
            processed_by: new.processed_by.clone(),
            created_at: now,
        };

        debug!(refund_id = %refund.id, invoice_id = %refund.invoice_id, "Inserting refund");

        sqlx::query(
            r#"
            INSERT INTO refunds (id, invoice_id, amount_cents, reason, processed_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&refund.id)
        .bind(&refund.invoice_id)
        .bind(refund.amount_cents)
        .bind(&refund.reason)
        .bind(&refund.processed_by)
        .bind(refund.created_at)
        .execute(&mut *tx)
        .await?;

        let mut refund_items = Vec::with_capacity(new.items.len());
        for line in &new.items {
            let item = RefundItem {
                id: Uuid::new_v4().to_string(),
                refund_id: refund.id.clone(),
                product_id: line.product_id.clone(),
                quantity: line.quantity,
            };

            sqlx::query(
                "INSERT INTO refund_items (id, refund_id, product_id, quantity) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&item.id)
            .bind(&item.refund_id)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            bump_refunded_qty(&mut tx, &new.invoice_id, &line.product_id, line.quantity).await?;

            refund_items.push(item);
        }

        // Returned goods go back on the shelf, same transaction.
        apply_line_items_tx(
            &mut tx,
            &new.items,
            MutationIntent::Increase,
            &format!("refund:{}", refund.id),
        )
        .await?;

        tx.commit().await?;

        info!(
            refund_id = %refund.id,
            invoice_id = %refund.invoice_id,
            amount = refund.amount_cents,
            items = refund_items.len(),
            "Refund created"
        );

        Ok(RefundWithItems {
            refund,
            items: refund_items,
        })
    }

    /// Gets a refund with its items by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<RefundWithItems>> {
        let refund = sqlx::query_as::<_, Refund>(
            r#"
            SELECT id, invoice_id, amount_cents, reason, processed_by, created_at
            FROM refunds
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(refund) = refund else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, RefundItem>(
            "SELECT id, refund_id, product_id, quantity FROM refund_items WHERE refund_id = ?1",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(RefundWithItems { refund, items }))
    }

    /// Lists refunds, newest first, optionally filtered by invoice.
    pub async fn list(
        &self,
        invoice_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Refund>> {
        let refunds = match invoice_id {
            Some(iid) => {
                sqlx::query_as::<_, Refund>(
                    r#"
                    SELECT id, invoice_id, amount_cents, reason, processed_by, created_at
                    FROM refunds
                    WHERE invoice_id = ?1
                    ORDER BY created_at DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(iid)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Refund>(
                    r#"
                    SELECT id, invoice_id, amount_cents, reason, processed_by, created_at
                    FROM refunds
                    ORDER BY created_at DESC
                    LIMIT ?1 OFFSET ?2
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(refunds)
    }

    /// Deletes a refund, reversing its stock increase.
    ///
    /// This is a compensating action, not an undo: if other activity
    /// consumed the returned units in the meantime, the reversal is
    /// allowed to drive the quantity negative rather than fail.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let refund = sqlx::query_as::<_, Refund>(
            r#"
            SELECT id, invoice_id, amount_cents, reason, processed_by, created_at
            FROM refunds
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Refund", id))?;

        let items = sqlx::query_as::<_, RefundItem>(
            "SELECT id, refund_id, product_id, quantity FROM refund_items WHERE refund_id = ?1",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            let mutation =
                StockMutation::new(&item.product_id, -item.quantity, StockEntryKind::Out)
                    .with_reference(format!("refund:{}:reversal", refund.id))
                    .allowing_negative();
            apply_delta_tx(&mut tx, &mutation).await?;

            unbump_refunded_qty(&mut tx, &refund.invoice_id, &item.product_id, item.quantity)
                .await?;
        }

        // Items cascade.
        sqlx::query("DELETE FROM refunds WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(refund_id = %id, invoice_id = %refund.invoice_id, "Refund deleted");
        Ok(())
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

/// Advances `refunded_qty` on the invoice's lines for one product,
/// distributing across lines in insertion order.
///
/// Each line update is guarded by its own cap; a guard miss after the
/// earlier validation pass means a concurrent writer advanced the
/// counter, so the whole refund rolls back as a conflict.
async fn bump_refunded_qty(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let lines: Vec<(String, i64, i64)> = sqlx::query_as(
        r#"
        SELECT id, quantity, refunded_qty
        FROM invoice_items
        WHERE invoice_id = ?1 AND product_id = ?2
        ORDER BY created_at
        "#,
    )
    .bind(invoice_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut remaining = quantity;

    for (line_id, line_qty, refunded) in lines {
        if remaining == 0 {
            break;
        }

        let take = remaining.min(line_qty - refunded);
        if take <= 0 {
            continue;
        }

        let result = sqlx::query(
            r#"
            UPDATE invoice_items
            SET refunded_qty = refunded_qty + ?2
            WHERE id = ?1 AND refunded_qty + ?2 <= quantity
            "#,
        )
        .bind(&line_id)
        .bind(take)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("InvoiceItem", &line_id));
        }

        remaining -= take;
    }

    if remaining > 0 {
        // Validation projected enough headroom, so someone else took it.
        return Err(DbError::concurrent("Invoice", invoice_id));
    }

    Ok(())
}

/// Walks `refunded_qty` back down when a refund is deleted.
async fn unbump_refunded_qty(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    product_id: &str,
    quantity: i64,
) -> DbResult<()> {
    let lines: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT id, refunded_qty
        FROM invoice_items
        WHERE invoice_id = ?1 AND product_id = ?2
        ORDER BY created_at DESC
        "#,
    )
    .bind(invoice_id)
    .bind(product_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut remaining = quantity;

    for (line_id, refunded) in lines {
        if remaining == 0 {
            break;
        }

        let take = remaining.min(refunded);
        if take <= 0 {
            continue;
        }

        let result = sqlx::query(
            r#"
            UPDATE invoice_items
            SET refunded_qty = refunded_qty - ?2
            WHERE id = ?1 AND refunded_qty - ?2 >= 0
            "#,
        )
        .bind(&line_id)
        .bind(take)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("InvoiceItem", &line_id));
        }

        remaining -= take;
    }

    // The invoice may have been deleted after the refund was created;
    // leftover `remaining` is tolerated in that case because there are
    // no lines left to walk back.
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::invoice::NewInvoice;
    use crate::repository::product::NewProduct;
    use regal_core::{CoreError, RefundState};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, stock: i64, price: i64) -> String {
        db.products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                barcode: None,
                name: format!("Test {sku}"),
                description: None,
                unit_price_cents: price,
                cost_price_cents: price / 2,
                tax_rate_bps: 0,
                discount_bps: 0,
                initial_stock: stock,
            })
            .await
            .unwrap()
            .id
    }

    async fn issued_invoice(db: &Database, pid: &str, qty: i64) -> String {
        db.invoices()
            .create(&NewInvoice {
                customer_id: None,
                line_items: vec![LineQuantity::new(pid.to_string(), qty)],
                tax_cents: 0,
                discount_cents: 0,
                status: InvoiceStatus::Issued,
                created_by: "user-1".to_string(),
            })
            .await
            .unwrap()
            .invoice
            .id
    }

    fn refund_of(invoice_id: &str, pid: &str, qty: i64) -> NewRefund {
        NewRefund {
            invoice_id: invoice_id.to_string(),
            items: vec![LineQuantity::new(pid.to_string(), qty)],
            reason: "damaged".to_string(),
            processed_by: "user-2".to_string(),
        }
    }

    #[tokio::test]
    async fn test_refund_restocks_and_prices_from_snapshot() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 6);

        let created = db.refunds().create(&refund_of(&invoice_id, &pid, 2)).await.unwrap();

        assert_eq!(created.refund.amount_cents, 500);
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 8);
        assert_eq!(db.stock().ledger_total(&pid).await.unwrap(), 8);

        // One IN ledger entry referencing the refund.
        let reference = format!("refund:{}", created.refund.id);
        let entries = db.stock().list_entries(Some(&pid), 50, 0).await.unwrap();
        let matching: Vec<_> = entries
            .iter()
            .filter(|e| e.reference.as_deref() == Some(reference.as_str()) && e.qty_delta == 2)
            .collect();
        assert_eq!(matching.len(), 1);

        // The invoice tracks the partial refund explicitly.
        let invoice = db.invoices().get_by_id(&invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.items[0].refunded_qty, 2);
        assert_eq!(invoice.refund_state, RefundState::Partial);
        // The status enum is untouched.
        assert_eq!(invoice.invoice.status, InvoiceStatus::Issued);
    }

    #[tokio::test]
    async fn test_full_refund_state() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        db.refunds().create(&refund_of(&invoice_id, &pid, 4)).await.unwrap();

        let invoice = db.invoices().get_by_id(&invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.refund_state, RefundState::Full);
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_cumulative_over_refund_rejected() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        db.refunds().create(&refund_of(&invoice_id, &pid, 3)).await.unwrap();

        // 3 already returned; 2 more would exceed the 4 sold.
        let err = db
            .refunds()
            .create(&refund_of(&invoice_id, &pid, 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::OverRefund {
                requested: 2,
                refundable: 1,
                ..
            })
        ));

        // The failed refund changed nothing.
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 9);
        let invoice = db.invoices().get_by_id(&invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.items[0].refunded_qty, 3);
    }

    #[tokio::test]
    async fn test_refund_of_unsold_product_rejected() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let other = seed_product(&db, "SKU-2", 10, 100).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        let err = db
            .refunds()
            .create(&refund_of(&invoice_id, &other, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ItemNotOnInvoice { .. })
        ));
    }

    #[tokio::test]
    async fn test_draft_invoice_not_refundable() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;

        let draft = db
            .invoices()
            .create(&NewInvoice {
                customer_id: None,
                line_items: vec![LineQuantity::new(pid.clone(), 2)],
                tax_cents: 0,
                discount_cents: 0,
                status: InvoiceStatus::Draft,
                created_by: "user-1".to_string(),
            })
            .await
            .unwrap();

        let err = db
            .refunds()
            .create(&refund_of(&draft.invoice.id, &pid, 1))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotRefundable { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_refund_reverses_the_restock() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        let created = db.refunds().create(&refund_of(&invoice_id, &pid, 2)).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 8);

        db.refunds().delete(&created.refund.id).await.unwrap();

        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 6);
        assert_eq!(db.stock().ledger_total(&pid).await.unwrap(), 6);

        // The refunded counter is walked back, so the units are
        // refundable again.
        let invoice = db.invoices().get_by_id(&invoice_id).await.unwrap().unwrap();
        assert_eq!(invoice.items[0].refunded_qty, 0);

        assert!(db.refunds().get_by_id(&created.refund.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_refund_may_drive_stock_negative() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 5, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 5).await;

        let created = db.refunds().create(&refund_of(&invoice_id, &pid, 5)).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 5);

        // Everything restocked gets sold again before the refund is deleted.
        let second_invoice = issued_invoice(&db, &pid, 5).await;
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 0);

        // Compensating action: allowed to go negative, never hidden.
        db.refunds().delete(&created.refund.id).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), -5);
        assert_eq!(db.stock().ledger_total(&pid).await.unwrap(), -5);

        let _ = second_invoice;
    }

    #[tokio::test]
    async fn test_partially_refunded_invoice_cancel_restores_remainder_only() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        // 10 → 6 after the sale, 6 → 8 after refunding 2.
        db.refunds().create(&refund_of(&invoice_id, &pid, 2)).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 8);

        // Cancelling restores only the 2 unrefunded units: 8 → 10,
        // never 12.
        db.invoices()
            .update_status(&invoice_id, InvoiceStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 10);
        assert_eq!(db.stock().ledger_total(&pid).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_partially_refunded_invoice_delete_restores_remainder_only() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10, 250).await;
        let invoice_id = issued_invoice(&db, &pid, 4).await;

        db.refunds().create(&refund_of(&invoice_id, &pid, 2)).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 8);

        db.invoices().delete(&invoice_id).await.unwrap();
        assert_eq!(db.stock().quantity(&pid).await.unwrap(), 10);
        assert_eq!(db.stock().ledger_total(&pid).await.unwrap(), 10);
    }
}
