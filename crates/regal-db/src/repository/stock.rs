//! # Stock Mutation Coordinator
//!
//! The single code path through which any quantity-affecting business event
//! (sale, refund, manual stock entry) changes a product's on-hand quantity.
//!
//! ## Why One Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Stock Write Discipline                              │
//! │                                                                         │
//! │   InvoiceRepository ──┐                                                │
//! │   RefundRepository  ──┼──► StockLedger ──► UPDATE products             │
//! │   manual entries    ──┘        │           SET stock_level =           │
//! │                                │               stock_level + :delta    │
//! │                                │           WHERE id = :id              │
//! │                                │             AND stock_level           │
//! │                                │                 + :delta >= 0         │
//! │                                │           RETURNING stock_level       │
//! │                                ▼                                        │
//! │                        INSERT stock_entries (same transaction)         │
//! │                                                                         │
//! │   The guarded single-statement update is atomic per row: two           │
//! │   concurrent decrements can never both observe the same prior          │
//! │   quantity (no lost update). Zero rows updated means the guard         │
//! │   said no, and the caller finds out which reason applies.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariant
//! For every product, `SUM(stock_entries.qty_delta) == products.stock_level`
//! at all times. Both writes happen in one transaction; they commit together
//! or not at all.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use regal_core::{
    validation, LineQuantity, MutationIntent, StockEntry, StockEntryKind, StockMutation,
    StockShortage,
};

/// The stock mutation coordinator.
///
/// Owns every write to `products.stock_level` and every append to the
/// `stock_entries` ledger. Other repositories call through the
/// transaction-scoped helpers instead of touching the columns directly.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    /// Creates a new StockLedger.
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    /// Applies one signed quantity delta and appends the matching ledger row.
    ///
    /// ## Returns
    /// The resulting on-hand quantity.
    ///
    /// ## Errors
    /// * `NotFound` - the product id does not exist
    /// * `InsufficientStock` - the delta would drive the quantity negative
    ///   and `allow_negative` is not set
    pub async fn apply_delta(&self, mutation: &StockMutation) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let (_, new_qty) = apply_delta_tx(&mut tx, mutation).await?;
        tx.commit().await?;
        Ok(new_qty)
    }

    /// Applies a transaction's line items as one logical unit.
    ///
    /// For `Decrease` intent a strict pre-check runs first: every line's
    /// resulting quantity is projected (duplicates aggregated) and ALL
    /// shortages are collected before any delta is applied. Either every
    /// line commits or none does.
    ///
    /// ## Returns
    /// The resulting quantity per input line, in input order.
    pub async fn apply_line_items(
        &self,
        items: &[LineQuantity],
        intent: MutationIntent,
        reference: &str,
    ) -> DbResult<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let quantities = apply_line_items_tx(&mut tx, items, intent, reference).await?;
        tx.commit().await?;
        Ok(quantities)
    }

    /// Records a manual stock entry (goods received, spoilage, correction).
    ///
    /// The delta's sign must agree with the kind; only Adjust entries may
    /// drive the quantity negative, and only when `allow_negative` is set.
    pub async fn create_entry(&self, mutation: &StockMutation) -> DbResult<StockEntry> {
        validation::validate_stock_delta(mutation.kind, mutation.delta).map_err(DbError::from)?;

        if mutation.allow_negative && mutation.kind != StockEntryKind::Adjust {
            return Err(regal_core::CoreError::InvalidStockDelta {
                kind: mutation.kind,
                delta: mutation.delta,
            }
            .into());
        }

        let mut tx = self.pool.begin().await?;
        let (entry, new_qty) = apply_delta_tx(&mut tx, mutation).await?;
        tx.commit().await?;

        debug!(
            product_id = %entry.product_id,
            delta = entry.qty_delta,
            new_qty,
            "Manual stock entry recorded"
        );

        Ok(entry)
    }

    /// Gets a ledger entry by ID.
    pub async fn get_entry(&self, id: &str) -> DbResult<Option<StockEntry>> {
        let entry = sqlx::query_as::<_, StockEntry>(
            r#"
            SELECT id, product_id, qty_delta, kind, batch, expiry, location, reference, created_at
            FROM stock_entries
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Lists ledger entries, newest first, optionally filtered by product.
    pub async fn list_entries(
        &self,
        product_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<StockEntry>> {
        let entries = match product_id {
            Some(pid) => {
                sqlx::query_as::<_, StockEntry>(
                    r#"
                    SELECT id, product_id, qty_delta, kind, batch, expiry, location, reference, created_at
                    FROM stock_entries
                    WHERE product_id = ?1
                    ORDER BY created_at DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(pid)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StockEntry>(
                    r#"
                    SELECT id, product_id, qty_delta, kind, batch, expiry, location, reference, created_at
                    FROM stock_entries
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

        Ok(entries)
    }

    /// Removes a manual ledger entry and subtracts its delta from the
    /// product, in one transaction.
    ///
    /// Removing the row and its contribution together keeps the ledger
    /// invariant intact. The subtraction is guarded: a removal that would
    /// drive the quantity negative is rejected.
    pub async fn delete_entry(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT product_id, qty_delta FROM stock_entries WHERE id = ?1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let (product_id, qty_delta) = row.ok_or_else(|| DbError::not_found("StockEntry", id))?;

        let new_qty: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_level = stock_level - ?2, updated_at = ?3
            WHERE id = ?1 AND stock_level - ?2 >= 0
            RETURNING stock_level
            "#,
        )
        .bind(&product_id)
        .bind(qty_delta)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        if new_qty.is_none() {
            let available = current_quantity(&mut tx, &product_id).await?;
            return Err(DbError::InsufficientStock {
                shortages: vec![StockShortage {
                    product_id: product_id.clone(),
                    sku: sku_of(&mut tx, &product_id).await?,
                    available,
                    requested: qty_delta,
                }],
            });
        }

        sqlx::query("DELETE FROM stock_entries WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(entry_id = %id, product_id = %product_id, "Stock entry removed");
        Ok(())
    }

    /// Current on-hand quantity for a product.
    pub async fn quantity(&self, product_id: &str) -> DbResult<i64> {
        let qty: Option<i64> = sqlx::query_scalar("SELECT stock_level FROM products WHERE id = ?1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        qty.ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Sum of all ledger deltas for a product.
    ///
    /// Always equals [`Self::quantity`]; exposed so reconciliation checks
    /// and tests can verify the invariant from the outside.
    pub async fn ledger_total(&self, product_id: &str) -> DbResult<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            "SELECT SUM(qty_delta) FROM stock_entries WHERE product_id = ?1",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(0))
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================
// Used by InvoiceRepository and RefundRepository so the stock effect commits
// or rolls back together with the business rows that caused it.

/// Applies one delta inside an existing transaction.
///
/// Runs the guarded atomic update, distinguishes the failure reason when
/// the guard says no, and appends the ledger row.
pub(crate) async fn apply_delta_tx(
    conn: &mut SqliteConnection,
    mutation: &StockMutation,
) -> DbResult<(StockEntry, i64)> {
    let now = Utc::now();

    let new_qty: Option<i64> = if mutation.allow_negative {
        sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_level = stock_level + ?2, updated_at = ?3
            WHERE id = ?1
            RETURNING stock_level
            "#,
        )
        .bind(&mutation.product_id)
        .bind(mutation.delta)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
    } else {
        sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_level = stock_level + ?2, updated_at = ?3
            WHERE id = ?1 AND stock_level + ?2 >= 0
            RETURNING stock_level
            "#,
        )
        .bind(&mutation.product_id)
        .bind(mutation.delta)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
    };

    let new_qty = match new_qty {
        Some(qty) => qty,
        None => {
            // The guard said no. Either the product is missing or the
            // decrease would go below zero.
            let row: Option<(String, i64)> =
                sqlx::query_as("SELECT sku, stock_level FROM products WHERE id = ?1")
                    .bind(&mutation.product_id)
                    .fetch_optional(&mut *conn)
                    .await?;

            return Err(match row {
                None => DbError::not_found("Product", &mutation.product_id),
                Some((sku, available)) => DbError::InsufficientStock {
                    shortages: vec![StockShortage {
                        product_id: mutation.product_id.clone(),
                        sku,
                        available,
                        requested: -mutation.delta,
                    }],
                },
            });
        }
    };

    let entry = StockEntry {
        id: Uuid::new_v4().to_string(),
        product_id: mutation.product_id.clone(),
        qty_delta: mutation.delta,
        kind: mutation.kind,
        batch: mutation.batch.clone(),
        expiry: mutation.expiry,
        location: mutation.location.clone(),
        reference: mutation.reference.clone(),
        created_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO stock_entries (
            id, product_id, qty_delta, kind, batch, expiry, location, reference, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.product_id)
    .bind(entry.qty_delta)
    .bind(entry.kind)
    .bind(&entry.batch)
    .bind(entry.expiry)
    .bind(&entry.location)
    .bind(&entry.reference)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok((entry, new_qty))
}

/// Applies a batch of line items inside an existing transaction.
///
/// See [`StockLedger::apply_line_items`] for the contract. Duplicated
/// products in the batch are aggregated during the pre-check so the
/// projection matches what sequential application will do.
pub(crate) async fn apply_line_items_tx(
    conn: &mut SqliteConnection,
    items: &[LineQuantity],
    intent: MutationIntent,
    reference: &str,
) -> DbResult<Vec<i64>> {
    let (kind, sign) = match intent {
        MutationIntent::Decrease => (StockEntryKind::Out, -1i64),
        MutationIntent::Increase => (StockEntryKind::In, 1i64),
    };

    if intent == MutationIntent::Decrease {
        precheck_decrease(conn, items).await?;
    }

    let mut new_quantities = Vec::with_capacity(items.len());

    for item in items {
        let mutation = StockMutation::new(&item.product_id, sign * item.quantity, kind)
            .with_reference(reference);

        match apply_delta_tx(conn, &mutation).await {
            Ok((_, qty)) => new_quantities.push(qty),
            // The pre-check passed, so the row changed between our read
            // and this write. Surface it as a conflict, not a shortage.
            Err(DbError::InsufficientStock { .. }) => {
                return Err(DbError::concurrent("Product", &item.product_id));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(new_quantities)
}

/// Pre-check pass: project every line's resulting quantity and collect
/// ALL shortages before applying anything.
async fn precheck_decrease(
    conn: &mut SqliteConnection,
    items: &[LineQuantity],
) -> DbResult<()> {
    use std::collections::HashMap;

    // projected quantity per product, aggregated across duplicate lines:
    // id -> (sku, available, requested)
    let mut projected: HashMap<&str, (String, i64, i64)> = HashMap::new();

    for item in items {
        if let Some((_, _, requested)) = projected.get_mut(item.product_id.as_str()) {
            *requested += item.quantity;
            continue;
        }

        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT sku, stock_level FROM products WHERE id = ?1")
                .bind(&item.product_id)
                .fetch_optional(&mut *conn)
                .await?;

        let (sku, available) =
            row.ok_or_else(|| DbError::not_found("Product", &item.product_id))?;
        projected.insert(item.product_id.as_str(), (sku, available, item.quantity));
    }

    let mut shortages: Vec<StockShortage> = projected
        .into_iter()
        .filter(|(_, (_, available, requested))| available - requested < 0)
        .map(|(product_id, (sku, available, requested))| StockShortage {
            product_id: product_id.to_string(),
            sku,
            available,
            requested,
        })
        .collect();

    if shortages.is_empty() {
        Ok(())
    } else {
        // Deterministic order for error messages and tests.
        shortages.sort_by(|a, b| a.sku.cmp(&b.sku));
        Err(DbError::InsufficientStock { shortages })
    }
}

async fn current_quantity(conn: &mut SqliteConnection, product_id: &str) -> DbResult<i64> {
    let qty: Option<i64> = sqlx::query_scalar("SELECT stock_level FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    qty.ok_or_else(|| DbError::not_found("Product", product_id))
}

async fn sku_of(conn: &mut SqliteConnection, product_id: &str) -> DbResult<String> {
    let sku: Option<String> = sqlx::query_scalar("SELECT sku FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    sku.ok_or_else(|| DbError::not_found("Product", product_id))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::NewProduct;
    use std::sync::Arc;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_product(db: &Database, sku: &str, stock: i64) -> String {
        let product = db
            .products()
            .insert(&NewProduct {
                sku: sku.to_string(),
                barcode: None,
                name: format!("Test {sku}"),
                description: None,
                unit_price_cents: 500,
                cost_price_cents: 300,
                tax_rate_bps: 0,
                discount_bps: 0,
                initial_stock: stock,
            })
            .await
            .unwrap();
        product.id
    }

    #[tokio::test]
    async fn test_apply_delta_updates_quantity_and_ledger() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10).await;
        let stock = db.stock();

        let mutation = StockMutation::new(&pid, -4, StockEntryKind::Out)
            .with_reference("invoice:INV-TEST");
        let new_qty = stock.apply_delta(&mutation).await.unwrap();

        assert_eq!(new_qty, 6);
        assert_eq!(stock.quantity(&pid).await.unwrap(), 6);
        // Ledger invariant: sum of deltas equals on-hand quantity.
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 6);

        let entries = stock.list_entries(Some(&pid), 50, 0).await.unwrap();
        let out: Vec<_> = entries.iter().filter(|e| e.qty_delta == -4).collect();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reference.as_deref(), Some("invoice:INV-TEST"));
    }

    #[tokio::test]
    async fn test_apply_delta_rejects_insufficient_stock() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 3).await;
        let stock = db.stock();

        let err = stock
            .apply_delta(&StockMutation::new(&pid, -4, StockEntryKind::Out))
            .await
            .unwrap_err();

        match err {
            DbError::InsufficientStock { shortages } => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].available, 3);
                assert_eq!(shortages[0].requested, 4);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing changed.
        assert_eq!(stock.quantity(&pid).await.unwrap(), 3);
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_apply_delta_unknown_product() {
        let db = test_db().await;
        let stock = db.stock();

        let err = stock
            .apply_delta(&StockMutation::new("missing", -1, StockEntryKind::Out))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjust_with_override_may_go_negative() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 2).await;
        let stock = db.stock();

        let mutation = StockMutation::new(&pid, -5, StockEntryKind::Adjust)
            .with_reference("stocktake:2026-08")
            .allowing_negative();
        let new_qty = stock.apply_delta(&mutation).await.unwrap();

        assert_eq!(new_qty, -3);
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), -3);
    }

    #[tokio::test]
    async fn test_line_items_all_or_nothing() {
        let db = test_db().await;
        let stock = db.stock();

        // Five products; the third one is short.
        let mut pids = Vec::new();
        for (i, qty) in [10, 10, 2, 10, 10].iter().enumerate() {
            pids.push(seed_product(&db, &format!("SKU-{i}"), *qty).await);
        }

        let items: Vec<LineQuantity> = pids
            .iter()
            .map(|pid| LineQuantity::new(pid.clone(), 3))
            .collect();

        let err = stock
            .apply_line_items(&items, MutationIntent::Decrease, "invoice:INV-X")
            .await
            .unwrap_err();

        match err {
            DbError::InsufficientStock { shortages } => {
                assert_eq!(shortages.len(), 1);
                assert_eq!(shortages[0].sku, "SKU-2");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Zero quantity changes anywhere, items 1, 2, 4, 5 included.
        for (pid, expected) in pids.iter().zip([10, 10, 2, 10, 10]) {
            assert_eq!(stock.quantity(pid).await.unwrap(), expected);
            assert_eq!(stock.ledger_total(pid).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_line_items_decrease_then_increase() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 10).await;
        let stock = db.stock();

        let items = vec![LineQuantity::new(pid.clone(), 3)];

        let down = stock
            .apply_line_items(&items, MutationIntent::Decrease, "invoice:INV-1")
            .await
            .unwrap();
        assert_eq!(down, vec![7]);

        let up = stock
            .apply_line_items(&items, MutationIntent::Increase, "invoice:INV-1")
            .await
            .unwrap();
        assert_eq!(up, vec![10]);

        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_duplicate_lines_are_aggregated_in_precheck() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 4).await;
        let stock = db.stock();

        // 2 + 3 = 5 requested against 4 on hand: each line alone fits,
        // the aggregate does not.
        let items = vec![
            LineQuantity::new(pid.clone(), 2),
            LineQuantity::new(pid.clone(), 3),
        ];

        let err = stock
            .apply_line_items(&items, MutationIntent::Decrease, "invoice:INV-DUP")
            .await
            .unwrap_err();

        match err {
            DbError::InsufficientStock { shortages } => {
                assert_eq!(shortages[0].requested, 5);
                assert_eq!(shortages[0].available, 4);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(stock.quantity(&pid).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_decrements_cannot_both_win() {
        let db = Arc::new(test_db().await);
        let pid = seed_product(&db, "SKU-1", 1).await;

        let (a, b) = tokio::join!(
            {
                let db = db.clone();
                let pid = pid.clone();
                async move {
                    db.stock()
                        .apply_delta(&StockMutation::new(&pid, -1, StockEntryKind::Out))
                        .await
                }
            },
            {
                let db = db.clone();
                let pid = pid.clone();
                async move {
                    db.stock()
                        .apply_delta(&StockMutation::new(&pid, -1, StockEntryKind::Out))
                        .await
                }
            }
        );

        // Exactly one wins; the loser sees the shortage, never a lost update.
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);

        let stock = db.stock();
        assert_eq!(stock.quantity(&pid).await.unwrap(), 0);
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manual_entry_roundtrip() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 5).await;
        let stock = db.stock();

        let mutation = StockMutation::new(&pid, 20, StockEntryKind::In)
            .with_reference("po:PO-1001");
        let entry = stock.create_entry(&mutation).await.unwrap();

        assert_eq!(stock.quantity(&pid).await.unwrap(), 25);
        assert!(stock.get_entry(&entry.id).await.unwrap().is_some());

        // Removing the entry takes its contribution back out.
        stock.delete_entry(&entry.id).await.unwrap();
        assert_eq!(stock.quantity(&pid).await.unwrap(), 5);
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 5);
        assert!(stock.get_entry(&entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_manual_entry_sign_must_match_kind() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 5).await;
        let stock = db.stock();

        let err = stock
            .create_entry(&StockMutation::new(&pid, -3, StockEntryKind::In))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));

        let err = stock
            .create_entry(&StockMutation::new(&pid, 3, StockEntryKind::Out))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }

    #[tokio::test]
    async fn test_delete_entry_cannot_drive_stock_negative() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 0).await;
        let stock = db.stock();

        let entry = stock
            .create_entry(&StockMutation::new(&pid, 10, StockEntryKind::In))
            .await
            .unwrap();

        // Sell 8 of the 10, then try to remove the receipt of 10.
        stock
            .apply_delta(&StockMutation::new(&pid, -8, StockEntryKind::Out))
            .await
            .unwrap();

        let err = stock.delete_entry(&entry.id).await.unwrap_err();
        assert!(matches!(err, DbError::InsufficientStock { .. }));

        // Entry still there, invariant intact.
        assert!(stock.get_entry(&entry.id).await.unwrap().is_some());
        assert_eq!(stock.quantity(&pid).await.unwrap(), 2);
        assert_eq!(stock.ledger_total(&pid).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeated_reads_are_stable_between_mutations() {
        let db = test_db().await;
        let pid = seed_product(&db, "SKU-1", 7).await;
        let stock = db.stock();

        let first = stock.quantity(&pid).await.unwrap();
        let second = stock.quantity(&pid).await.unwrap();
        assert_eq!(first, second);
    }
}
