//! # Invoice Repository
//!
//! Database operations for invoices and their line items.
//!
//! ## Invoice Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invoice Lifecycle                                 │
//! │                                                                         │
//! │  1. CREATE                                                             │
//! │     └── create() → Invoice { status: Draft }      no stock effect      │
//! │     └── create() → Invoice { status: Issued }     stock decreased in   │
//! │                                                   the SAME transaction │
//! │                                                                         │
//! │  2. EDIT (Draft only)                                                  │
//! │     └── replace_items() → new snapshots, new totals                    │
//! │                                                                         │
//! │  3. TRANSITION                                                         │
//! │     └── update_status() → compare-and-swap on the status column,       │
//! │                           stock effect from the lifecycle rules        │
//! │                                                                         │
//! │  4. DELETE                                                             │
//! │     └── delete() → restores only the UNREFUNDED remainder, and only    │
//! │                    if the invoice had decreased stock at all           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every path that touches stock runs inside one transaction with the
//! invoice rows: an insufficient-stock rejection leaves no invoice behind.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::apply_line_items_tx;
use regal_core::{
    lifecycle, validation, Invoice, InvoiceItem, InvoiceStatus, LineQuantity, MutationIntent,
    Product, RefundState, StockEffect,
};

/// Parameters for creating an invoice.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    /// Nullable: walk-in sales carry no customer.
    pub customer_id: Option<String>,
    /// Products and quantities; prices are snapshotted server-side.
    pub line_items: Vec<LineQuantity>,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub status: InvoiceStatus,
    pub created_by: String,
}

/// An invoice joined with its line items and derived refund state.
#[derive(Debug, Clone)]
pub struct InvoiceWithItems {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub refund_state: RefundState,
}

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Creates an invoice, snapshotting product data into its line items.
    ///
    /// Creating directly as Issued or Paid decreases stock for every line
    /// item in the same transaction. If any line is short, the whole
    /// create fails and no invoice row is persisted.
    pub async fn create(&self, new: &NewInvoice) -> DbResult<InvoiceWithItems> {
        if new.status == InvoiceStatus::Cancelled {
            return Err(regal_core::CoreError::InvalidCreationStatus { status: new.status }.into());
        }
        validation::validate_line_items(&new.line_items).map_err(DbError::from)?;
        validation::validate_price_cents("tax_cents", new.tax_cents)
            .map_err(regal_core::CoreError::from)?;
        validation::validate_price_cents("discount_cents", new.discount_cents)
            .map_err(regal_core::CoreError::from)?;

        let now = Utc::now();
        let invoice_no = generate_invoice_number();

        let mut tx = self.pool.begin().await?;

        if let Some(customer_id) = &new.customer_id {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1 AND is_active = 1")
                    .bind(customer_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Customer", customer_id));
            }
        }

        // Snapshot each line from the live product row.
        let invoice_id = Uuid::new_v4().to_string();
        let mut items = Vec::with_capacity(new.line_items.len());
        let mut subtotal_cents: i64 = 0;

        for line in &new.line_items {
            let product = active_product(&mut tx, &line.product_id).await?;
            let line_total_cents = product.unit_price().multiply_quantity(line.quantity).cents();
            subtotal_cents += line_total_cents;

            items.push(InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice_id.clone(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.unit_price_cents,
                quantity: line.quantity,
                line_total_cents,
                refunded_qty: 0,
                created_at: now,
            });
        }

        let invoice = Invoice {
            id: invoice_id.clone(),
            invoice_no: invoice_no.clone(),
            customer_id: new.customer_id.clone(),
            subtotal_cents,
            tax_cents: new.tax_cents,
            discount_cents: new.discount_cents,
            total_cents: subtotal_cents + new.tax_cents - new.discount_cents,
            status: new.status,
            created_by: new.created_by.clone(),
            created_at: now,
            updated_at: now,
        };

        insert_invoice_row(&mut tx, &invoice).await?;
        for item in &items {
            insert_item_row(&mut tx, item).await?;
        }

        // The stock effect commits or rolls back with the rows above.
        if lifecycle::creation_stock_effect(new.status) == StockEffect::Decrease {
            apply_line_items_tx(
                &mut tx,
                &new.line_items,
                MutationIntent::Decrease,
                &format!("invoice:{invoice_no}"),
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            invoice_no = %invoice_no,
            status = ?new.status,
            items = items.len(),
            total = invoice.total_cents,
            "Invoice created"
        );

        Ok(InvoiceWithItems {
            invoice,
            items,
            refund_state: RefundState::None,
        })
    }

    /// Gets an invoice with its items by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InvoiceWithItems>> {
        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, invoice_no, customer_id, subtotal_cents, tax_cents, discount_cents,
                   total_cents, status, created_by, created_at, updated_at
            FROM invoices
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(invoice) = invoice else {
            return Ok(None);
        };

        let items = self.items_of(&invoice.id).await?;
        let refund_state = regal_core::refund_state(&items);

        Ok(Some(InvoiceWithItems {
            invoice,
            items,
            refund_state,
        }))
    }

    /// Lists invoices, newest first, optionally filtered by customer.
    pub async fn list(
        &self,
        customer_id: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = match customer_id {
            Some(cid) => {
                sqlx::query_as::<_, Invoice>(
                    r#"
                    SELECT id, invoice_no, customer_id, subtotal_cents, tax_cents, discount_cents,
                           total_cents, status, created_by, created_at, updated_at
                    FROM invoices
                    WHERE customer_id = ?1
                    ORDER BY created_at DESC
                    LIMIT ?2 OFFSET ?3
                    "#,
                )
                .bind(cid)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Invoice>(
                    r#"
                    SELECT id, invoice_no, customer_id, subtotal_cents, tax_cents, discount_cents,
                           total_cents, status, created_by, created_at, updated_at
                    FROM invoices
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

        Ok(invoices)
    }

    /// Line items of an invoice, oldest first.
    pub async fn items_of(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT id, invoice_id, product_id, sku_snapshot, name_snapshot,
                   unit_price_cents, quantity, line_total_cents, refunded_qty, created_at
            FROM invoice_items
            WHERE invoice_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Replaces the line items of a Draft invoice and recomputes totals.
    ///
    /// Anything past Draft has its items locked; compensation goes
    /// through refunds.
    pub async fn replace_items(
        &self,
        id: &str,
        line_items: &[LineQuantity],
    ) -> DbResult<InvoiceWithItems> {
        validation::validate_line_items(line_items).map_err(DbError::from)?;

        let mut tx = self.pool.begin().await?;

        let invoice = invoice_row(&mut tx, id).await?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(regal_core::CoreError::ItemsLocked {
                status: invoice.status,
            }
            .into());
        }

        sqlx::query("DELETE FROM invoice_items WHERE invoice_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        let mut subtotal_cents: i64 = 0;
        let mut items = Vec::with_capacity(line_items.len());

        for line in line_items {
            let product = active_product(&mut tx, &line.product_id).await?;
            let line_total_cents = product.unit_price().multiply_quantity(line.quantity).cents();
            subtotal_cents += line_total_cents;

            let item = InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: id.to_string(),
                product_id: product.id.clone(),
                sku_snapshot: product.sku.clone(),
                name_snapshot: product.name.clone(),
                unit_price_cents: product.unit_price_cents,
                quantity: line.quantity,
                line_total_cents,
                refunded_qty: 0,
                created_at: now,
            };
            insert_item_row(&mut tx, &item).await?;
            items.push(item);
        }

        let total_cents = subtotal_cents + invoice.tax_cents - invoice.discount_cents;
        sqlx::query(
            r#"
            UPDATE invoices
            SET subtotal_cents = ?2, total_cents = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(subtotal_cents)
        .bind(total_cents)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut updated = invoice;
        updated.subtotal_cents = subtotal_cents;
        updated.total_cents = total_cents;
        updated.updated_at = now;

        Ok(InvoiceWithItems {
            invoice: updated,
            items,
            refund_state: RefundState::None,
        })
    }

    /// Moves an invoice to a new status and applies the stock effect of
    /// the transition, all in one transaction.
    ///
    /// The status write is a compare-and-swap against the status we read;
    /// zero rows affected means a concurrent writer got there first and
    /// surfaces as `ConcurrentModification` (callers retry once).
    pub async fn update_status(
        &self,
        id: &str,
        new_status: InvoiceStatus,
    ) -> DbResult<InvoiceWithItems> {
        let mut tx = self.pool.begin().await?;

        let invoice = invoice_row(&mut tx, id).await?;
        let effect =
            lifecycle::transition_stock_effect(invoice.status, new_status).map_err(DbError::from)?;

        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE invoices SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = ?4",
        )
        .bind(id)
        .bind(new_status)
        .bind(now)
        .bind(invoice.status)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("Invoice", id));
        }

        let items = items_rows(&mut tx, id).await?;
        apply_effect(&mut tx, &invoice, &items, effect).await?;

        tx.commit().await?;

        info!(
            invoice_no = %invoice.invoice_no,
            from = ?invoice.status,
            to = ?new_status,
            "Invoice status changed"
        );

        let refund_state = regal_core::refund_state(&items);
        let mut updated = invoice;
        updated.status = new_status;
        updated.updated_at = now;

        Ok(InvoiceWithItems {
            invoice: updated,
            items,
            refund_state,
        })
    }

    /// Deletes an invoice, restoring the unrefunded remainder of its
    /// line items when the invoice had decreased stock.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let invoice = invoice_row(&mut tx, id).await?;
        let items = items_rows(&mut tx, id).await?;
        let effect = lifecycle::deletion_stock_effect(invoice.status);

        apply_effect(&mut tx, &invoice, &items, effect).await?;

        // Items cascade.
        sqlx::query("DELETE FROM invoices WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(invoice_no = %invoice.invoice_no, status = ?invoice.status, "Invoice deleted");
        Ok(())
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================

async fn invoice_row(conn: &mut SqliteConnection, id: &str) -> DbResult<Invoice> {
    let invoice = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, invoice_no, customer_id, subtotal_cents, tax_cents, discount_cents,
               total_cents, status, created_by, created_at, updated_at
        FROM invoices
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    invoice.ok_or_else(|| DbError::not_found("Invoice", id))
}

pub(crate) async fn items_rows(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(
        r#"
        SELECT id, invoice_id, product_id, sku_snapshot, name_snapshot,
               unit_price_cents, quantity, line_total_cents, refunded_qty, created_at
        FROM invoice_items
        WHERE invoice_id = ?1
        ORDER BY created_at
        "#,
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

async fn active_product(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    let product = sqlx::query_as::<_, Product>(
        r#"
        SELECT id, sku, barcode, name, description,
               unit_price_cents, cost_price_cents, tax_rate_bps, discount_bps,
               stock_level, is_active, created_at, updated_at
        FROM products
        WHERE id = ?1 AND is_active = 1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    product.ok_or_else(|| DbError::not_found("Product", id))
}

/// Applies a lifecycle stock effect over an invoice's items.
///
/// Decreases cover the full quantities; increases cover only what refunds
/// have not already returned, so a cancellation or deletion after a
/// partial refund never double-credits stock.
async fn apply_effect(
    conn: &mut SqliteConnection,
    invoice: &Invoice,
    items: &[InvoiceItem],
    effect: StockEffect,
) -> DbResult<()> {
    let reference = format!("invoice:{}", invoice.invoice_no);

    match effect {
        StockEffect::None => Ok(()),
        StockEffect::Decrease => {
            let lines: Vec<LineQuantity> = items
                .iter()
                .map(|i| LineQuantity::new(i.product_id.clone(), i.quantity))
                .collect();
            apply_line_items_tx(conn, &lines, MutationIntent::Decrease, &reference).await?;
            Ok(())
        }
        StockEffect::Increase => {
            let lines: Vec<LineQuantity> = items
                .iter()
                .filter(|i| i.unrefunded_qty() > 0)
                .map(|i| LineQuantity::new(i.product_id.clone(), i.unrefunded_qty()))
                .collect();
            if !lines.is_empty() {
                apply_line_items_tx(conn, &lines, MutationIntent::Increase, &reference).await?;
            }
            Ok(())
        }
    }
}

/// Generates an invoice number in format: `INV-YYYYMMDD-XXXXXXXX`.
///
/// The suffix is the first UUID block, uppercased. Collisions are caught
/// by the UNIQUE constraint on `invoice_no`.
fn generate_invoice_number() -> String {
    let date_part = Utc::now().format("%Y%m%d");
    let suffix: String = Uuid::new_v4()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();

    format!("INV-{date_part}-{suffix}")
}

async fn insert_invoice_row(conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<()> {
    debug!(id = %invoice.id, invoice_no = %invoice.invoice_no, "Inserting invoice");

    sqlx::query(
        r#"
        INSERT INTO invoices (
            id, invoice_no, customer_id, subtotal_cents, tax_cents, discount_cents,
            total_cents, status, created_by, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.invoice_no)
    .bind(&invoice.customer_id)
    .bind(invoice.subtotal_cents)
    .bind(invoice.tax_cents)
    .bind(invoice.discount_cents)
    .bind(invoice.total_cents)
    .bind(invoice.status)
    .bind(&invoice.created_by)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_item_row(conn: &mut SqliteConnection, item: &InvoiceItem) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO invoice_items (
            id, invoice_id, product_id, sku_snapshot, name_snapshot,
            unit_price_cents, quantity, line_total_cents, refunded_qty, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&item.id)
    .bind(&item.invoice_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.unit_price_cents)
    .bind(item.quantity)
    .bind(item.line_total_cents)
    .bind(item.refunded_qty)
    .bind(item.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
