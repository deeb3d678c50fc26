//! # Domain Types
//!
//! Core domain types used throughout Regal POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │     Refund      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  invoice_no     │   │  invoice_id(FK) │       │
//! │  │  stock_level    │   │  status         │   │  amount_cents   │       │
//! │  │  price cents    │   │  total_cents    │   │  processed_by   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockEntry    │   │  InvoiceStatus  │   │ StockEntryKind  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  qty_delta (±)  │   │  Draft          │   │  In             │       │
//! │  │  kind           │   │  Issued         │   │  Out            │       │
//! │  │  reference      │   │  Paid           │   │  Adjust         │       │
//! │  └─────────────────┘   │  Cancelled      │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_no, username) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::access::Role;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown on receipts and line items.
    pub name: String,

    /// Optional description for product details.
    pub description: Option<String>,

    /// Selling price in cents (smallest currency unit).
    pub unit_price_cents: i64,

    /// Acquisition cost in cents (for margin calculations).
    pub cost_price_cents: i64,

    /// Tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Standing discount in basis points (1000 = 10%).
    pub discount_bps: u32,

    /// Current on-hand quantity. Mutated ONLY through the stock
    /// coordinator; equals the sum of the product's ledger deltas.
    pub stock_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the selling price as a Money type.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Returns the tax rate.
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    /// Checks whether `quantity` units could be sold from current stock.
    ///
    /// This is an advisory read; the authoritative check happens inside
    /// the stock coordinator's guarded update.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock_level >= quantity
    }
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// The kind of a stock ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockEntryKind {
    /// Goods received (purchase, refund restock). Positive delta.
    In,
    /// Goods leaving (sale, spoilage). Negative delta.
    Out,
    /// Manual correction. Either sign, may drive stock negative.
    Adjust,
}

/// One row of the append-only stock ledger.
///
/// The sum of `qty_delta` across a product's entries equals the product's
/// `stock_level` at all times.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,
    /// Signed quantity change (+ for In, - for Out, either for Adjust).
    pub qty_delta: i64,
    pub kind: StockEntryKind,
    /// Optional batch/lot identifier.
    pub batch: Option<String>,
    /// Optional expiry date for perishables.
    #[ts(as = "Option<String>")]
    pub expiry: Option<NaiveDate>,
    /// Optional storage location.
    pub location: Option<String>,
    /// Opaque back-reference to the causing transaction,
    /// e.g. `invoice:INV-20260115-AB12CD34` or `refund:<uuid>`.
    pub reference: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Direction of a batched line item mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationIntent {
    /// Sale: subtract each line quantity.
    Decrease,
    /// Refund or cancellation: add each line quantity back.
    Increase,
}

/// A (product, quantity) pair fed to the stock coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineQuantity {
    pub product_id: String,
    pub quantity: i64,
}

impl LineQuantity {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        LineQuantity {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A single quantity mutation request for the stock coordinator.
#[derive(Debug, Clone)]
pub struct StockMutation {
    pub product_id: String,
    /// Signed delta to apply to the product's on-hand quantity.
    pub delta: i64,
    pub kind: StockEntryKind,
    pub reference: Option<String>,
    pub batch: Option<String>,
    pub expiry: Option<NaiveDate>,
    pub location: Option<String>,
    /// Skip the non-negative guard. Only corrective Adjust entries and
    /// refund-deletion compensations set this.
    pub allow_negative: bool,
}

impl StockMutation {
    /// Creates a mutation with the non-negative guard enabled.
    pub fn new(product_id: impl Into<String>, delta: i64, kind: StockEntryKind) -> Self {
        StockMutation {
            product_id: product_id.into(),
            delta,
            kind,
            reference: None,
            batch: None,
            expiry: None,
            location: None,
            allow_negative: false,
        }
    }

    /// Attaches a traceability reference.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Allows the resulting quantity to go below zero.
    pub fn allowing_negative(mut self) -> Self {
        self.allow_negative = true;
        self
    }
}

/// One product that would be driven negative by a batched decrease.
///
/// Collected during the pre-check pass so a caller sees every shortage
/// at once instead of fixing them one at a time.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockShortage {
    pub product_id: String,
    pub sku: String,
    pub available: i64,
    pub requested: i64,
}

// =============================================================================
// Invoice
// =============================================================================

/// The lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being assembled; line items still editable, no stock effect yet.
    Draft,
    /// Finalized sale; stock has been decreased.
    Issued,
    /// Issued and settled.
    Paid,
    /// Terminal. Stock restored when entered from Issued/Paid.
    Cancelled,
}

impl Default for InvoiceStatus {
    fn default() -> Self {
        InvoiceStatus::Draft
    }
}

/// A sales transaction.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// Human-readable transaction number, `INV-YYYYMMDD-XXXXXXXX`.
    pub invoice_no: String,
    /// Nullable: walk-in sales carry no customer.
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub status: InvoiceStatus,
    /// User who created the invoice (audit attribution).
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// A line item in an invoice.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// Quantity sold.
    pub quantity: i64,
    /// Line total before tax (unit_price × quantity).
    pub line_total_cents: i64,
    /// Units of this line returned so far across all refunds.
    pub refunded_qty: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Units not yet refunded; the quantity a cancellation or deletion
    /// would restore to stock.
    #[inline]
    pub fn unrefunded_qty(&self) -> i64 {
        self.quantity - self.refunded_qty
    }
}

/// How much of an invoice has been returned, derived from its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundState {
    None,
    Partial,
    Full,
}

/// Derives the refund state from an invoice's items.
pub fn refund_state(items: &[InvoiceItem]) -> RefundState {
    let refunded: i64 = items.iter().map(|i| i.refunded_qty).sum();
    let sold: i64 = items.iter().map(|i| i.quantity).sum();

    if refunded == 0 {
        RefundState::None
    } else if refunded < sold {
        RefundState::Partial
    } else {
        RefundState::Full
    }
}

// =============================================================================
// Refund
// =============================================================================

/// A refund against an invoice. Increases stock for each returned item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Refund {
    pub id: String,
    pub invoice_id: String,
    /// Amount returned, computed from the invoice's frozen unit prices.
    pub amount_cents: i64,
    pub reason: String,
    /// User who processed the refund.
    pub processed_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One returned line of a refund.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RefundItem {
    pub id: String,
    pub refund_id: String,
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Customer
// =============================================================================

/// A customer record. Referenced nullably by invoices.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

/// A staff account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    /// Argon2 hash. Never serialized out of the process.
    #[serde(skip_serializing)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Audit
// =============================================================================

/// A fire-and-forget record of "who changed what".
///
/// Failures to persist an audit entry are logged and swallowed; they never
/// roll back the business transaction they describe.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditEntry {
    pub id: String,
    pub user_id: String,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    /// JSON blob describing the change.
    pub details: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: i64, refunded_qty: i64) -> InvoiceItem {
        InvoiceItem {
            id: "item-1".to_string(),
            invoice_id: "inv-1".to_string(),
            product_id: "prod-1".to_string(),
            sku_snapshot: "SKU-1".to_string(),
            name_snapshot: "Thing".to_string(),
            unit_price_cents: 100,
            quantity,
            line_total_cents: 100 * quantity,
            refunded_qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_invoice_status_default() {
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Draft);
    }

    #[test]
    fn test_unrefunded_qty() {
        assert_eq!(item(4, 0).unrefunded_qty(), 4);
        assert_eq!(item(4, 2).unrefunded_qty(), 2);
        assert_eq!(item(4, 4).unrefunded_qty(), 0);
    }

    #[test]
    fn test_refund_state_derivation() {
        assert_eq!(refund_state(&[item(4, 0), item(2, 0)]), RefundState::None);
        assert_eq!(
            refund_state(&[item(4, 2), item(2, 0)]),
            RefundState::Partial
        );
        assert_eq!(refund_state(&[item(4, 4), item(2, 2)]), RefundState::Full);
    }

    #[test]
    fn test_can_sell_checks_stock_and_active() {
        let mut product = Product {
            id: "p1".to_string(),
            sku: "SKU-1".to_string(),
            barcode: None,
            name: "Thing".to_string(),
            description: None,
            unit_price_cents: 500,
            cost_price_cents: 300,
            tax_rate_bps: 0,
            discount_bps: 0,
            stock_level: 3,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert!(product.can_sell(3));
        assert!(!product.can_sell(4));

        product.is_active = false;
        assert!(!product.can_sell(1));
    }
}
