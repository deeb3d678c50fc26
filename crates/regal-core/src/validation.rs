//! # Validation Module
//!
//! Input and business rule validation for Regal POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (axum extractors)                               │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field and business rule validation                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Database (SQLite)                                            │
//! │  ├── NOT NULL constraints                                              │
//! │  ├── UNIQUE constraints                                                │
//! │  └── The guarded stock update (authoritative quantity check)           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{InvoiceItem, LineQuantity, StockEntryKind};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, customer).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a username.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 64,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "must contain only letters, numbers, dots, hyphens, and underscores"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates a sale or refund quantity.
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (giveaways), negatives are not.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Business Rule Validators
// =============================================================================

/// Checks that a manual stock entry's delta agrees with its kind.
///
/// In entries restock (positive), Out entries remove (negative), Adjust
/// entries may go either way but not zero.
pub fn validate_stock_delta(kind: StockEntryKind, delta: i64) -> CoreResult<()> {
    let ok = match kind {
        StockEntryKind::In => delta > 0,
        StockEntryKind::Out => delta < 0,
        StockEntryKind::Adjust => delta != 0,
    };

    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidStockDelta { kind, delta })
    }
}

/// Validates the line item list of a new invoice.
pub fn validate_line_items(items: &[LineQuantity]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::EmptyLineItems);
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(CoreError::TooManyLineItems {
            max: MAX_LINE_ITEMS,
        });
    }

    for item in items {
        validate_quantity(item.quantity)?;
    }

    Ok(())
}

/// Validates refund items against the invoice they compensate and returns
/// the refund amount in cents, priced at the invoice's frozen unit prices.
///
/// ## Rules
/// - every refunded product must appear on the invoice
/// - per product, requested + previously refunded must not exceed the
///   originally sold quantity (over-refunds are rejected)
///
/// Quantities for the same product are aggregated before checking, so a
/// refund listing a product twice cannot sneak past the cap.
pub fn validate_refund_items(
    invoice_items: &[InvoiceItem],
    refund_items: &[LineQuantity],
) -> CoreResult<i64> {
    if refund_items.is_empty() {
        return Err(CoreError::EmptyLineItems);
    }

    // Aggregate requested quantities per product.
    let mut requested: HashMap<&str, i64> = HashMap::new();
    for item in refund_items {
        validate_quantity(item.quantity)?;
        *requested.entry(item.product_id.as_str()).or_insert(0) += item.quantity;
    }

    let mut amount_cents: i64 = 0;

    for (product_id, qty) in requested {
        let lines: Vec<&InvoiceItem> = invoice_items
            .iter()
            .filter(|i| i.product_id == product_id)
            .collect();

        if lines.is_empty() {
            return Err(CoreError::ItemNotOnInvoice {
                product_id: product_id.to_string(),
            });
        }

        let refundable: i64 = lines.iter().map(|i| i.unrefunded_qty()).sum();
        if qty > refundable {
            return Err(CoreError::OverRefund {
                product_id: product_id.to_string(),
                requested: qty,
                refundable,
            });
        }

        amount_cents += lines[0].unit_price().multiply_quantity(qty).cents();
    }

    Ok(amount_cents)
}

// =============================================================================
// Unit Tests
// =============================================================================
