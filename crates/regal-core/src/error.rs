//! # Error Types
//!
//! Domain-specific error types for regal-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  regal-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  regal-db errors (separate crate)                                      │
//! │  └── DbError          - Storage failures, stock shortages,             │
//! │                         concurrent modification                        │
//! │                                                                         │
//! │  HTTP errors (in the server app)                                       │
//! │  └── ApiError         - Status code + machine-readable error code      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Client       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

use crate::types::{InvoiceStatus, StockEntryKind};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They are raised before
/// any storage write happens, so a caller seeing one knows nothing changed.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested status change is not part of the lifecycle.
    ///
    /// Legal moves: Draft → Issued/Cancelled, Issued → Paid/Cancelled,
    /// Paid → Cancelled. Cancelled is terminal.
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// Invoices enter the world as Draft, Issued, or Paid.
    #[error("Invoice cannot be created as {status:?}")]
    InvalidCreationStatus { status: InvoiceStatus },

    /// Line items can only be edited while the invoice is a draft.
    /// Compensation afterwards goes through a refund.
    #[error("Invoice is {status:?}, line items are locked")]
    ItemsLocked { status: InvoiceStatus },

    /// Refunds only apply to invoices whose sale materialized.
    #[error("Invoice is {status:?}, only issued or paid invoices can be refunded")]
    NotRefundable { status: InvoiceStatus },

    /// An invoice needs at least one line item.
    #[error("Invoice has no line items")]
    EmptyLineItems,

    /// Too many line items on one invoice.
    #[error("Invoice cannot have more than {max} line items")]
    TooManyLineItems { max: usize },

    /// A refund referenced a product the invoice never sold.
    #[error("Product {product_id} is not on the invoice")]
    ItemNotOnInvoice { product_id: String },

    /// A refund would return more units than remain refundable.
    ///
    /// `refundable` already accounts for prior refunds against the
    /// same invoice.
    #[error("Refund of {requested} exceeds refundable quantity {refundable} for product {product_id}")]
    OverRefund {
        product_id: String,
        requested: i64,
        refundable: i64,
    },

    /// Manual stock entry delta does not match its kind
    /// (In must be positive, Out must be negative).
    #[error("Delta {delta} is invalid for a {kind:?} stock entry")]
    InvalidStockDelta { kind: StockEntryKind, delta: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., bad characters in a SKU).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::OverRefund {
            product_id: "p-1".to_string(),
            requested: 5,
            refundable: 2,
        };
        assert_eq!(
            err.to_string(),
            "Refund of 5 exceeds refundable quantity 2 for product p-1"
        );

        let err = CoreError::InvalidTransition {
            from: InvoiceStatus::Cancelled,
            to: InvoiceStatus::Paid,
        };
        assert_eq!(
            err.to_string(),
            "Invalid status transition: Cancelled -> Paid"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(err.to_string(), "sku is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
