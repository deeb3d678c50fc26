//! # Invoice Lifecycle
//!
//! The invoice status machine and the stock side effect of each move.
//!
//! ## Status Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │              ┌─────────┐                                               │
//! │   create ───►│  Draft  │──────────────┐                                │
//! │              └────┬────┘              │ (no stock effect)              │
//! │                   │ DECREASE          │                                │
//! │              ┌────▼────┐              │                                │
//! │         ┌────│ Issued  │              │                                │
//! │         │    └────┬────┘              │                                │
//! │  (none) │         │ INCREASE          │                                │
//! │    ┌────▼────┐    │              ┌────▼──────┐                         │
//! │    │  Paid   │────┴─────────────►│ Cancelled │  (terminal)             │
//! │    └─────────┘     INCREASE      └───────────┘                         │
//! │                                                                         │
//! │  Creating directly as Issued or Paid applies the DECREASE at create    │
//! │  time. Increases on cancellation/deletion restore only the quantity   │
//! │  not already returned through refunds.                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These functions are pure so both the repository layer and tests agree on
//! one definition of the rules.

use crate::error::{CoreError, CoreResult};
use crate::types::InvoiceStatus;

// =============================================================================
// Stock Effect
// =============================================================================

/// What a lifecycle move does to the stock of the invoice's line items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    /// Leave stock untouched.
    None,
    /// Subtract each line quantity (the sale happens).
    Decrease,
    /// Add back each line's unrefunded remainder (the sale is undone).
    Increase,
}

// =============================================================================
// Transition Rules
// =============================================================================

/// Whether `from → to` is a legal status move.
pub fn can_transition(from: InvoiceStatus, to: InvoiceStatus) -> bool {
    use InvoiceStatus::*;

    matches!(
        (from, to),
        (Draft, Issued)
            | (Draft, Paid)
            | (Draft, Cancelled)
            | (Issued, Paid)
            | (Issued, Cancelled)
            | (Paid, Cancelled)
    )
}

/// The stock effect of a legal transition.
///
/// Returns an error for illegal moves so callers cannot apply a stock
/// effect for a transition that will be rejected.
pub fn transition_stock_effect(
    from: InvoiceStatus,
    to: InvoiceStatus,
) -> CoreResult<StockEffect> {
    use InvoiceStatus::*;

    if !can_transition(from, to) {
        return Err(CoreError::InvalidTransition { from, to });
    }

    Ok(match (from, to) {
        // The sale becomes real: stock leaves the shelf.
        (Draft, Issued) | (Draft, Paid) => StockEffect::Decrease,
        // Settling an issued invoice moves no goods.
        (Issued, Paid) => StockEffect::None,
        // Undo of a materialized sale.
        (Issued, Cancelled) | (Paid, Cancelled) => StockEffect::Increase,
        // A draft never decreased stock, so cancelling it restores nothing.
        (Draft, Cancelled) => StockEffect::None,
        _ => unreachable!("can_transition already filtered illegal moves"),
    })
}

/// The stock effect of creating an invoice directly in `status`.
pub fn creation_stock_effect(status: InvoiceStatus) -> StockEffect {
    match status {
        InvoiceStatus::Draft => StockEffect::None,
        InvoiceStatus::Issued | InvoiceStatus::Paid => StockEffect::Decrease,
        // Creating an invoice as Cancelled is rejected upstream; if it ever
        // got here, it never decreased stock.
        InvoiceStatus::Cancelled => StockEffect::None,
    }
}

/// The stock effect of deleting an invoice in `status`.
///
/// Only invoices that actually decreased stock get it back. A Cancelled
/// invoice already restored its quantities on cancellation.
pub fn deletion_stock_effect(status: InvoiceStatus) -> StockEffect {
    match status {
        InvoiceStatus::Issued | InvoiceStatus::Paid => StockEffect::Increase,
        InvoiceStatus::Draft | InvoiceStatus::Cancelled => StockEffect::None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use InvoiceStatus::*;

    #[test]
    fn test_legal_transitions() {
        assert!(can_transition(Draft, Issued));
        assert!(can_transition(Draft, Paid));
        assert!(can_transition(Draft, Cancelled));
        assert!(can_transition(Issued, Paid));
        assert!(can_transition(Issued, Cancelled));
        assert!(can_transition(Paid, Cancelled));
    }

    #[test]
    fn test_illegal_transitions() {
        // Cancelled is terminal.
        assert!(!can_transition(Cancelled, Draft));
        assert!(!can_transition(Cancelled, Issued));
        assert!(!can_transition(Cancelled, Paid));
        // No going backwards.
        assert!(!can_transition(Paid, Issued));
        assert!(!can_transition(Issued, Draft));
        assert!(!can_transition(Paid, Draft));
        // No self loops.
        assert!(!can_transition(Draft, Draft));
        assert!(!can_transition(Issued, Issued));
    }

    #[test]
    fn test_transition_effects() {
        assert_eq!(
            transition_stock_effect(Draft, Issued).unwrap(),
            StockEffect::Decrease
        );
        assert_eq!(
            transition_stock_effect(Draft, Paid).unwrap(),
            StockEffect::Decrease
        );
        assert_eq!(
            transition_stock_effect(Issued, Paid).unwrap(),
            StockEffect::None
        );
        assert_eq!(
            transition_stock_effect(Issued, Cancelled).unwrap(),
            StockEffect::Increase
        );
        assert_eq!(
            transition_stock_effect(Paid, Cancelled).unwrap(),
            StockEffect::Increase
        );
        // Cancelling a draft restores nothing because nothing was taken.
        assert_eq!(
            transition_stock_effect(Draft, Cancelled).unwrap(),
            StockEffect::None
        );
    }

    #[test]
    fn test_illegal_transition_is_an_error() {
        let err = transition_stock_effect(Cancelled, Paid).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidTransition {
                from: Cancelled,
                to: Paid
            }
        ));
    }

    #[test]
    fn test_creation_effects() {
        assert_eq!(creation_stock_effect(Draft), StockEffect::None);
        assert_eq!(creation_stock_effect(Issued), StockEffect::Decrease);
        assert_eq!(creation_stock_effect(Paid), StockEffect::Decrease);
    }

    #[test]
    fn test_deletion_effects() {
        // Deleting a draft must NOT touch stock: it never decreased any.
        assert_eq!(deletion_stock_effect(Draft), StockEffect::None);
        assert_eq!(deletion_stock_effect(Cancelled), StockEffect::None);
        assert_eq!(deletion_stock_effect(Issued), StockEffect::Increase);
        assert_eq!(deletion_stock_effect(Paid), StockEffect::Increase);
    }
}
