//! # regal-core: Pure Business Logic for Regal POS
//!
//! This crate is the **heart** of Regal POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Regal POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     HTTP API (axum)                             │   │
//! │  │    /api/products  /api/invoices  /api/refunds  /api/stock      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ regal-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ lifecycle │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │  status   │  │   rules   │  │   │
//! │  │   │  Invoice  │  │  TaxCalc  │  │  machine  │  │   checks  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    regal-db (Database Layer)                    │   │
//! │  │        SQLite queries, migrations, the stock coordinator        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Invoice, StockEntry, Refund, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`lifecycle`] - Invoice status machine and its stock side effects
//! - [`validation`] - Business rule validation
//! - [`access`] - Role model and the authorization predicate
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod access;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use regal_core::Money` instead of
// `use regal_core::money::Money`

pub use access::{authorize, Role};
pub use error::{CoreError, ValidationError};
pub use lifecycle::StockEffect;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of line items on a single invoice.
pub const MAX_LINE_ITEMS: usize = 200;

/// Maximum quantity for a single line item or manual stock entry.
pub const MAX_ITEM_QUANTITY: i64 = 100_000;
