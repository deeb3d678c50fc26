//! # regal-db: Database Layer for Regal POS
//!
//! This crate provides database access for the Regal POS system.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Regal POS Data Flow                              │
//! │                                                                         │
//! │  HTTP handler (POST /api/invoices)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     regal-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │ StockLedger  │  │   │
//! │  │   │   (pool.rs)   │    │ (invoice.rs,  │    │  (stock.rs)  │  │   │
//! │  │   │               │    │  product.rs,  │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  refund.rs)   │───►│ the ONLY     │  │   │
//! │  │   │ WAL mode      │    │               │    │ writer of    │  │   │
//! │  │   └───────────────┘    └───────────────┘    │ stock_level  │  │   │
//! │  │                                             └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (regal.db)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, invoice, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regal_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/regal.db")).await?;
//!
//! let product = db.products().get_by_sku("COKE-330").await?;
//! let qty = db
//!     .stock()
//!     .apply_delta(&StockMutation::new(&product.id, -3, StockEntryKind::Out))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::audit::AuditRepository;
pub use repository::customer::CustomerRepository;
pub use repository::invoice::{InvoiceRepository, InvoiceWithItems, NewInvoice};
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::refund::{NewRefund, RefundRepository, RefundWithItems};
pub use repository::stock::StockLedger;
pub use repository::user::{NewUser, UserRepository};
