//! # shopkeep-core: Pure Business Logic for Shopkeep
//!
//! Everything the ledger needs to decide *what* to write, with zero I/O.
//! The store crate decides *how* it is written; the ledger crate ties the two
//! together.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Dashboard (TypeScript)                       │   │
//! │  │    Products ──► Cart ──► Receipt ──► Reports ──► Bills          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    shopkeep-ledger                              │   │
//! │  │    record_sale, apply_*_payment, receive_supply, live views     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ shopkeep-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   money   │  │  totals   │  │  receipt  │  │recurrence │  │   │
//! │  │   │   Money   │  │ discounts │  │ R-YYMMDD- │  │ next due  │  │   │
//! │  │   │   bps     │  │ tax,profit│  │   NNNN    │  │   date    │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │  reports  │  │validation │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              shopkeep-store (Record Store, SQLite)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer cents and basis-point rates
//! - [`types`] - Domain types (Product, Sale, Payment, Bill, etc.)
//! - [`totals`] - Sale total computation (discounts, tax, profit)
//! - [`receipt`] - Receipt number formatting and business-day resolution
//! - [`recurrence`] - Recurring bill due dates
//! - [`stock`] - Stock audit trail replay
//! - [`reports`] - Dashboard aggregations
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use shopkeep_core::money::Money;
//! use shopkeep_core::totals::compute_sale_totals;
//! use shopkeep_core::types::{Adjustment, SaleItem};
//!
//! let items = vec![SaleItem {
//!     product_id: "p-1".into(),
//!     name: "Coffee beans".into(),
//!     quantity: 2,
//!     unit_price: Money::from_cents(1000),
//!     unit_cost: Money::from_cents(600),
//!     discount: None,
//! }];
//!
//! let totals = compute_sale_totals(&items, None, Some(&Adjustment::percent_bps(1000)));
//! assert_eq!(totals.total.cents(), 2200);
//! assert_eq!(totals.profit.cents(), 800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod receipt;
pub mod recurrence;
pub mod reports;
pub mod stock;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use recurrence::{Recurrence, RecurrencePeriod};
pub use totals::{compute_sale_totals, SaleTotals};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest price, cost, fixed adjustment or payment accepted, in cents
/// ($1,000,000,000.00).
///
/// A full cart at this price stays far inside `i64`.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000;

/// Stock level at or below which a product counts as low stock when it has
/// no threshold of its own.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
