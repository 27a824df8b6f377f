//! # shopkeep-ledger: Sale Ledger Engine for Shopkeep
//!
//! Coordinates every multi-document write of the shop: sales, payments,
//! bills and stock movements. Each operation reads what it needs, builds
//! one batch and commits it atomically against the versions it read.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Dashboard / seed binary                                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ shopkeep-ledger (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   engine ──► record_sale         payments ──► apply_*_payment   │   │
//! │  │   inventory ──► supply/returns   catalog ──► create / lookups   │   │
//! │  │   dashboard ──► reports          live ──► in-memory read models │   │
//! │  │   mutator ──► batch builders     assistant ──► text generation  │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │ pure computation             │ batch_commit          │
//! │                 ▼                              ▼                        │
//! │          shopkeep-core                  shopkeep-store                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopkeep_core::{Actor, PaymentMethod, SaleItem};
//! use shopkeep_ledger::{LedgerConfig, SaleLedgerEngine, SaleRequest};
//!
//! let engine = SaleLedgerEngine::open(LedgerConfig::load(None)?).await?;
//! let tea = engine.product(&tea_id).await?;
//!
//! let sale = engine
//!     .record_sale(
//!         SaleRequest::paid(vec![SaleItem::from_product(&tea, 2)], PaymentMethod::Cash),
//!         &Actor::new("u-1", "Ayesha"),
//!     )
//!     .await?;
//! println!("{} {}", sale.receipt_number, sale.total);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod assistant;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod live;
pub mod mutator;
pub mod payments;

// =============================================================================
// Re-exports
// =============================================================================

pub use assistant::{
    generate_structured, ChatRole, ChatTurn, Conversation, GenerationRequest, TextGenerator,
};
pub use catalog::{NewBill, NewCustomer, NewProduct};
pub use config::{LedgerConfig, StockPolicy};
pub use dashboard::DailyOverview;
pub use engine::{SaleLedgerEngine, SaleRequest};
pub use error::{LedgerError, LedgerResult};
pub use live::LiveCollection;
pub use payments::{BillPayment, InvoicePayment};
