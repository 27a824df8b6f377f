//! # shopkeep-store: Record Store for Shopkeep
//!
//! A document store with atomic conditional batches and a change feed,
//! backed by SQLite.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Data Flow                               │
//! │                                                                         │
//! │  shopkeep-ledger (record_sale, apply_*_payment, …)                     │
//! │       │  one batch_commit per business operation                       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 shopkeep-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  RecordStore  │    │  SqliteStore  │    │  Migrations  │  │   │
//! │  │   │   (trait)     │◄───│   (pool.rs)   │    │  (embedded)  │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ after COMMIT                  │   │
//! │  │                        ┌───────▼───────┐                       │   │
//! │  │                        │  ChangeFeed   │──► Subscriptions      │   │
//! │  │                        └───────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: one `records` table keyed by (collection, id)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - The `RecordStore` trait
//! - [`record`] - Records, write ops, preconditions, filters, change events
//! - [`feed`] - Change feed and subscriptions
//! - [`pool`] - SQLite implementation and pool configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use serde_json::json;
//! use shopkeep_store::{Collection, DbConfig, RecordStore, SqliteStore, WriteOp};
//!
//! let store = SqliteStore::new(DbConfig::new("shopkeep.db")).await?;
//! let product = store.create(Collection::Products, json!({"name": "Tea", "stock": 10})).await?;
//!
//! // Conditional write: only applies if nobody changed the product meanwhile
//! store.batch_commit(vec![
//!     WriteOp::update(Collection::Products, &product.id, json!({"stock": 9}))
//!         .if_version(product.version),
//! ]).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod feed;
pub mod migrations;
pub mod pool;
pub mod record;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use feed::{ChangeFeed, Subscription, SubscriptionHandle};
pub use pool::{DbConfig, SqliteStore};
pub use record::{
    decode_all, to_document, ChangeEvent, ChangeKind, Collection, Filter, Precondition, Record,
    WriteOp,
};
pub use store::RecordStore;
