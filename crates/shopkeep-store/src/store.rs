//! # Record Store Trait
//!
//! The persistence seam of Shopkeep. The ledger only talks to
//! `Arc<dyn RecordStore>`, so the SQLite implementation can be swapped for
//! another document store without touching business code.
//!
//! ## Operations
//! ```text
//! ┌────────────────┬──────────────────────────────────────────────────────┐
//! │ get            │ one document by (collection, id)                     │
//! │ query          │ documents matching a Filter, in creation order       │
//! │ batch_commit   │ all-or-nothing list of WriteOps, with preconditions  │
//! │ batch_commit_at│ same, stamped with an instant read from `now`        │
//! │ subscribe      │ push notifications of committed changes              │
//! │ create/update/ │ single-op conveniences over batch_commit             │
//! │ delete         │                                                      │
//! └────────────────┴──────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::feed::Subscription;
use crate::record::{Collection, Filter, Record, WriteOp};

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetches one document.
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Record>>;

    /// Documents matching `filter`, oldest first.
    async fn query(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Record>>;

    /// Applies every op or none of them, stamping each record with `at`.
    ///
    /// `at` should come from [`now`](Self::now). Returns the resulting
    /// records in op order (deleted records are returned as they were before
    /// deletion).
    async fn batch_commit_at(&self, ops: Vec<WriteOp>, at: DateTime<Utc>) -> StoreResult<Vec<Record>>;

    /// The store's clock, at the precision it keeps timestamps.
    fn now(&self) -> StoreResult<DateTime<Utc>>;

    /// Subscribes to committed changes in `collection` matching `filter`.
    fn subscribe(&self, collection: Collection, filter: Filter) -> Subscription;

    // -------------------------------------------------------------------------
    // Provided conveniences
    // -------------------------------------------------------------------------

    /// Applies every op or none of them.
    ///
    /// Server-assigned timestamps are identical for every record in the
    /// batch.
    async fn batch_commit(&self, ops: Vec<WriteOp>) -> StoreResult<Vec<Record>> {
        let at = self.now()?;
        self.batch_commit_at(ops, at).await
    }

    /// Fetches one document or fails with `NotFound`.
    async fn get_required(&self, collection: Collection, id: &str) -> StoreResult<Record> {
        self.get(collection, id)
            .await?
            .ok_or_else(|| StoreError::not_found(collection.as_str(), id))
    }

    /// Number of documents matching `filter`.
    async fn count(&self, collection: Collection, filter: &Filter) -> StoreResult<usize> {
        Ok(self.query(collection, filter).await?.len())
    }

    /// Creates a document with a generated id.
    async fn create(&self, collection: Collection, data: Value) -> StoreResult<Record> {
        single(self.batch_commit(vec![WriteOp::create(collection, data)]).await?)
    }

    /// Merge-patches a document unconditionally.
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<Record> {
        single(self.batch_commit(vec![WriteOp::update(collection, id, patch)]).await?)
    }

    /// Deletes a document.
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.batch_commit(vec![WriteOp::delete(collection, id)]).await?;
        Ok(())
    }
}

fn single(mut records: Vec<Record>) -> StoreResult<Record> {
    records
        .pop()
        .ok_or_else(|| StoreError::Internal("batch returned no record".to_string()))
}
