//! # Live Read Models
//!
//! In-memory copies of a collection kept current from the change feed.
//!
//! ## Sync Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  start():  subscribe ──► query snapshot ──► spawn follower              │
//! │                                                                         │
//! │  follower: recv() ──► Created/Updated ──► matches filter? upsert : drop │
//! │                  └──► Deleted         ──► drop                          │
//! │                  └──► Lagged          ──► re-query snapshot             │
//! │                  └──► Closed          ──► stop                          │
//! │                                                                         │
//! │  readers:  snapshot() / get(id) / revisions()                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Subscribing before the snapshot query means a change committed in
//! between is applied twice at worst, never missed. Upserts are idempotent.
//!
//! Read models feed screens and lookups. Writes always re-read from the
//! store.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use shopkeep_store::{ChangeEvent, ChangeKind, Collection, Filter, RecordStore, StoreError, Subscription};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::SaleLedgerEngine;
use crate::error::LedgerResult;

type Entries<T> = Vec<(String, T)>;

/// A collection mirrored in memory.
///
/// Dropping it stops the follower task.
pub struct LiveCollection<T> {
    collection: Collection,
    entries: Arc<RwLock<Entries<T>>>,
    revisions: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl<T> LiveCollection<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Loads the documents matching `filter` and starts following changes.
    pub async fn start(
        store: Arc<dyn RecordStore>,
        collection: Collection,
        filter: Filter,
    ) -> LedgerResult<Self> {
        let subscription = store.subscribe(collection, Filter::all());
        let entries = Arc::new(RwLock::new(load(store.as_ref(), collection, &filter).await?));
        let (revision_tx, revisions) = watch::channel(0);

        let task = tokio::spawn(follow(
            store,
            collection,
            filter,
            subscription,
            entries.clone(),
            revision_tx,
        ));

        debug!(%collection, "Live collection started");
        Ok(LiveCollection {
            collection,
            entries,
            revisions,
            task,
        })
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Current documents in creation order.
    pub async fn snapshot(&self) -> Vec<T> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.entries
            .read()
            .await
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, value)| value.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Ticks once per applied change or resync.
    pub fn revisions(&self) -> watch::Receiver<u64> {
        self.revisions.clone()
    }

    pub fn is_following(&self) -> bool {
        !self.task.is_finished()
    }
}

impl<T> Drop for LiveCollection<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl<T> std::fmt::Debug for LiveCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCollection")
            .field("collection", &self.collection)
            .field("revision", &*self.revisions.borrow())
            .finish_non_exhaustive()
    }
}

impl SaleLedgerEngine {
    /// Live view over one collection of this engine's store.
    pub async fn live<T>(&self, collection: Collection, filter: Filter) -> LedgerResult<LiveCollection<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        LiveCollection::start(self.store().clone(), collection, filter).await
    }
}

// =============================================================================
// Follower
// =============================================================================

async fn load<T: DeserializeOwned>(
    store: &dyn RecordStore,
    collection: Collection,
    filter: &Filter,
) -> LedgerResult<Entries<T>> {
    let records = store.query(collection, filter).await?;
    records
        .iter()
        .map(|record| -> LedgerResult<(String, T)> { Ok((record.id.clone(), record.decode()?)) })
        .collect()
}

async fn follow<T>(
    store: Arc<dyn RecordStore>,
    collection: Collection,
    filter: Filter,
    mut subscription: Subscription,
    entries: Arc<RwLock<Entries<T>>>,
    revision: watch::Sender<u64>,
) where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    loop {
        match subscription.recv().await {
            Ok(event) => {
                apply(&mut *entries.write().await, &filter, event);
                revision.send_modify(|r| *r += 1);
            }
            Err(StoreError::SubscriptionLagged { skipped }) => {
                warn!(%collection, skipped, "Live collection lagged, resyncing");
                match load(store.as_ref(), collection, &filter).await {
                    Ok(fresh) => {
                        *entries.write().await = fresh;
                        revision.send_modify(|r| *r += 1);
                    }
                    Err(e) => warn!(%collection, error = %e, "Resync failed, keeping stale view"),
                }
            }
            Err(e) => {
                debug!(%collection, error = %e, "Live collection stopped");
                break;
            }
        }
    }
}

fn apply<T: DeserializeOwned>(entries: &mut Entries<T>, filter: &Filter, event: ChangeEvent) {
    let ChangeEvent { kind, record } = event;
    let position = entries.iter().position(|(id, _)| *id == record.id);

    if kind == ChangeKind::Deleted || !filter.matches(&record) {
        if let Some(index) = position {
            entries.remove(index);
        }
        return;
    }

    let value: T = match record.decode() {
        Ok(value) => value,
        Err(e) => {
            warn!(collection = %record.collection, id = %record.id, error = %e, "Skipping undecodable change");
            return;
        }
    };

    match position {
        Some(index) => entries[index].1 = value,
        None => entries.push((record.id, value)),
    }
}
