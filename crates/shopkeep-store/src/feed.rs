//! # Change Feed
//!
//! Push notifications for committed changes.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  batch_commit ──► SQLite COMMIT ──► ChangeFeed::publish(events)         │
//! │                                          │                              │
//! │                           broadcast::channel (bounded)                  │
//! │                    ┌─────────────────────┼────────────────────┐         │
//! │                    ▼                     ▼                    ▼         │
//! │             Subscription          Subscription          Subscription    │
//! │            (sales, all)       (products, id = p-1)     (bills, unpaid)  │
//! │             .recv()              .into_stream()          .watch(cb)     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are published only after the batch commits, so subscribers never
//! observe a partially applied batch. A subscriber that falls more than the
//! channel capacity behind gets [`StoreError::SubscriptionLagged`] and must
//! resynchronise from a fresh query.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::record::{ChangeEvent, Collection, Filter};

/// Default number of buffered events per subscriber.
pub const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Fan-out of committed changes.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        ChangeFeed { tx }
    }

    /// Publishes committed events in commit order.
    pub fn publish(&self, events: Vec<ChangeEvent>) {
        for event in events {
            // No receivers is fine: nobody is watching.
            let _ = self.tx.send(event);
        }
    }

    pub fn subscribe(&self, collection: Collection, filter: Filter) -> Subscription {
        debug!(%collection, "New change feed subscription");
        Subscription {
            collection,
            filter,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new(DEFAULT_FEED_CAPACITY)
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Changes to one collection that match a filter.
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    filter: Filter,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Waits for the next matching change.
    ///
    /// ## Errors
    /// - `SubscriptionLagged`: events were dropped; resync, then keep calling
    /// - `SubscriptionClosed`: the store is gone
    pub async fn recv(&mut self) -> StoreResult<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.matches(self.collection, &self.filter) => return Ok(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    return Err(StoreError::SubscriptionLagged { skipped })
                }
                Err(broadcast::error::RecvError::Closed) => return Err(StoreError::SubscriptionClosed),
            }
        }
    }

    /// Converts the subscription into a `Stream`. The stream ends when the
    /// store is dropped.
    pub fn into_stream(self) -> impl Stream<Item = StoreResult<ChangeEvent>> + Send + 'static {
        let Subscription {
            collection,
            filter,
            rx,
        } = self;

        BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(event) if event.matches(collection, &filter) => Some(Ok(event)),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                Some(Err(StoreError::SubscriptionLagged { skipped }))
            }
        })
    }

    /// Delivers every matching change to `callback` on a background task
    /// until the returned handle is unsubscribed or dropped.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let handle = store
    ///     .subscribe(Collection::Sales, Filter::all())
    ///     .watch(|change| println!("{change:?}"));
    /// // ...
    /// handle.unsubscribe();
    /// ```
    pub fn watch<F>(mut self, mut callback: F) -> SubscriptionHandle
    where
        F: FnMut(StoreResult<ChangeEvent>) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match self.recv().await {
                    Err(StoreError::SubscriptionClosed) => break,
                    delivery => callback(delivery),
                }
            }
        });
        SubscriptionHandle { task }
    }
}

/// Stops a [`Subscription::watch`] task when unsubscribed or dropped.
#[derive(Debug)]
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ChangeKind, Record};
    use chrono::Utc;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn event(collection: Collection, id: &str, data: serde_json::Value) -> ChangeEvent {
        let now = Utc::now();
        ChangeEvent {
            kind: ChangeKind::Created,
            record: Record {
                collection,
                id: id.to_string(),
                version: 1,
                data,
                created_at: now,
                updated_at: now,
            },
        }
    }

    #[tokio::test]
    async fn test_recv_filters_by_collection_and_field() {
        let feed = ChangeFeed::new(16);
        let mut sub = feed.subscribe(
            Collection::StockUpdates,
            Filter::all().eq("product_id", json!("p-1")),
        );

        feed.publish(vec![
            event(Collection::Sales, "s-1", json!({"product_id": "p-1"})),
            event(Collection::StockUpdates, "su-1", json!({"product_id": "p-2"})),
            event(Collection::StockUpdates, "su-2", json!({"product_id": "p-1"})),
        ]);

        let got = sub.recv().await.unwrap();
        assert_eq!(got.record.id, "su-2");
    }

    #[tokio::test]
    async fn test_lagged_subscriber_is_told() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(Collection::Sales, Filter::all());

        feed.publish(
            (0..5)
                .map(|i| event(Collection::Sales, &format!("s-{i}"), json!({})))
                .collect(),
        );

        assert!(matches!(
            sub.recv().await,
            Err(StoreError::SubscriptionLagged { skipped: 3 })
        ));
        assert_eq!(sub.recv().await.unwrap().record.id, "s-3");
    }

    #[tokio::test]
    async fn test_stream_ends_when_feed_dropped() {
        let feed = ChangeFeed::new(8);
        let stream = feed.subscribe(Collection::Bills, Filter::all()).into_stream();
        feed.publish(vec![event(Collection::Bills, "b-1", json!({}))]);
        drop(feed);

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
    }

    #[tokio::test]
    async fn test_watch_stops_after_unsubscribe() {
        let feed = ChangeFeed::new(8);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = feed
            .subscribe(Collection::Customers, Filter::all())
            .watch(move |change| {
                if let Ok(change) = change {
                    sink.lock().unwrap().push(change.record.id);
                }
            });

        feed.publish(vec![event(Collection::Customers, "c-1", json!({}))]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_active());
        handle.unsubscribe();
        tokio::time::sleep(Duration::from_millis(10)).await;

        feed.publish(vec![event(Collection::Customers, "c-2", json!({}))]);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(*seen.lock().unwrap(), vec!["c-1".to_string()]);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
