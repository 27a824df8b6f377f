//! # SQLite Record Store
//!
//! Connection pool, configuration, and the SQLite implementation of
//! [`RecordStore`].
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SqliteStore                                        │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure pool settings                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqliteStore::new(config).await ← Create pool + run migrations         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │            SqlitePool                    │  readers in parallel      │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐       │                           │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...   │                           │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘       │                           │
//! │  └─────────────────────────────────────────┘                           │
//! │       │                                                                 │
//! │  batch_commit ──► writer lock ──► BEGIN … check versions … COMMIT      │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │                                          ChangeFeed::publish            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Path
//! SQLite allows a single writer. Batches take an in-process writer lock
//! before opening their transaction, so every precondition is checked
//! against the latest committed state and a failed check rolls the whole
//! batch back.
//!
//! ## WAL Mode
//! Readers don't block the writer and the writer doesn't block readers.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::feed::{ChangeFeed, Subscription, DEFAULT_FEED_CAPACITY};
use crate::migrations;
use crate::record::{
    merge_patch, strip_managed, ChangeEvent, ChangeKind, Collection, Filter, Record, WriteOp,
};
use crate::store::RecordStore;

const IN_MEMORY: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Where the records live and how many connections read them.
///
/// ```rust,ignore
/// let config = DbConfig::new("shopkeep.db").max_connections(8).feed_capacity(2048);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Readers share the pool; writes are serialized regardless. Default: 5
    pub max_connections: u32,

    /// Connections kept open while idle. Default: 1
    pub min_connections: u32,

    /// How long an operation waits for a free connection. Default: 30s
    pub connect_timeout: Duration,

    /// Idle connections above the minimum close after this. Default: 10min
    pub idle_timeout: Duration,

    /// Apply embedded migrations when the store opens. Default: true
    pub run_migrations: bool,

    /// Buffered change events per subscriber.
    pub feed_capacity: usize,
}

impl DbConfig {
    /// A file-backed store. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }

    /// A private database that disappears with the store. Used by tests.
    ///
    /// Limited to one connection: every `:memory:` connection would
    /// otherwise open its own empty database.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            run_migrations: true,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

// =============================================================================
// SqliteStore
// =============================================================================

/// SQLite-backed Record Store.
///
/// Cheap to clone; clones share the pool, writer lock and change feed.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    writer: std::sync::Arc<Mutex<()>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Opens (or creates) the database, in WAL mode with NORMAL sync, and
    /// brings the schema up to date unless `run_migrations` is off.
    pub async fn new(config: DbConfig) -> StoreResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Initializing record store"
        );

        let connect_options = if config.is_in_memory() {
            // In-memory databases have no journal file to put in WAL mode
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
        } else {
            let connect_url = format!("sqlite://{}?mode=rwc", config.database_path.display());
            SqliteConnectOptions::from_str(&connect_url)
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
                .create_if_missing(true)
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout);

        if config.is_in_memory() {
            // Closing the only connection would drop the whole database
            pool_options = pool_options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        } else {
            pool_options = pool_options.idle_timeout(Some(config.idle_timeout));
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Record store pool created"
        );

        let store = SqliteStore {
            pool,
            writer: std::sync::Arc::new(Mutex::new(())),
            feed: ChangeFeed::new(config.feed_capacity),
        };

        if config.run_migrations {
            store.run_migrations().await?;
        }

        Ok(store)
    }

    /// Runs database migrations. Idempotent.
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running database migrations");
        migrations::run_migrations(&self.pool).await?;
        info!("Migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change feed subscribers attach to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// True when the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // -------------------------------------------------------------------------
    // Batch helpers (run inside the writer transaction)
    // -------------------------------------------------------------------------

    async fn apply(
        tx: &mut Transaction<'_, Sqlite>,
        op: WriteOp,
        now: DateTime<Utc>,
    ) -> StoreResult<ChangeEvent> {
        let now_ms = now.timestamp_millis();

        match op {
            WriteOp::Create {
                collection,
                id,
                mut data,
            } => {
                let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
                ensure_object(collection, &id, &data)?;
                strip_managed(&mut data);

                if fetch_in_tx(tx, collection, &id).await?.is_some() {
                    return Err(StoreError::Duplicate {
                        collection: collection.to_string(),
                        id,
                    });
                }

                insert(tx, collection, &id, 1, &data, now_ms, now_ms).await?;

                Ok(ChangeEvent {
                    kind: ChangeKind::Created,
                    record: Record {
                        collection,
                        id,
                        version: 1,
                        data,
                        created_at: now,
                        updated_at: now,
                    },
                })
            }

            WriteOp::Update {
                collection,
                id,
                mut patch,
                precondition,
            } => {
                ensure_object(collection, &id, &patch)?;
                strip_managed(&mut patch);

                let current = fetch_in_tx(tx, collection, &id).await?;
                precondition.check(collection, &id, current.as_ref().map(|r| r.version))?;
                let mut record =
                    current.ok_or_else(|| StoreError::not_found(collection.as_str(), id.as_str()))?;

                merge_patch(&mut record.data, &patch);
                record.version += 1;
                record.updated_at = now;
                replace(tx, &record, now_ms).await?;

                Ok(ChangeEvent {
                    kind: ChangeKind::Updated,
                    record,
                })
            }

            WriteOp::Put {
                collection,
                id,
                mut data,
                precondition,
            } => {
                ensure_object(collection, &id, &data)?;
                strip_managed(&mut data);

                let current = fetch_in_tx(tx, collection, &id).await?;
                precondition.check(collection, &id, current.as_ref().map(|r| r.version))?;

                match current {
                    Some(mut record) => {
                        record.data = data;
                        record.version += 1;
                        record.updated_at = now;
                        replace(tx, &record, now_ms).await?;
                        Ok(ChangeEvent {
                            kind: ChangeKind::Updated,
                            record,
                        })
                    }
                    None => {
                        insert(tx, collection, &id, 1, &data, now_ms, now_ms).await?;
                        Ok(ChangeEvent {
                            kind: ChangeKind::Created,
                            record: Record {
                                collection,
                                id,
                                version: 1,
                                data,
                                created_at: now,
                                updated_at: now,
                            },
                        })
                    }
                }
            }

            WriteOp::Delete {
                collection,
                id,
                precondition,
            } => {
                let current = fetch_in_tx(tx, collection, &id).await?;
                precondition.check(collection, &id, current.as_ref().map(|r| r.version))?;
                let record =
                    current.ok_or_else(|| StoreError::not_found(collection.as_str(), id.as_str()))?;

                sqlx::query("DELETE FROM records WHERE collection = ?1 AND id = ?2")
                    .bind(collection.as_str())
                    .bind(&id)
                    .execute(&mut **tx)
                    .await?;

                Ok(ChangeEvent {
                    kind: ChangeKind::Deleted,
                    record,
                })
            }
        }
    }
}

// =============================================================================
// RecordStore implementation
// =============================================================================

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Record>> {
        let row = sqlx::query(SELECT_ONE)
            .bind(collection.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| record_from_row(collection, &row)).transpose()
    }

    async fn query(&self, collection: Collection, filter: &Filter) -> StoreResult<Vec<Record>> {
        let rows = sqlx::query(
            r#"
            SELECT id, version, data, created_at_ms, updated_at_ms
            FROM records
            WHERE collection = ?1
              AND (?2 IS NULL OR created_at_ms >= ?2)
              AND (?3 IS NULL OR created_at_ms < ?3)
            ORDER BY seq
            "#,
        )
        .bind(collection.as_str())
        .bind(filter.created_from.map(|t| t.timestamp_millis()))
        .bind(filter.created_before.map(|t| t.timestamp_millis()))
        .fetch_all(&self.pool)
        .await?;

        // Field equality is evaluated on the decoded JSON.
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = record_from_row(collection, row)?;
            if filter.matches(&record) {
                records.push(record);
                if filter.limit.is_some_and(|limit| records.len() >= limit) {
                    break;
                }
            }
        }

        debug!(%collection, count = records.len(), "Query complete");
        Ok(records)
    }

    async fn batch_commit_at(&self, ops: Vec<WriteOp>, at: DateTime<Utc>) -> StoreResult<Vec<Record>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let op_count = ops.len();
        let now = millis_to_datetime(at.timestamp_millis())?;
        let _writer = self.writer.lock().await;

        let mut tx = self.pool.begin().await?;
        let mut events = Vec::with_capacity(op_count);

        for op in ops {
            // Any error drops `tx`, which rolls the batch back.
            events.push(Self::apply(&mut tx, op, now).await?);
        }

        tx.commit().await?;
        debug!(ops = op_count, "Batch committed");

        let records = events.iter().map(|e| e.record.clone()).collect();
        self.feed.publish(events);
        Ok(records)
    }

    fn now(&self) -> StoreResult<DateTime<Utc>> {
        server_now()
    }

    fn subscribe(&self, collection: Collection, filter: Filter) -> Subscription {
        self.feed.subscribe(collection, filter)
    }
}

// =============================================================================
// Row helpers
// =============================================================================

const SELECT_ONE: &str = r#"
    SELECT id, version, data, created_at_ms, updated_at_ms
    FROM records
    WHERE collection = ?1 AND id = ?2
"#;

/// Current time truncated to the stored millisecond precision.
fn server_now() -> StoreResult<DateTime<Utc>> {
    millis_to_datetime(Utc::now().timestamp_millis())
}

fn millis_to_datetime(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Internal(format!("timestamp out of range: {ms}")))
}

fn ensure_object(collection: Collection, id: &str, value: &Value) -> StoreResult<()> {
    if value.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidDocument {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: "expected a JSON object".to_string(),
        })
    }
}

fn record_from_row(collection: Collection, row: &SqliteRow) -> StoreResult<Record> {
    let data: String = row.try_get("data")?;
    Ok(Record {
        collection,
        id: row.try_get("id")?,
        version: row.try_get("version")?,
        data: serde_json::from_str(&data)?,
        created_at: millis_to_datetime(row.try_get("created_at_ms")?)?,
        updated_at: millis_to_datetime(row.try_get("updated_at_ms")?)?,
    })
}

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    collection: Collection,
    id: &str,
) -> StoreResult<Option<Record>> {
    let row = sqlx::query(SELECT_ONE)
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    row.map(|row| record_from_row(collection, &row)).transpose()
}

async fn insert(
    tx: &mut Transaction<'_, Sqlite>,
    collection: Collection,
    id: &str,
    version: i64,
    data: &Value,
    created_at_ms: i64,
    updated_at_ms: i64,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO records (collection, id, version, data, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(collection.as_str())
    .bind(id)
    .bind(version)
    .bind(serde_json::to_string(data)?)
    .bind(created_at_ms)
    .bind(updated_at_ms)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn replace(tx: &mut Transaction<'_, Sqlite>, record: &Record, updated_at_ms: i64) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE records
        SET version = ?3, data = ?4, updated_at_ms = ?5
        WHERE collection = ?1 AND id = ?2
        "#,
    )
    .bind(record.collection.as_str())
    .bind(&record.id)
    .bind(record.version)
    .bind(serde_json::to_string(&record.data)?)
    .bind(updated_at_ms)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> SqliteStore {
        SqliteStore::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        assert!(store().await.health_check().await);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/test.db")
            .max_connections(10)
            .min_connections(2)
            .feed_capacity(64);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.feed_capacity, 64);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let store = store().await;

        let created = store
            .create(Collection::Products, json!({"name": "Tea", "stock": 10}))
            .await
            .unwrap();
        assert_eq!(created.version, 1);

        let fetched = store.get_required(Collection::Products, &created.id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = store
            .update(Collection::Products, &created.id, json!({"stock": 8}))
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.data, json!({"name": "Tea", "stock": 8}));
        assert_eq!(updated.created_at, created.created_at);

        store.delete(Collection::Products, &created.id).await.unwrap();
        assert!(store.get(Collection::Products, &created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_batch_commit_at_stamps_given_instant() {
        let store = store().await;
        let at = DateTime::parse_from_rfc3339("2024-03-15T23:59:59.999456Z")
            .unwrap()
            .with_timezone(&Utc);

        let records = store
            .batch_commit_at(
                vec![
                    WriteOp::create(Collection::Sales, json!({"total": 100})),
                    WriteOp::create(Collection::StockUpdates, json!({"quantity_change": -1})),
                ],
                at,
            )
            .await
            .unwrap();

        let expected = DateTime::parse_from_rfc3339("2024-03-15T23:59:59.999Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(records.iter().all(|r| r.created_at == expected));
        let stored = store.get_required(Collection::Sales, &records[0].id).await.unwrap();
        assert_eq!(stored.created_at, expected);
    }

    #[tokio::test]
    async fn test_failed_precondition_rolls_back_batch() {
        let store = store().await;
        let product = store
            .create(Collection::Products, json!({"stock": 10}))
            .await
            .unwrap();

        let err = store
            .batch_commit(vec![
                WriteOp::create(Collection::Sales, json!({"total": 100})),
                WriteOp::update(Collection::Products, &product.id, json!({"stock": 9})).if_version(7),
            ])
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        assert_eq!(store.count(Collection::Sales, &Filter::all()).await.unwrap(), 0);
        let product = store.get_required(Collection::Products, &product.id).await.unwrap();
        assert_eq!(product.version, 1);
        assert_eq!(product.data, json!({"stock": 10}));
    }

    #[tokio::test]
    async fn test_put_if_missing() {
        let store = store().await;
        let first = store
            .batch_commit(vec![
                WriteOp::put(Collection::Counters, "receipts-240315", json!({"last": 1})).if_missing(),
            ])
            .await
            .unwrap();
        assert_eq!(first[0].version, 1);

        let err = store
            .batch_commit(vec![
                WriteOp::put(Collection::Counters, "receipts-240315", json!({"last": 1})).if_missing(),
            ])
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let second = store
            .batch_commit(vec![
                WriteOp::put(Collection::Counters, "receipts-240315", json!({"last": 2})).if_version(1),
            ])
            .await
            .unwrap();
        assert_eq!(second[0].version, 2);
        assert_eq!(second[0].data, json!({"last": 2}));
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let store = store().await;
        let op = WriteOp::create_with_id(Collection::Customers, "c-1", json!({"name": "Ada"}));
        store.batch_commit(vec![op.clone()]).await.unwrap();
        assert!(matches!(
            store.batch_commit(vec![op]).await,
            Err(StoreError::Duplicate { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_filters_and_order() {
        let store = store().await;
        for (i, product) in ["p-1", "p-2", "p-1"].iter().enumerate() {
            store
                .create(
                    Collection::StockUpdates,
                    json!({"product_id": product, "seq": i}),
                )
                .await
                .unwrap();
        }

        let rows = store
            .query(
                Collection::StockUpdates,
                &Filter::all().eq("product_id", json!("p-1")),
            )
            .await
            .unwrap();
        let seqs: Vec<i64> = rows.iter().map(|r| r.data["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![0, 2]);

        let limited = store
            .query(Collection::StockUpdates, &Filter::all().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = store().await;
        let mut sub = store.subscribe(Collection::Bills, Filter::all());

        let bill = store
            .create(Collection::Bills, json!({"vendor": "Power Co"}))
            .await
            .unwrap();

        let change = sub.recv().await.unwrap();
        assert_eq!(change.kind, ChangeKind::Created);
        assert_eq!(change.record.id, bill.id);
    }

    #[tokio::test]
    async fn test_managed_fields_are_not_persisted() {
        let store = store().await;
        let rec = store
            .create(Collection::Products, json!({"id": "ignored", "version": 99, "name": "Tea"}))
            .await
            .unwrap();
        assert_ne!(rec.id, "ignored");
        assert_eq!(rec.version, 1);
        assert_eq!(rec.data, json!({"name": "Tea"}));
    }
}
