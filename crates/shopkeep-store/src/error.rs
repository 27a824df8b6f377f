//! # Store Error Types
//!
//! Error types for Record Store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)      serde_json::Error                     │
//! │       │                                │                                │
//! │       ▼                                ▼                                │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  LedgerError::Persistence / retry on Conflict                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Record Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document not found.
    #[error("{collection} not found: {id}")]
    NotFound { collection: String, id: String },

    /// A create targeted an id that already exists.
    #[error("{collection} '{id}' already exists")]
    Duplicate { collection: String, id: String },

    /// A conditional write saw a different version than the caller read.
    ///
    /// ## When This Occurs
    /// Another writer committed between this caller's read and its batch.
    /// ```text
    /// A reads product v3 ─────────────────────► A writes "if v3" ✗ Conflict
    ///          B reads product v3 ──► B writes "if v3" ✓ (now v4)
    /// ```
    /// The whole batch is rejected; the caller re-reads and retries.
    #[error("Version conflict on {collection}/{id}: expected {expected:?}, found {actual:?}")]
    Conflict {
        collection: String,
        id: String,
        /// `None` means the caller expected the document to be absent.
        expected: Option<i64>,
        /// `None` means the document does not exist.
        actual: Option<i64>,
    },

    /// A patch or document body was not a JSON object.
    #[error("Invalid document for {collection}/{id}: {reason}")]
    InvalidDocument {
        collection: String,
        id: String,
        reason: String,
    },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Document (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A subscriber fell behind the change feed and missed events.
    ///
    /// The subscriber must resynchronise from a fresh query.
    #[error("Subscription lagged, {skipped} changes skipped")]
    SubscriptionLagged { skipped: u64 },

    /// The change feed was shut down.
    #[error("Subscription closed")]
    SubscriptionClosed,

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a given collection and ID.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn conflict(
        collection: impl Into<String>,
        id: impl Into<String>,
        expected: Option<i64>,
        actual: Option<i64>,
    ) -> Self {
        StoreError::Conflict {
            collection: collection.into(),
            id: id.into(),
            expected,
            actual,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    /// Transient failures worth retrying as-is.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::PoolExhausted | StoreError::ConnectionFailed(_)
        )
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Duplicate (UNIQUE) or QueryFailed
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed     → StoreError::ConnectionFailed
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();
                if msg.contains("UNIQUE constraint failed") {
                    StoreError::Duplicate {
                        collection: "records".to_string(),
                        id: msg
                            .split("UNIQUE constraint failed: ")
                            .nth(1)
                            .unwrap_or("unknown")
                            .to_string(),
                    }
                } else {
                    StoreError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("Pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message() {
        let err = StoreError::conflict("products", "p-1", Some(3), Some(4));
        assert_eq!(
            err.to_string(),
            "Version conflict on products/p-1: expected Some(3), found Some(4)"
        );
        assert!(err.is_conflict());
        assert!(err.is_transient());
    }

    #[test]
    fn test_not_found_is_not_transient() {
        let err = StoreError::not_found("sales", "s-1");
        assert_eq!(err.to_string(), "sales not found: s-1");
        assert!(!err.is_transient());
    }
}
