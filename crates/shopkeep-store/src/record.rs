//! # Records, Write Operations and Filters
//!
//! The vocabulary shared by every [`RecordStore`](crate::RecordStore)
//! implementation.
//!
//! ## Document Layout
//! ```text
//! ┌──────────────────────────── Record ────────────────────────────┐
//! │ collection: products          ◄── store-managed                │
//! │ id:         3f1c…             ◄── store-managed (or caller)    │
//! │ version:    4                 ◄── store-managed, +1 per write  │
//! │ created_at: 2024-03-15T…      ◄── store-managed (commit time)  │
//! │ updated_at: 2024-03-16T…      ◄── store-managed                │
//! │ data: { "name": "Tea", "price": 450, "stock": 31, … }          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Record::decode`] overlays the store-managed `id`, `version` and
//! `created_at` onto `data` before deserializing, so domain types can carry
//! those fields without the store persisting them twice.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Fields owned by the store; stripped from incoming document bodies.
pub const MANAGED_FIELDS: [&str; 3] = ["id", "version", "created_at"];

// =============================================================================
// Collection
// =============================================================================

/// Named collections of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Products,
    Sales,
    StockUpdates,
    Customers,
    Payments,
    Bills,
    /// Store-internal sequence documents (per-day receipt counters).
    Counters,
}

impl Collection {
    pub const ALL: [Collection; 7] = [
        Collection::Products,
        Collection::Sales,
        Collection::StockUpdates,
        Collection::Customers,
        Collection::Payments,
        Collection::Bills,
        Collection::Counters,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Collection::Products => "products",
            Collection::Sales => "sales",
            Collection::StockUpdates => "stock_updates",
            Collection::Customers => "customers",
            Collection::Payments => "payments",
            Collection::Bills => "bills",
            Collection::Counters => "counters",
        }
    }

    pub fn parse(name: &str) -> Option<Collection> {
        Collection::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Record
// =============================================================================

/// A stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub collection: Collection,
    pub id: String,
    pub version: i64,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record {
    /// Deserializes the document into a domain type, overlaying the
    /// store-managed `id`, `version` and `created_at`.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut body = match &self.data {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(StoreError::InvalidDocument {
                    collection: self.collection.to_string(),
                    id: self.id.clone(),
                    reason: "document body is not an object".to_string(),
                })
            }
        };
        body.insert("id".to_string(), Value::String(self.id.clone()));
        body.insert("version".to_string(), Value::from(self.version));
        body.insert("created_at".to_string(), serde_json::to_value(self.created_at)?);

        Ok(serde_json::from_value(Value::Object(body))?)
    }

    /// Top-level or dotted-path field lookup (`"target.sale_id"`).
    /// `"id"` resolves to the record id.
    pub fn field(&self, path: &str) -> Option<&Value> {
        if path == "id" {
            return None;
        }
        path.split('.')
            .try_fold(&self.data, |value, key| value.as_object()?.get(key))
    }
}

/// Decodes a batch of records.
pub fn decode_all<T: DeserializeOwned>(records: &[Record]) -> StoreResult<Vec<T>> {
    records.iter().map(Record::decode).collect()
}

/// Serializes a domain value into a document body, dropping store-managed
/// fields.
pub fn to_document<T: Serialize>(value: &T) -> StoreResult<Value> {
    let mut value = serde_json::to_value(value)?;
    strip_managed(&mut value);
    Ok(value)
}

pub(crate) fn strip_managed(value: &mut Value) {
    if let Value::Object(map) = value {
        for key in MANAGED_FIELDS {
            map.remove(key);
        }
    }
}

/// JSON merge patch: `null` removes a key, nested objects merge, anything
/// else replaces.
pub(crate) fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_map) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target_map) = target {
        for (key, value) in patch_map {
            if value.is_null() {
                target_map.remove(key);
            } else if value.is_object() {
                merge_patch(target_map.entry(key.clone()).or_insert(Value::Null), value);
            } else {
                target_map.insert(key.clone(), value.clone());
            }
        }
    }
}

// =============================================================================
// Write Operations
// =============================================================================

/// Condition a write places on the document's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional.
    Any,
    /// The document must not exist yet.
    Missing,
    /// The document must exist at exactly this version.
    Version(i64),
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new document. Fails with `Duplicate` if the id exists.
    Create {
        collection: Collection,
        /// Generated (UUID v4) when `None`.
        id: Option<String>,
        data: Value,
    },
    /// Merge-patch an existing document.
    Update {
        collection: Collection,
        id: String,
        patch: Value,
        precondition: Precondition,
    },
    /// Create or fully replace a document.
    Put {
        collection: Collection,
        id: String,
        data: Value,
        precondition: Precondition,
    },
    Delete {
        collection: Collection,
        id: String,
        precondition: Precondition,
    },
}

impl WriteOp {
    pub fn create(collection: Collection, data: Value) -> Self {
        WriteOp::Create {
            collection,
            id: None,
            data,
        }
    }

    pub fn create_with_id(collection: Collection, id: impl Into<String>, data: Value) -> Self {
        WriteOp::Create {
            collection,
            id: Some(id.into()),
            data,
        }
    }

    pub fn update(collection: Collection, id: impl Into<String>, patch: Value) -> Self {
        WriteOp::Update {
            collection,
            id: id.into(),
            patch,
            precondition: Precondition::Any,
        }
    }

    pub fn put(collection: Collection, id: impl Into<String>, data: Value) -> Self {
        WriteOp::Put {
            collection,
            id: id.into(),
            data,
            precondition: Precondition::Any,
        }
    }

    pub fn delete(collection: Collection, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection,
            id: id.into(),
            precondition: Precondition::Any,
        }
    }

    /// Makes the write conditional on `version` (compare-and-swap).
    pub fn if_version(self, version: i64) -> Self {
        self.with_precondition(Precondition::Version(version))
    }

    /// Makes the write conditional on the document not existing.
    pub fn if_missing(self) -> Self {
        self.with_precondition(Precondition::Missing)
    }

    fn with_precondition(self, new: Precondition) -> Self {
        match self {
            WriteOp::Update {
                collection,
                id,
                patch,
                ..
            } => WriteOp::Update {
                collection,
                id,
                patch,
                precondition: new,
            },
            WriteOp::Put {
                collection, id, data, ..
            } => WriteOp::Put {
                collection,
                id,
                data,
                precondition: new,
            },
            WriteOp::Delete { collection, id, .. } => WriteOp::Delete {
                collection,
                id,
                precondition: new,
            },
            create @ WriteOp::Create { .. } => create,
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::Create { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Put { collection, .. }
            | WriteOp::Delete { collection, .. } => *collection,
        }
    }
}

impl Precondition {
    /// Checks the condition against the current version (`None` = absent).
    pub fn check(&self, collection: Collection, id: &str, actual: Option<i64>) -> StoreResult<()> {
        let ok = match (self, actual) {
            (Precondition::Any, _) => true,
            (Precondition::Missing, None) => true,
            (Precondition::Missing, Some(_)) => false,
            (Precondition::Version(expected), Some(found)) => *expected == found,
            (Precondition::Version(_), None) => false,
        };
        if ok {
            return Ok(());
        }
        let expected = match self {
            Precondition::Version(v) => Some(*v),
            _ => None,
        };
        Err(StoreError::conflict(collection.as_str(), id, expected, actual))
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Query filter: field equality plus a creation-time window.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use shopkeep_store::Filter;
///
/// let filter = Filter::all()
///     .eq("product_id", json!("p-1"))
///     .limit(50);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub equals: Vec<(String, Value)>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl Filter {
    /// Matches every record.
    pub fn all() -> Self {
        Filter::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.equals.push((field.into(), value));
        self
    }

    /// Restricts to records created in `[from, before)`.
    pub fn created_between(mut self, from: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self.created_before = Some(before);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let Some(from) = self.created_from {
            if record.created_at < from {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if record.created_at >= before {
                return false;
            }
        }
        self.equals.iter().all(|(field, expected)| {
            if field == "id" {
                return expected.as_str() == Some(record.id.as_str());
            }
            record.field(field) == Some(expected)
        })
    }
}

// =============================================================================
// Change Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

/// A committed change, published after its batch commits.
///
/// For deletes, `record` is the last state before deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: Record,
}

impl ChangeEvent {
    pub fn matches(&self, collection: Collection, filter: &Filter) -> bool {
        self.record.collection == collection && filter.matches(&self.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(data: Value) -> Record {
        let now = Utc::now();
        Record {
            collection: Collection::Payments,
            id: "pay-1".to_string(),
            version: 2,
            data,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_merge_patch() {
        let mut doc = json!({"name": "Tea", "stock": 10, "meta": {"a": 1, "b": 2}});
        merge_patch(&mut doc, &json!({"stock": 8, "meta": {"b": null, "c": 3}}));
        assert_eq!(doc, json!({"name": "Tea", "stock": 8, "meta": {"a": 1, "c": 3}}));
    }

    #[test]
    fn test_filter_dotted_path() {
        let rec = record(json!({"target": {"type": "customer", "sale_id": "s-1"}, "amount": 500}));
        assert!(Filter::all().eq("target.sale_id", json!("s-1")).matches(&rec));
        assert!(!Filter::all().eq("target.sale_id", json!("s-2")).matches(&rec));
        assert!(Filter::all().eq("id", json!("pay-1")).matches(&rec));
    }

    #[test]
    fn test_decode_overlays_managed_fields() {
        #[derive(Deserialize)]
        struct Doc {
            id: String,
            version: i64,
            amount: i64,
            created_at: DateTime<Utc>,
        }

        let rec = record(json!({"amount": 500, "id": "stale"}));
        let doc: Doc = rec.decode().unwrap();
        assert_eq!(doc.id, "pay-1");
        assert_eq!(doc.version, 2);
        assert_eq!(doc.amount, 500);
        assert_eq!(doc.created_at, rec.created_at);
    }

    #[test]
    fn test_to_document_strips_managed_fields() {
        let doc = to_document(&json!({"id": "x", "version": 9, "created_at": "t", "name": "Tea"})).unwrap();
        assert_eq!(doc, json!({"name": "Tea"}));
    }

    #[test]
    fn test_precondition_check() {
        let c = Collection::Products;
        assert!(Precondition::Any.check(c, "p", None).is_ok());
        assert!(Precondition::Missing.check(c, "p", None).is_ok());
        assert!(Precondition::Missing.check(c, "p", Some(1)).is_err());
        assert!(Precondition::Version(3).check(c, "p", Some(3)).is_ok());
        assert!(Precondition::Version(3).check(c, "p", Some(4)).unwrap_err().is_conflict());
        assert!(Precondition::Version(3).check(c, "p", None).is_err());
    }

    #[test]
    fn test_collection_names() {
        for c in Collection::ALL {
            assert_eq!(Collection::parse(c.as_str()), Some(c));
        }
        assert_eq!(Collection::StockUpdates.to_string(), "stock_updates");
    }
}
