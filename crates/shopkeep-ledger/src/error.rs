//! # Ledger Error Types
//!
//! Error types for ledger operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Input         │  │  Business Rule  │  │     Concurrency         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  EmptyCart      │  │  Overpayment    │  │  ConcurrentModification │ │
//! │  │  MissingCustomer│  │  SaleAlreadyPaid│  │  (conflicts exhausted)  │ │
//! │  │  Validation     │  │  BillAlreadyPaid│  │                         │ │
//! │  │  NotFound       │  │  NotOnAccount   │  │                         │ │
//! │  │                 │  │  Insufficient-  │  │                         │ │
//! │  │                 │  │    Stock        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Persistence   │  │  Configuration  │  │     Collaborators       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  StoreError     │  │  InvalidConfig  │  │  Generation             │ │
//! │  │  StockAudit     │  │  ConfigLoad/Save│  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every error is raised before the batch commits or by the commit itself,
//! so a failed operation never leaves partial state behind.

use shopkeep_core::{CoreError, Money, ValidationError};
use shopkeep_store::StoreError;
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Cannot record a sale with an empty cart")]
    EmptyCart,

    #[error("Credit and invoice sales need a customer")]
    MissingCustomer,

    #[error("Invoice sales need an invoice number")]
    MissingInvoiceNumber,

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // =========================================================================
    // Business Rule Errors
    // =========================================================================
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        name: String,
        available: i64,
        requested: i64,
    },

    #[error("Payment of {amount} exceeds {outstanding} still owed on sale {sale_id}")]
    Overpayment {
        sale_id: String,
        amount: Money,
        outstanding: Money,
    },

    #[error("Sale {sale_id} is already paid")]
    SaleAlreadyPaid { sale_id: String },

    #[error("Sale {sale_id} was not sold on credit or invoice")]
    NotOnAccount { sale_id: String },

    #[error("Bill {bill_id} is already paid")]
    BillAlreadyPaid { bill_id: String },

    /// The stock audit trail does not replay cleanly.
    #[error("Stock audit failed: {0}")]
    StockAudit(CoreError),

    // =========================================================================
    // Persistence & Concurrency Errors
    // =========================================================================
    #[error("Persistence failed: {0}")]
    Persistence(StoreError),

    /// Every attempt lost a version race.
    ///
    /// ## When This Occurs
    /// ```text
    /// attempt 1 ──► Conflict ──► backoff ──► attempt 2 ──► Conflict ──► ...
    ///                                              attempt N ──► give up
    /// ```
    /// Nothing was applied; the caller may retry later.
    #[error("{operation} gave up after {attempts} conflicting attempts")]
    ConcurrentModification {
        operation: &'static str,
        attempts: u32,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Text generation failed: {0}")]
    Generation(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

/// Convert core errors, keeping the input errors first-class.
impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EmptyCart => LedgerError::EmptyCart,
            CoreError::CartTooLarge { max } => LedgerError::Validation(ValidationError::OutOfRange {
                field: "items".to_string(),
                min: 1,
                max: max as i64,
            }),
            CoreError::Validation(v) => LedgerError::Validation(v),
            CoreError::DateOutOfRange { from } => LedgerError::Validation(ValidationError::InvalidFormat {
                field: "due_date".to_string(),
                reason: format!("no next due date after {from}"),
            }),
            other => LedgerError::StockAudit(other),
        }
    }
}

/// Convert store errors.
///
/// ## Error Mapping
/// ```text
/// StoreError::NotFound  → LedgerError::NotFound
/// everything else       → LedgerError::Persistence
/// ```
impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => LedgerError::NotFound {
                entity: collection,
                id,
            },
            other => LedgerError::Persistence(other),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Persistence(StoreError::Serialization(err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True when the batch lost a version race and may be rebuilt.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Persistence(e) if e.is_conflict())
    }

    /// True when the same call may succeed later.
    ///
    /// Operations carry no idempotency key: retrying after a `Persistence`
    /// error whose commit actually landed records the operation twice.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Persistence(e) => e.is_transient(),
            LedgerError::ConcurrentModification { .. } => true,
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidConfig(_)
                | LedgerError::ConfigLoadFailed(_)
                | LedgerError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_becomes_ledger_not_found() {
        let err: LedgerError = StoreError::not_found("customers", "c-9").into();
        assert!(matches!(err, LedgerError::NotFound { ref entity, ref id } if entity == "customers" && id == "c-9"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err: LedgerError = StoreError::conflict("products", "p-1", Some(1), Some(2)).into();
        assert!(err.is_conflict());
        assert!(err.is_retryable());

        let exhausted = LedgerError::ConcurrentModification {
            operation: "record_sale",
            attempts: 5,
        };
        assert!(!exhausted.is_conflict());
        assert!(exhausted.is_retryable());
    }

    #[test]
    fn test_core_errors_map_to_input_errors() {
        assert!(matches!(LedgerError::from(CoreError::EmptyCart), LedgerError::EmptyCart));
        assert!(matches!(
            LedgerError::from(CoreError::Validation(ValidationError::required("name"))),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            LedgerError::from(CoreError::StockMismatch {
                product_id: "p-1".into(),
                replayed: 3,
                current: 4
            }),
            LedgerError::StockAudit(_)
        ));
    }

    #[test]
    fn test_overpayment_message() {
        let err = LedgerError::Overpayment {
            sale_id: "s-1".into(),
            amount: Money::from_cents(1500),
            outstanding: Money::from_cents(1000),
        };
        assert_eq!(
            err.to_string(),
            "Payment of $15.00 exceeds $10.00 still owed on sale s-1"
        );
    }

    #[test]
    fn test_config_errors() {
        assert!(LedgerError::InvalidConfig("x".into()).is_config_error());
        assert!(!LedgerError::EmptyCart.is_config_error());
    }
}
