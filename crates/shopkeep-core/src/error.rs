//! # Error Types
//!
//! Domain-specific error types for shopkeep-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  shopkeep-core errors (this file)                                      │
//! │  ├── CoreError        - Domain rule failures                           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  shopkeep-store errors (separate crate)                                │
//! │  └── StoreError       - Record Store failures, version conflicts       │
//! │                                                                         │
//! │  shopkeep-ledger errors (separate crate)                               │
//! │  └── LedgerError      - What callers of the ledger see                 │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← StoreError          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale needs at least one line.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// A stock audit entry violates `previous + change == new`.
    #[error("Stock update {update_id} is inconsistent: {previous} + {change} != {new}")]
    InconsistentStockUpdate {
        update_id: String,
        previous: i64,
        change: i64,
        new: i64,
    },

    /// Two consecutive stock audit entries do not chain.
    ///
    /// ## When This Occurs
    /// A stock change was written without its audit row, or an audit row
    /// was written without its stock change.
    /// ```text
    ///  update A: 10 ──► 8
    ///  update B:  7 ──► 6      ◄── previous should have been 8
    /// ```
    #[error("Stock history broken at {update_id}: expected previous stock {expected}, found {found}")]
    BrokenStockChain {
        update_id: String,
        expected: i64,
        found: i64,
    },

    /// Replaying the audit trail does not land on the product's stock.
    #[error("Stock history for {product_id} replays to {replayed}, product has {current}")]
    StockMismatch {
        product_id: String,
        replayed: i64,
        current: i64,
    },

    /// Date arithmetic left chrono's supported range.
    #[error("Date out of range when advancing from {from}")]
    DateOutOfRange { from: NaiveDate },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any read-modify-write starts, so a validation failure never
/// leaves partial state behind.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::BrokenStockChain {
            update_id: "su-2".to_string(),
            expected: 8,
            found: 7,
        };
        assert_eq!(
            err.to_string(),
            "Stock history broken at su-2: expected previous stock 8, found 7"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        assert_eq!(
            ValidationError::required("customer").to_string(),
            "customer is required"
        );
        assert_eq!(
            ValidationError::must_be_positive("amount").to_string(),
            "amount must be positive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
