//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Dashboard (TypeScript)                                       │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Ledger operation (Rust)                                      │
//! │  └── THIS MODULE: every rule checked before the first read             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Record Store                                                 │
//! │  └── Version conditions on every write                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shopkeep_core::validation::{validate_quantity, validate_adjustment};
//! use shopkeep_core::types::Adjustment;
//!
//! validate_quantity(5).unwrap();
//! assert!(validate_adjustment("discount", &Adjustment::percent_bps(12_000)).is_err());
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::{Money, FULL_BPS};
use crate::types::{Adjustment, SaleItem};
use crate::{MAX_AMOUNT_CENTS, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a display name (product, customer, vendor).
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most 200 characters
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required(field));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an invoice number and returns it trimmed.
pub fn validate_invoice_number(invoice_number: Option<&str>) -> ValidationResult<String> {
    let number = invoice_number.map(str::trim).unwrap_or_default();

    if number.is_empty() {
        return Err(ValidationError::required("invoice_number"));
    }

    if number.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "invoice_number".to_string(),
            max: 50,
        });
    }

    Ok(number.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the quantity of a stock movement (delivery, return).
///
/// Only positivity is checked; deliveries are not bound by the cart line
/// limit.
pub fn validate_movement_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    Ok(())
}

/// Validates a price or cost. Zero is allowed (free items), anything above
/// MAX_AMOUNT_CENTS is not.
///
/// ## Example
/// ```rust
/// use shopkeep_core::validation::validate_price;
/// use shopkeep_core::Money;
///
/// assert!(validate_price("price", Money::from_cents(1099)).is_ok());
/// assert!(validate_price("price", Money::zero()).is_ok());
/// assert!(validate_price("price", Money::from_cents(-100)).is_err());
/// assert!(validate_price("price", Money::from_cents(i64::MAX)).is_err());
/// ```
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || amount.cents() > MAX_AMOUNT_CENTS {
        return Err(amount_out_of_range(field));
    }

    Ok(())
}

/// Validates a payment amount. Must be strictly positive.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::must_be_positive("payment amount"));
    }

    validate_price("payment amount", amount)
}

fn amount_out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_AMOUNT_CENTS,
    }
}

/// Validates a discount or tax.
///
/// ## Rules
/// - Percentage: 0 to 10000 bps (0% to 100%)
/// - Fixed: 0 to MAX_AMOUNT_CENTS
pub fn validate_adjustment(field: &str, adjustment: &Adjustment) -> ValidationResult<()> {
    match *adjustment {
        Adjustment::Percentage { bps } if bps > FULL_BPS => Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: FULL_BPS as i64,
        }),
        Adjustment::Fixed { amount } => validate_price(field, amount),
        _ => Ok(()),
    }
}

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates one cart line.
pub fn validate_sale_item(item: &SaleItem) -> ValidationResult<()> {
    if item.product_id.trim().is_empty() {
        return Err(ValidationError::required("product_id"));
    }
    validate_quantity(item.quantity)?;
    validate_price("unit_price", item.unit_price)?;
    validate_price("unit_cost", item.unit_cost)?;
    if let Some(discount) = &item.discount {
        validate_adjustment("line discount", discount)?;
    }
    Ok(())
}

/// Validates the whole cart.
///
/// ## Rules
/// - At least one line
/// - At most MAX_CART_ITEMS lines
/// - Every line passes [`validate_sale_item`]
/// - Subtotal and cost sum without overflowing
pub fn validate_cart(items: &[SaleItem]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(CoreError::EmptyCart);
    }

    if items.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }

    for item in items {
        validate_sale_item(item)?;
    }

    let subtotal = checked_cart_sum(items, |item| item.unit_price);
    let cost = checked_cart_sum(items, |item| item.unit_cost);
    if subtotal.is_none() || cost.is_none() {
        return Err(ValidationError::OutOfRange {
            field: "subtotal".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    Ok(())
}

/// Σ qty × amount, `None` on overflow.
fn checked_cart_sum(items: &[SaleItem], amount_of: impl Fn(&SaleItem) -> Money) -> Option<Money> {
    items.iter().try_fold(Money::zero(), |sum, item| {
        amount_of(item)
            .checked_times(item.quantity)
            .and_then(|line| sum.checked_add(line))
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64) -> SaleItem {
        SaleItem {
            product_id: "p-1".to_string(),
            name: "Tea".to_string(),
            quantity: qty,
            unit_price: Money::from_cents(450),
            unit_cost: Money::from_cents(200),
            discount: None,
        }
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Green tea").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_movement_quantity_has_no_cart_cap() {
        assert!(validate_movement_quantity(1).is_ok());
        assert!(validate_movement_quantity(1200).is_ok());
        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_price_bounds() {
        assert!(validate_price("price", Money::from_cents(MAX_AMOUNT_CENTS)).is_ok());
        assert!(matches!(
            validate_price("price", Money::from_cents(i64::MAX / 2)),
            Err(ValidationError::OutOfRange { max: MAX_AMOUNT_CENTS, .. })
        ));
        assert!(validate_payment_amount(Money::from_cents(MAX_AMOUNT_CENTS + 1)).is_err());
    }

    #[test]
    fn test_validate_adjustment() {
        assert!(validate_adjustment("tax", &Adjustment::percent_bps(0)).is_ok());
        assert!(validate_adjustment("tax", &Adjustment::percent_bps(10_000)).is_ok());
        assert!(validate_adjustment("tax", &Adjustment::percent_bps(10_001)).is_err());
        assert!(validate_adjustment("discount", &Adjustment::fixed_cents(0)).is_ok());
        assert!(validate_adjustment("discount", &Adjustment::fixed_cents(-1)).is_err());
        assert!(validate_adjustment("tax", &Adjustment::fixed_cents(MAX_AMOUNT_CENTS + 1)).is_err());
    }

    #[test]
    fn test_validate_payment_amount() {
        assert!(validate_payment_amount(Money::from_cents(1)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_payment_amount(Money::from_cents(-500)).is_err());
    }

    #[test]
    fn test_validate_invoice_number() {
        assert_eq!(validate_invoice_number(Some(" INV-7 ")).unwrap(), "INV-7");
        assert!(validate_invoice_number(Some("  ")).is_err());
        assert!(validate_invoice_number(None).is_err());
    }

    #[test]
    fn test_validate_cart() {
        assert!(matches!(validate_cart(&[]), Err(CoreError::EmptyCart)));
        assert!(validate_cart(&[line(2)]).is_ok());
        assert!(matches!(
            validate_cart(&[line(0)]),
            Err(CoreError::Validation(ValidationError::MustBePositive { .. }))
        ));

        let discounted = line(1).with_discount(Adjustment::percent_bps(20_000));
        assert!(validate_cart(&[discounted]).is_err());

        let oversized = SaleItem {
            unit_price: Money::from_cents(i64::MAX / 2),
            ..line(3)
        };
        assert!(matches!(
            validate_cart(&[oversized]),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let too_many = vec![line(1); MAX_CART_ITEMS + 1];
        assert!(matches!(
            validate_cart(&too_many),
            Err(CoreError::CartTooLarge { .. })
        ));
    }
}
