//! # Sale Totals
//!
//! Computes every money figure a sale carries, from the cart lines and the
//! optional order discount and tax.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. subtotal          = Σ qty × unit_price                              │
//! │  2. item discounts    = Σ line discount (fixed clamped to the line)     │
//! │  3. after items       = subtotal − item discounts                       │
//! │  4. pre-tax total     = after items − order discount (clamped)          │
//! │  5. tax               = fixed literal | pre-tax total × bps             │
//! │  6. total             = pre-tax total + tax                             │
//! │  7. total cost        = Σ qty × unit_cost   (never discounted)          │
//! │  8. profit            = pre-tax total − total cost   (tax excluded)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order is fixed. Discounts apply before tax; applying tax first
//! changes the amount the customer pays.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Adjustment, AppliedTax, SaleItem};

/// Every money figure of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub item_discount_total: Money,
    pub order_discount_amount: Money,
    pub pre_tax_total: Money,
    pub tax_amount: Money,
    pub total: Money,
    pub total_cost: Money,
    pub profit: Money,
}

impl SaleTotals {
    /// The tax as stored on the sale, if a tax was configured.
    pub fn applied_tax(&self, tax: Option<&Adjustment>) -> Option<AppliedTax> {
        tax.map(|rate| AppliedTax {
            rate: *rate,
            amount: self.tax_amount,
        })
    }
}

/// Computes sale totals.
///
/// An empty cart yields all zeros. Refusing to record it is the caller's job.
///
/// ## Example
/// ```rust
/// use shopkeep_core::money::Money;
/// use shopkeep_core::totals::compute_sale_totals;
/// use shopkeep_core::types::{Adjustment, SaleItem};
///
/// let items = vec![SaleItem {
///     product_id: "p-1".into(),
///     name: "Notebook".into(),
///     quantity: 2,
///     unit_price: Money::from_cents(1000),
///     unit_cost: Money::from_cents(600),
///     discount: Some(Adjustment::fixed_cents(500)),
/// }];
///
/// let totals = compute_sale_totals(&items, None, None);
/// assert_eq!(totals.pre_tax_total.cents(), 1500);
/// assert_eq!(totals.profit.cents(), 300);
/// ```
pub fn compute_sale_totals(
    items: &[SaleItem],
    order_discount: Option<&Adjustment>,
    tax: Option<&Adjustment>,
) -> SaleTotals {
    let subtotal: Money = items.iter().map(SaleItem::line_subtotal).sum();
    let item_discount_total: Money = items.iter().map(SaleItem::line_discount).sum();
    let after_items = subtotal - item_discount_total;

    let order_discount_amount = order_discount
        .map(|d| d.discount_on(after_items))
        .unwrap_or_default();
    let pre_tax_total = after_items - order_discount_amount;

    let tax_amount = tax.map(|t| t.tax_on(pre_tax_total)).unwrap_or_default();
    let total = pre_tax_total + tax_amount;

    let total_cost: Money = items.iter().map(SaleItem::line_cost).sum();
    let profit = pre_tax_total - total_cost;

    SaleTotals {
        subtotal,
        item_discount_total,
        order_discount_amount,
        pre_tax_total,
        tax_amount,
        total,
        total_cost,
        profit,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(qty: i64, price: i64, cost: i64) -> SaleItem {
        SaleItem {
            product_id: format!("p-{price}"),
            name: "Item".to_string(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            unit_cost: Money::from_cents(cost),
            discount: None,
        }
    }

    #[test]
    fn test_plain_cart() {
        let totals = compute_sale_totals(&[item(2, 1000, 600)], None, None);

        assert_eq!(totals.subtotal.cents(), 2000);
        assert_eq!(totals.total_cost.cents(), 1200);
        assert_eq!(totals.total.cents(), 2000);
        assert_eq!(totals.profit.cents(), 800);
    }

    #[test]
    fn test_fixed_item_discount() {
        let cart = [item(2, 1000, 600).with_discount(Adjustment::fixed_cents(500))];
        let totals = compute_sale_totals(&cart, None, None);

        assert_eq!(totals.item_discount_total.cents(), 500);
        assert_eq!(totals.pre_tax_total.cents(), 1500);
        assert_eq!(totals.total.cents(), 1500);
        assert_eq!(totals.profit.cents(), 300);
    }

    #[test]
    fn test_percentage_tax_excluded_from_profit() {
        let cart = [item(2, 1000, 600).with_discount(Adjustment::fixed_cents(500))];
        let tax = Adjustment::percent_bps(1000);
        let totals = compute_sale_totals(&cart, None, Some(&tax));

        assert_eq!(totals.tax_amount.cents(), 150);
        assert_eq!(totals.total.cents(), 1650);
        assert_eq!(totals.profit.cents(), 300);
        assert_eq!(
            totals.applied_tax(Some(&tax)),
            Some(AppliedTax {
                rate: tax,
                amount: Money::from_cents(150)
            })
        );
    }

    #[test]
    fn test_order_discount_applies_after_item_discounts() {
        let cart = [
            item(1, 2000, 500).with_discount(Adjustment::percent_bps(5000)),
            item(1, 1000, 500),
        ];
        let order = Adjustment::percent_bps(1000);
        let totals = compute_sale_totals(&cart, Some(&order), None);

        assert_eq!(totals.subtotal.cents(), 3000);
        assert_eq!(totals.item_discount_total.cents(), 1000);
        assert_eq!(totals.order_discount_amount.cents(), 200);
        assert_eq!(totals.pre_tax_total.cents(), 1800);
    }

    #[test]
    fn test_fixed_order_discount_floors_at_zero() {
        let order = Adjustment::fixed_cents(10_000);
        let totals = compute_sale_totals(&[item(1, 500, 200)], Some(&order), None);

        assert_eq!(totals.order_discount_amount.cents(), 500);
        assert_eq!(totals.pre_tax_total, Money::zero());
        assert_eq!(totals.profit.cents(), -200);
    }

    #[test]
    fn test_fixed_tax_is_literal() {
        let tax = Adjustment::fixed_cents(75);
        let totals = compute_sale_totals(&[item(3, 100, 50)], None, Some(&tax));

        assert_eq!(totals.tax_amount.cents(), 75);
        assert_eq!(totals.total.cents(), 375);
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        let tax = Adjustment::fixed_cents(75);
        let totals = compute_sale_totals(&[], None, Some(&tax));
        assert_eq!(totals.subtotal, Money::zero());
        assert_eq!(totals.total_cost, Money::zero());
        assert_eq!(totals.profit, Money::zero());
        // A fixed tax still contributes its literal value; the engine refuses
        // empty carts before this matters.
        assert_eq!(totals.tax_amount.cents(), 75);
    }

    fn arb_adjustment() -> impl Strategy<Value = Adjustment> {
        prop_oneof![
            (0u32..=10_000).prop_map(Adjustment::percent_bps),
            (0i64..50_000).prop_map(Adjustment::fixed_cents),
        ]
    }

    fn arb_item() -> impl Strategy<Value = SaleItem> {
        (
            1i64..=999,
            0i64..100_000,
            0i64..100_000,
            proptest::option::of(arb_adjustment()),
        )
            .prop_map(|(qty, price, cost, discount)| SaleItem {
                discount,
                ..item(qty, price, cost)
            })
    }

    proptest! {
        #[test]
        fn prop_cost_never_discounted(
            items in proptest::collection::vec(arb_item(), 1..10),
            order in proptest::option::of(arb_adjustment()),
        ) {
            let totals = compute_sale_totals(&items, order.as_ref(), None);
            let expected: i64 = items.iter().map(|i| i.quantity * i.unit_cost.cents()).sum();
            prop_assert_eq!(totals.total_cost.cents(), expected);
        }

        #[test]
        fn prop_total_and_profit_identities(
            items in proptest::collection::vec(arb_item(), 1..10),
            order in proptest::option::of(arb_adjustment()),
            tax in proptest::option::of(arb_adjustment()),
        ) {
            let totals = compute_sale_totals(&items, order.as_ref(), tax.as_ref());
            prop_assert_eq!(totals.total, totals.pre_tax_total + totals.tax_amount);
            prop_assert_eq!(totals.profit, totals.pre_tax_total - totals.total_cost);
            prop_assert!(!totals.pre_tax_total.is_negative());
            prop_assert!(totals.pre_tax_total <= totals.subtotal);
        }

        #[test]
        fn prop_percentage_tax_computed_from_pre_tax_total(
            items in proptest::collection::vec(arb_item(), 1..10),
            bps in 0u32..=10_000,
        ) {
            let tax = Adjustment::percent_bps(bps);
            let totals = compute_sale_totals(&items, None, Some(&tax));
            prop_assert_eq!(totals.tax_amount, totals.pre_tax_total.percentage(bps));
        }
    }
}
