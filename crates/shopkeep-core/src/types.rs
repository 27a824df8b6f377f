//! # Domain Types
//!
//! Core domain types used throughout Shopkeep.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │  StockUpdate    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  price, cost    │   │  receipt_number │   │  previous_stock │       │
//! │  │  stock          │   │  items[]        │   │  quantity_change│       │
//! │  │  version        │   │  totals         │   │  new_stock      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │    Payment      │   │      Bill       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  credit_balance │   │  target         │   │  due_date       │       │
//! │  │  kind           │   │  direction      │   │  recurrence     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A `SaleItem` freezes the product's name, price and cost at the moment of
//! sale. Later price changes never rewrite history.
//!
//! ## Versions
//! Mutable documents (Product, Customer, Sale, Bill) carry the store's
//! `version`. Ledger writes are conditional on the version that was read.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::recurrence::Recurrence;

// =============================================================================
// Adjustment (discounts and taxes)
// =============================================================================

/// A discount or tax, either a percentage or a fixed amount.
///
/// ## Representation
/// ```text
/// { "kind": "percentage", "bps": 1000 }   → 10%
/// { "kind": "fixed", "amount": 500 }      → $5.00
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    /// Percentage in basis points (1000 = 10%).
    Percentage { bps: u32 },
    /// Fixed amount.
    Fixed { amount: Money },
}

impl Adjustment {
    /// Percentage adjustment from basis points.
    pub const fn percent_bps(bps: u32) -> Self {
        Adjustment::Percentage { bps }
    }

    /// Fixed adjustment from cents.
    pub const fn fixed_cents(cents: i64) -> Self {
        Adjustment::Fixed {
            amount: Money::from_cents(cents),
        }
    }

    /// Amount this discount takes off `base`.
    ///
    /// Fixed discounts are clamped to `base` (and floored at zero), so a
    /// discount can never push the discounted amount below zero.
    pub fn discount_on(&self, base: Money) -> Money {
        let base = base.max(Money::zero());
        match *self {
            Adjustment::Percentage { bps } => base.percentage(bps).min(base),
            Adjustment::Fixed { amount } => amount.max(Money::zero()).min(base),
        }
    }

    /// Amount this tax adds on top of `base`.
    ///
    /// Fixed taxes contribute their literal value.
    pub fn tax_on(&self, base: Money) -> Money {
        match *self {
            Adjustment::Percentage { bps } => base.percentage(bps),
            Adjustment::Fixed { amount } => amount,
        }
    }
}

/// A tax as configured on the sale plus the amount it produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedTax {
    pub rate: Adjustment,
    pub amount: Money,
}

// =============================================================================
// Actor
// =============================================================================

/// The person a ledger record is attributed to.
///
/// Supplied by the caller's identity context; authentication happens
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Actor {
            id: id.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stock-keeping record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Display name shown on the dashboard and receipts.
    pub name: String,

    /// Optional business identifier.
    #[serde(default)]
    pub sku: Option<String>,

    /// Current sale price.
    pub price: Money,

    /// Current cost basis (for profit calculations).
    #[serde(default)]
    pub cost: Money,

    /// Current stock level. Only ledger operations change it.
    pub stock: i64,

    /// Supplier this product is bought from.
    #[serde(default)]
    pub supplier_id: Option<String>,

    /// Stock level at or below which the product shows up as low stock.
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub version: i64,
}

impl Product {
    /// Whether the product is at or below its low-stock threshold.
    pub fn is_low_stock(&self, default_threshold: i64) -> bool {
        self.stock <= self.low_stock_threshold.unwrap_or(default_threshold)
    }
}

// =============================================================================
// Payment Method / Status
// =============================================================================

/// How the customer tendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::Mobile => write!(f, "mobile"),
        }
    }
}

/// Settlement state of a sale.
///
/// ## Transitions
/// ```text
///   paid ────────────────────────── (final)
///   credit  ──► paid   (invoice payment covering the total)
///   invoice ──► paid   (invoice payment covering the total)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Credit,
    Invoice,
}

impl PaymentStatus {
    /// Credit and invoice sales go on the customer's account.
    pub const fn is_on_account(&self) -> bool {
        matches!(self, PaymentStatus::Credit | PaymentStatus::Invoice)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Credit => write!(f, "credit"),
            PaymentStatus::Invoice => write!(f, "invoice"),
        }
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// One cart line.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleItem {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    pub quantity: i64,
    /// Unit sale price at time of sale (frozen).
    pub unit_price: Money,
    /// Unit cost basis at time of sale (frozen).
    pub unit_cost: Money,
    #[serde(default)]
    pub discount: Option<Adjustment>,
}

impl SaleItem {
    /// Creates a cart line from the product's current price and cost.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        SaleItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity,
            unit_price: product.price,
            unit_cost: product.cost,
            discount: None,
        }
    }

    pub fn with_discount(mut self, discount: Adjustment) -> Self {
        self.discount = Some(discount);
        self
    }

    /// quantity × unit price.
    #[inline]
    pub fn line_subtotal(&self) -> Money {
        self.unit_price.times(self.quantity)
    }

    /// quantity × unit cost.
    #[inline]
    pub fn line_cost(&self) -> Money {
        self.unit_cost.times(self.quantity)
    }

    /// Discount taken off this line (zero when none).
    pub fn line_discount(&self) -> Money {
        self.discount
            .map(|d| d.discount_on(self.line_subtotal()))
            .unwrap_or_default()
    }

    /// Line subtotal after its own discount. Never negative.
    pub fn line_total(&self) -> Money {
        self.line_subtotal() - self.line_discount()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale.
///
/// Immutable once created except for the credit/invoice → paid transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub receipt_number: String,
    pub items: Vec<SaleItem>,
    pub actor_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub invoice_number: Option<String>,

    pub subtotal: Money,
    pub item_discount_total: Money,
    #[serde(default)]
    pub order_discount: Option<Adjustment>,
    pub order_discount_amount: Money,
    #[serde(default)]
    pub tax: Option<AppliedTax>,
    pub total: Money,
    pub total_cost: Money,
    pub profit: Money,

    /// Server-assigned at commit time.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the sale became fully paid (immediately for cash/card/mobile).
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub version: i64,
}

impl Sale {
    /// Tax amount, zero when the sale carried no tax.
    pub fn tax_amount(&self) -> Money {
        self.tax.map(|t| t.amount).unwrap_or_default()
    }

    /// Revenue before tax (`total - tax`).
    pub fn pre_tax_total(&self) -> Money {
        self.total - self.tax_amount()
    }

    /// Total units across all lines.
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Stock Update
// =============================================================================

/// Why a product's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    Sale,
    NewSupply,
    Correction,
    Return,
}

/// Append-only audit entry for one stock mutation.
///
/// ## Invariant
/// `previous_stock + quantity_change == new_stock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockUpdate {
    pub id: String,
    pub product_id: String,
    pub quantity_change: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reason: StockReason,
    /// Sale id for sale movements, optional sale id for returns.
    #[serde(default)]
    pub reference_id: Option<String>,
    pub actor_id: String,
    #[serde(default)]
    pub note: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockUpdate {
    /// Checks the arithmetic invariant of a single entry.
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.previous_stock + self.quantity_change == self.new_stock
    }
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CustomerKind {
    Credit,
    Invoice,
}

/// A customer who buys on account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub kind: CustomerKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Running balance owed by the customer. Never negative.
    pub credit_balance: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

// =============================================================================
// Payment
// =============================================================================

/// What a payment settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentTarget {
    /// Money received from a customer, optionally against a specific sale.
    Customer {
        customer_id: String,
        #[serde(default)]
        sale_id: Option<String>,
    },
    /// Money paid out to a vendor for a bill.
    Bill { bill_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    Inbound,
    Outbound,
}

/// Append-only record of money movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub target: PaymentTarget,
    pub amount: Money,
    pub direction: PaymentDirection,
    pub method: PaymentMethod,
    pub actor_id: String,
    /// Customer balance right after this payment (customer payments only).
    #[serde(default)]
    pub balance_after_payment: Option<Money>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Sale this payment was applied to, if any.
    pub fn sale_id(&self) -> Option<&str> {
        match &self.target {
            PaymentTarget::Customer { sale_id, .. } => sale_id.as_deref(),
            PaymentTarget::Bill { .. } => None,
        }
    }
}

// =============================================================================
// Bill
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    Unpaid,
    Paid,
}

/// A vendor obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Bill {
    pub id: String,
    pub vendor: String,
    #[serde(default)]
    pub description: String,
    pub amount: Money,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub status: BillStatus,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    /// The paid bill this one was generated from.
    #[serde(default)]
    pub previous_bill_id: Option<String>,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

impl Bill {
    pub fn is_paid(&self) -> bool {
        self.status == BillStatus::Paid
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(qty: i64, price: i64, cost: i64) -> SaleItem {
        SaleItem {
            product_id: "p-1".to_string(),
            name: "Widget".to_string(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            unit_cost: Money::from_cents(cost),
            discount: None,
        }
    }

    #[test]
    fn test_fixed_discount_is_clamped_to_line() {
        let line = item(1, 300, 100).with_discount(Adjustment::fixed_cents(500));
        assert_eq!(line.line_discount().cents(), 300);
        assert_eq!(line.line_total(), Money::zero());
    }

    #[test]
    fn test_percentage_discount_on_line() {
        let line = item(2, 1000, 600).with_discount(Adjustment::percent_bps(2500));
        assert_eq!(line.line_discount().cents(), 500);
        assert_eq!(line.line_total().cents(), 1500);
        assert_eq!(line.line_cost().cents(), 1200);
    }

    #[test]
    fn test_tax_fixed_is_literal() {
        let tax = Adjustment::fixed_cents(250);
        assert_eq!(tax.tax_on(Money::from_cents(10)).cents(), 250);
    }

    #[test]
    fn test_payment_status_on_account() {
        assert!(!PaymentStatus::Paid.is_on_account());
        assert!(PaymentStatus::Credit.is_on_account());
        assert!(PaymentStatus::Invoice.is_on_account());
    }

    #[test]
    fn test_adjustment_json_shape() {
        let json = serde_json::to_value(Adjustment::percent_bps(1000)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "percentage", "bps": 1000}));

        let json = serde_json::to_value(Adjustment::fixed_cents(500)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "fixed", "amount": 500}));
    }

    #[test]
    fn test_payment_target_json_shape() {
        let target = PaymentTarget::Bill {
            bill_id: "b-1".to_string(),
        };
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json, serde_json::json!({"type": "bill", "bill_id": "b-1"}));
    }

    #[test]
    fn test_stock_update_consistency() {
        let update = StockUpdate {
            id: "s-1".to_string(),
            product_id: "p-1".to_string(),
            quantity_change: -2,
            previous_stock: 10,
            new_stock: 8,
            reason: StockReason::Sale,
            reference_id: None,
            actor_id: "a".to_string(),
            note: None,
            created_at: Utc::now(),
        };
        assert!(update.is_consistent());
    }
}
