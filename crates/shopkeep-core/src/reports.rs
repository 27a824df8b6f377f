//! # Reports
//!
//! Pure aggregations over snapshots the dashboard already holds. Nothing
//! here reads the store; callers pass in slices from a query or a live
//! collection.
//!
//! ## Available Reports
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────────────┐
//! │ summarize_sales      │ count, revenue, tax, discounts, cost, profit per │
//! │                      │ day / week / month in the shop's UTC offset      │
//! │ top_products         │ best sellers by units or by revenue              │
//! │ low_stock            │ products at or below their threshold             │
//! │ bills_due            │ unpaid bills split into overdue and upcoming     │
//! │ receivables          │ customers who owe money, largest balance first   │
//! └──────────────────────┴──────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::receipt::BusinessClock;
use crate::types::{Bill, Customer, PaymentMethod, Product, Sale};

// =============================================================================
// Sales Summary
// =============================================================================

/// Calendar bucket for sales summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReportBucket {
    Day,
    /// ISO week, starting Monday.
    Week,
    Month,
}

impl ReportBucket {
    /// First day of the bucket containing `date`.
    pub fn start_of(&self, date: NaiveDate) -> NaiveDate {
        match self {
            ReportBucket::Day => date,
            ReportBucket::Week => {
                let back = date.weekday().num_days_from_monday() as u64;
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
            ReportBucket::Month => date.with_day(1).unwrap_or(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentMethodBreakdown {
    pub method: PaymentMethod,
    pub count: u32,
    pub amount: Money,
}

/// Aggregated figures for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesSummary {
    #[ts(as = "String")]
    pub bucket_start: NaiveDate,
    pub sale_count: u32,
    pub units_sold: i64,
    /// Sum of sale totals (tax included).
    pub revenue: Money,
    pub tax: Money,
    /// Item plus order discounts.
    pub discounts: Money,
    pub cost: Money,
    pub profit: Money,
    /// Part of `revenue` still owed on credit/invoice sales.
    pub outstanding: Money,
    pub by_method: Vec<PaymentMethodBreakdown>,
}

impl SalesSummary {
    fn empty(bucket_start: NaiveDate) -> Self {
        SalesSummary {
            bucket_start,
            sale_count: 0,
            units_sold: 0,
            revenue: Money::zero(),
            tax: Money::zero(),
            discounts: Money::zero(),
            cost: Money::zero(),
            profit: Money::zero(),
            outstanding: Money::zero(),
            by_method: Vec::new(),
        }
    }

    fn add(&mut self, sale: &Sale) {
        self.sale_count += 1;
        self.units_sold += sale.item_count();
        self.revenue += sale.total;
        self.tax += sale.tax_amount();
        self.discounts += sale.item_discount_total + sale.order_discount_amount;
        self.cost += sale.total_cost;
        self.profit += sale.profit;
        if sale.paid_at.is_none() {
            self.outstanding += sale.total;
        }

        match self.by_method.iter_mut().find(|b| b.method == sale.payment_method) {
            Some(entry) => {
                entry.count += 1;
                entry.amount += sale.total;
            }
            None => self.by_method.push(PaymentMethodBreakdown {
                method: sale.payment_method,
                count: 1,
                amount: sale.total,
            }),
        }
    }

    /// Average sale total, zero when the bucket is empty.
    pub fn average_sale(&self) -> Money {
        if self.sale_count == 0 {
            return Money::zero();
        }
        Money::from_cents(self.revenue.cents() / self.sale_count as i64)
    }
}

/// Groups sales by business-date bucket, oldest bucket first.
/// Buckets without sales are omitted.
pub fn summarize_sales(sales: &[Sale], bucket: ReportBucket, clock: &BusinessClock) -> Vec<SalesSummary> {
    let mut buckets: BTreeMap<NaiveDate, SalesSummary> = BTreeMap::new();

    for sale in sales {
        let start = bucket.start_of(clock.date_of(sale.created_at));
        buckets
            .entry(start)
            .or_insert_with(|| SalesSummary::empty(start))
            .add(sale);
    }

    buckets.into_values().collect()
}

// =============================================================================
// Top Products
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TopProductsBy {
    Quantity,
    Revenue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPerformance {
    pub product_id: String,
    /// Most recent name the product was sold under.
    pub name: String,
    pub units_sold: i64,
    /// Line totals after line discounts, before order discounts and tax.
    pub revenue: Money,
    pub cost: Money,
}

impl ProductPerformance {
    pub fn margin(&self) -> Money {
        self.revenue - self.cost
    }
}

/// Best-selling products, ties broken by product id for a stable order.
pub fn top_products(sales: &[Sale], by: TopProductsBy, limit: usize) -> Vec<ProductPerformance> {
    let mut per_product: HashMap<&str, ProductPerformance> = HashMap::new();

    for sale in sales {
        for item in &sale.items {
            let entry = per_product
                .entry(item.product_id.as_str())
                .or_insert_with(|| ProductPerformance {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    units_sold: 0,
                    revenue: Money::zero(),
                    cost: Money::zero(),
                });
            entry.name = item.name.clone();
            entry.units_sold += item.quantity;
            entry.revenue += item.line_total();
            entry.cost += item.line_cost();
        }
    }

    let mut ranked: Vec<ProductPerformance> = per_product.into_values().collect();
    ranked.sort_by(|a, b| {
        let primary = match by {
            TopProductsBy::Quantity => b.units_sold.cmp(&a.units_sold),
            TopProductsBy::Revenue => b.revenue.cmp(&a.revenue),
        };
        primary.then_with(|| a.product_id.cmp(&b.product_id))
    });
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// Inventory
// =============================================================================

/// Products at or below their low-stock threshold, emptiest first.
pub fn low_stock(products: &[Product], default_threshold: i64) -> Vec<&Product> {
    let mut low: Vec<&Product> = products
        .iter()
        .filter(|p| p.is_low_stock(default_threshold))
        .collect();
    low.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.name.cmp(&b.name)));
    low
}

// =============================================================================
// Bills & Receivables
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BillsDue {
    /// Unpaid bills due before `today`, oldest first.
    pub overdue: Vec<Bill>,
    /// Unpaid bills due from `today` up to and including the horizon.
    pub upcoming: Vec<Bill>,
    pub overdue_total: Money,
    pub upcoming_total: Money,
}

/// Splits unpaid bills into overdue and due within `horizon_days`.
pub fn bills_due(bills: &[Bill], today: NaiveDate, horizon_days: u64) -> BillsDue {
    let horizon = today
        .checked_add_days(Days::new(horizon_days))
        .unwrap_or(NaiveDate::MAX);

    let mut overdue: Vec<Bill> = Vec::new();
    let mut upcoming: Vec<Bill> = Vec::new();

    for bill in bills.iter().filter(|b| !b.is_paid()) {
        if bill.due_date < today {
            overdue.push(bill.clone());
        } else if bill.due_date <= horizon {
            upcoming.push(bill.clone());
        }
    }

    overdue.sort_by_key(|b| b.due_date);
    upcoming.sort_by_key(|b| b.due_date);

    BillsDue {
        overdue_total: overdue.iter().map(|b| b.amount).sum(),
        upcoming_total: upcoming.iter().map(|b| b.amount).sum(),
        overdue,
        upcoming,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receivable {
    pub customer_id: String,
    pub name: String,
    pub balance: Money,
}

/// Customers with a positive balance, largest first.
pub fn receivables(customers: &[Customer]) -> Vec<Receivable> {
    let mut owing: Vec<Receivable> = customers
        .iter()
        .filter(|c| c.credit_balance.is_positive())
        .map(|c| Receivable {
            customer_id: c.id.clone(),
            name: c.name.clone(),
            balance: c.credit_balance,
        })
        .collect();
    owing.sort_by(|a, b| b.balance.cmp(&a.balance).then_with(|| a.name.cmp(&b.name)));
    owing
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BillStatus, CustomerKind, PaymentStatus, SaleItem};
    use chrono::{DateTime, TimeZone, Utc};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(product_id: &str, qty: i64, price: i64, cost: i64) -> SaleItem {
        SaleItem {
            product_id: product_id.to_string(),
            name: product_id.to_uppercase(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            unit_cost: Money::from_cents(cost),
            discount: None,
        }
    }

    fn sale(at: DateTime<Utc>, method: PaymentMethod, items: Vec<SaleItem>) -> Sale {
        let totals = crate::totals::compute_sale_totals(&items, None, None);
        Sale {
            id: format!("s-{}", at.timestamp()),
            receipt_number: "R-000000-0001".to_string(),
            items,
            actor_id: "cashier".to_string(),
            customer_id: None,
            payment_method: method,
            payment_status: PaymentStatus::Paid,
            invoice_number: None,
            subtotal: totals.subtotal,
            item_discount_total: totals.item_discount_total,
            order_discount: None,
            order_discount_amount: totals.order_discount_amount,
            tax: None,
            total: totals.total,
            total_cost: totals.total_cost,
            profit: totals.profit,
            created_at: at,
            paid_at: Some(at),
            version: 1,
        }
    }

    fn bill(id: &str, due: NaiveDate, status: BillStatus, amount: i64) -> Bill {
        Bill {
            id: id.to_string(),
            vendor: "Utility Co".to_string(),
            description: String::new(),
            amount: Money::from_cents(amount),
            due_date: due,
            status,
            category: "utilities".to_string(),
            recurrence: None,
            previous_bill_id: None,
            paid_at: None,
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn bucket_starts() {
        // 2024-03-14 is a Thursday
        assert_eq!(ReportBucket::Week.start_of(day(2024, 3, 14)), day(2024, 3, 11));
        assert_eq!(ReportBucket::Week.start_of(day(2024, 3, 11)), day(2024, 3, 11));
        assert_eq!(ReportBucket::Month.start_of(day(2024, 3, 14)), day(2024, 3, 1));
    }

    #[test]
    fn daily_summary_uses_business_offset() {
        let clock = BusinessClock::from_offset_minutes(-300).unwrap();
        let sales = vec![
            // 2024-03-15 22:00 local
            sale(
                Utc.with_ymd_and_hms(2024, 3, 16, 3, 0, 0).unwrap(),
                PaymentMethod::Cash,
                vec![line("tea", 2, 500, 200)],
            ),
            sale(
                Utc.with_ymd_and_hms(2024, 3, 16, 15, 0, 0).unwrap(),
                PaymentMethod::Card,
                vec![line("tea", 1, 500, 200), line("mug", 1, 1500, 700)],
            ),
        ];

        let summary = summarize_sales(&sales, ReportBucket::Day, &clock);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].bucket_start, day(2024, 3, 15));
        assert_eq!(summary[0].revenue.cents(), 1000);
        assert_eq!(summary[1].bucket_start, day(2024, 3, 16));
        assert_eq!(summary[1].units_sold, 2);
        assert_eq!(summary[1].profit.cents(), 1100);

        let monthly = summarize_sales(&sales, ReportBucket::Month, &clock);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].sale_count, 2);
        assert_eq!(monthly[0].by_method.len(), 2);
        assert_eq!(monthly[0].average_sale().cents(), 1500);
    }

    #[test]
    fn top_products_by_quantity_and_revenue() {
        let at = Utc.with_ymd_and_hms(2024, 3, 16, 15, 0, 0).unwrap();
        let sales = vec![
            sale(at, PaymentMethod::Cash, vec![line("tea", 5, 100, 50)]),
            sale(at, PaymentMethod::Cash, vec![line("mug", 1, 1500, 700), line("tea", 1, 100, 50)]),
        ];

        let by_qty = top_products(&sales, TopProductsBy::Quantity, 10);
        assert_eq!(by_qty[0].product_id, "tea");
        assert_eq!(by_qty[0].units_sold, 6);

        let by_revenue = top_products(&sales, TopProductsBy::Revenue, 1);
        assert_eq!(by_revenue.len(), 1);
        assert_eq!(by_revenue[0].product_id, "mug");
        assert_eq!(by_revenue[0].margin().cents(), 800);
    }

    #[test]
    fn bills_due_partitions_unpaid() {
        let today = day(2024, 3, 15);
        let bills = vec![
            bill("late", day(2024, 3, 1), BillStatus::Unpaid, 1000),
            bill("paid", day(2024, 3, 2), BillStatus::Paid, 9999),
            bill("soon", day(2024, 3, 20), BillStatus::Unpaid, 500),
            bill("today", day(2024, 3, 15), BillStatus::Unpaid, 250),
            bill("later", day(2024, 5, 1), BillStatus::Unpaid, 700),
        ];

        let due = bills_due(&bills, today, 7);
        assert_eq!(due.overdue.len(), 1);
        assert_eq!(due.overdue_total.cents(), 1000);
        let upcoming: Vec<&str> = due.upcoming.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(upcoming, vec!["today", "soon"]);
        assert_eq!(due.upcoming_total.cents(), 750);
    }

    #[test]
    fn receivables_sorted_by_balance() {
        let customer = |id: &str, balance: i64| Customer {
            id: id.to_string(),
            name: id.to_string(),
            kind: CustomerKind::Credit,
            phone: None,
            email: None,
            address: None,
            credit_balance: Money::from_cents(balance),
            created_at: Utc::now(),
            version: 1,
        };
        let list = receivables(&[customer("a", 100), customer("b", 0), customer("c", 900)]);
        let ids: Vec<&str> = list.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn low_stock_uses_product_threshold() {
        let product = |id: &str, stock: i64, threshold: Option<i64>| Product {
            id: id.to_string(),
            name: id.to_string(),
            sku: None,
            price: Money::from_cents(100),
            cost: Money::from_cents(50),
            stock,
            supplier_id: None,
            low_stock_threshold: threshold,
            created_at: Utc::now(),
            version: 1,
        };
        let products = vec![
            product("plenty", 50, None),
            product("custom", 15, Some(20)),
            product("empty", 0, None),
            product("few", 3, None),
        ];
        let low: Vec<&str> = low_stock(&products, 5).iter().map(|p| p.id.as_str()).collect();
        assert_eq!(low, vec!["empty", "few", "custom"]);
    }
}
