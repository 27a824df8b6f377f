//! # Ledger Mutator
//!
//! Builds the write batches for ledger operations. Pure functions: reads
//! happen in the engine, commits happen in the store.
//!
//! ## Sale Batch
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale_batch(sale, products, customer, counter)                          │
//! │                                                                         │
//! │  1. create  sales/{sale.id}                                             │
//! │  2. put     counters/receipts-YYMMDD     if version == read (or absent) │
//! │  3. for each product in the cart (first appearance order):              │
//! │       create stock_updates/{uuid}        one per line, chained          │
//! │       update products/{id} stock         if version == read             │
//! │  4. update  customers/{id} balance       if version == read             │
//! │     (credit and invoice sales only)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every document that the batch modifies carries the version the engine
//! read, so a concurrent writer turns the whole batch into a conflict
//! instead of a lost update.

use chrono::NaiveDate;
use serde_json::json;
use shopkeep_core::receipt::counter_id;
use shopkeep_core::{Customer, Money, Product, Sale, StockReason, StockUpdate};
use shopkeep_store::{to_document, Collection, Record, WriteOp};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Receipt Counter
// =============================================================================

/// Per-day receipt sequence as read by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptCounter {
    pub id: String,
    pub date: NaiveDate,
    /// Last sequence number handed out for the day.
    pub last_issued: u64,
    /// Version read from the store, `None` when the document did not exist.
    pub version: Option<i64>,
}

impl ReceiptCounter {
    /// Counter for a day that has no counter document yet.
    pub fn seeded(date: NaiveDate, existing_today: u64) -> Self {
        ReceiptCounter {
            id: counter_id(date),
            date,
            last_issued: existing_today,
            version: None,
        }
    }

    pub fn from_record(date: NaiveDate, record: &Record) -> Self {
        ReceiptCounter {
            id: record.id.clone(),
            date,
            last_issued: record
                .field("last_issued")
                .and_then(|v| v.as_u64())
                .unwrap_or(0),
            version: Some(record.version),
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.last_issued + 1
    }

    /// Conditional write claiming the next sequence.
    pub fn claim_next(&self) -> WriteOp {
        let op = WriteOp::put(
            Collection::Counters,
            self.id.clone(),
            json!({
                "date": self.date,
                "last_issued": self.next_sequence(),
            }),
        );
        match self.version {
            Some(version) => op.if_version(version),
            None => op.if_missing(),
        }
    }
}

// =============================================================================
// Batches
// =============================================================================

/// Every write of one sale, in commit order.
///
/// `products` must hold the freshly read version of each product in the
/// cart. `customer` is required for credit and invoice sales and ignored for
/// paid ones.
pub fn sale_batch(
    sale: &Sale,
    products: &[Product],
    customer: Option<&Customer>,
    counter: &ReceiptCounter,
) -> LedgerResult<Vec<WriteOp>> {
    let mut ops = vec![
        WriteOp::create_with_id(Collection::Sales, sale.id.clone(), to_document(sale)?),
        counter.claim_next(),
    ];

    for product_id in distinct_product_ids(sale) {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| LedgerError::not_found("product", product_id))?;

        let mut running_stock = product.stock;
        for item in sale.items.iter().filter(|i| i.product_id == product_id) {
            let update = StockUpdate {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                quantity_change: -item.quantity,
                previous_stock: running_stock,
                new_stock: running_stock - item.quantity,
                reason: StockReason::Sale,
                reference_id: Some(sale.id.clone()),
                actor_id: sale.actor_id.clone(),
                note: None,
                created_at: sale.created_at,
            };
            running_stock = update.new_stock;
            ops.push(stock_update_op(&update)?);
        }

        ops.push(
            WriteOp::update(Collection::Products, product.id.clone(), json!({ "stock": running_stock }))
                .if_version(product.version),
        );
    }

    if sale.payment_status.is_on_account() {
        let customer = customer.ok_or(LedgerError::MissingCustomer)?;
        ops.push(customer_balance_op(customer, customer.credit_balance + sale.total));
    }

    Ok(ops)
}

/// One stock movement outside a sale: the audit row, then the product.
pub fn stock_movement_batch(product: &Product, update: &StockUpdate) -> LedgerResult<Vec<WriteOp>> {
    Ok(vec![
        stock_update_op(update)?,
        WriteOp::update(
            Collection::Products,
            product.id.clone(),
            json!({ "stock": update.new_stock }),
        )
        .if_version(product.version),
    ])
}

/// Conditional write of a customer's new balance.
pub fn customer_balance_op(customer: &Customer, new_balance: Money) -> WriteOp {
    WriteOp::update(
        Collection::Customers,
        customer.id.clone(),
        json!({ "credit_balance": new_balance }),
    )
    .if_version(customer.version)
}

fn stock_update_op(update: &StockUpdate) -> LedgerResult<WriteOp> {
    Ok(WriteOp::create_with_id(
        Collection::StockUpdates,
        update.id.clone(),
        to_document(update)?,
    ))
}

/// Product ids in order of first appearance in the cart.
pub(crate) fn distinct_product_ids(sale: &Sale) -> Vec<&str> {
    let mut ids: Vec<&str> = Vec::new();
    for item in &sale.items {
        if !ids.contains(&item.product_id.as_str()) {
            ids.push(&item.product_id);
        }
    }
    ids
}

// =============================================================================
// Unit Tests
// =============================================================================
