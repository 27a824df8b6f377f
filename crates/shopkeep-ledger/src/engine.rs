//! # Sale Ledger Engine
//!
//! Records a checkout as one atomic batch.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleRequest ──► validate ──► compute totals                            │
//! │                                    │                                    │
//! │          ┌─────────────────────────┘                                    │
//! │          ▼                                                              │
//! │   ┌─────────────┐   read counter, products, customer (fresh)            │
//! │   │  attempt N  │──► build Sale ──► sale_batch ──► batch_commit         │
//! │   └─────────────┘                                      │                │
//! │          ▲                                   ┌─────────┴─────────┐      │
//! │          │                                   ▼                   ▼      │
//! │          │                               Conflict            committed  │
//! │          └──────── backoff ◄──── (attempts left?)                │      │
//! │                                         │ no                     ▼      │
//! │                               ConcurrentModification        Sale        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and business-rule errors surface on the first attempt and are
//! never retried. Only version conflicts rebuild the batch.

use std::future::Future;
use std::sync::Arc;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shopkeep_core::receipt::{counter_id, format_receipt_number, BusinessClock};
use shopkeep_core::validation::{validate_adjustment, validate_cart, validate_invoice_number};
use shopkeep_core::{
    compute_sale_totals, Actor, Adjustment, Customer, PaymentMethod, PaymentStatus, Product, Sale,
    SaleItem,
};
use shopkeep_store::{Collection, DbConfig, Filter, RecordStore, SqliteStore};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::first;
use crate::config::{LedgerConfig, StockPolicy};
use crate::error::{LedgerError, LedgerResult};
use crate::mutator::{sale_batch, ReceiptCounter};

// =============================================================================
// Sale Request
// =============================================================================

/// A checkout as submitted by the register.
///
/// Items carry the name, price and cost the cashier saw; those values are
/// frozen into the sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub items: Vec<SaleItem>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub order_discount: Option<Adjustment>,
    #[serde(default)]
    pub tax: Option<Adjustment>,
}

impl SaleRequest {
    /// A sale paid in full at the counter.
    pub fn paid(items: Vec<SaleItem>, method: PaymentMethod) -> Self {
        SaleRequest {
            items,
            payment_method: method,
            payment_status: PaymentStatus::Paid,
            customer_id: None,
            invoice_number: None,
            order_discount: None,
            tax: None,
        }
    }

    /// Put the sale on the customer's running balance.
    pub fn on_credit(mut self, customer_id: impl Into<String>) -> Self {
        self.payment_status = PaymentStatus::Credit;
        self.customer_id = Some(customer_id.into());
        self
    }

    /// Bill the sale to the customer under an invoice number.
    pub fn on_invoice(mut self, customer_id: impl Into<String>, invoice_number: impl Into<String>) -> Self {
        self.payment_status = PaymentStatus::Invoice;
        self.customer_id = Some(customer_id.into());
        self.invoice_number = Some(invoice_number.into());
        self
    }

    /// Attribute a paid sale to a customer.
    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn with_order_discount(mut self, discount: Adjustment) -> Self {
        self.order_discount = Some(discount);
        self
    }

    pub fn with_tax(mut self, tax: Adjustment) -> Self {
        self.tax = Some(tax);
        self
    }

    /// Checks everything that can be checked without reading the store.
    ///
    /// Returns the trimmed invoice number for invoice sales.
    pub fn validate(&self) -> LedgerResult<Option<String>> {
        validate_cart(&self.items)?;

        if let Some(discount) = &self.order_discount {
            validate_adjustment("order_discount", discount)?;
        }
        if let Some(tax) = &self.tax {
            validate_adjustment("tax", tax)?;
        }

        let has_customer = self
            .customer_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        if self.payment_status.is_on_account() && !has_customer {
            return Err(LedgerError::MissingCustomer);
        }

        match self.payment_status {
            PaymentStatus::Invoice => {
                if self.invoice_number.as_deref().map(str::trim).unwrap_or_default().is_empty() {
                    return Err(LedgerError::MissingInvoiceNumber);
                }
                Ok(Some(validate_invoice_number(self.invoice_number.as_deref())?))
            }
            _ => Ok(None),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Ledger operations over a Record Store.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct SaleLedgerEngine {
    store: Arc<dyn RecordStore>,
    config: LedgerConfig,
    clock: BusinessClock,
}

impl std::fmt::Debug for SaleLedgerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaleLedgerEngine")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl SaleLedgerEngine {
    pub fn new(store: Arc<dyn RecordStore>, config: LedgerConfig) -> LedgerResult<Self> {
        config.validate()?;
        let clock = config.clock()?;
        Ok(SaleLedgerEngine {
            store,
            config,
            clock,
        })
    }

    /// Opens the configured SQLite store and runs migrations.
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        Self::open_with(config.db_config(), config).await
    }

    /// Opens a store with explicit connection settings (`DbConfig::in_memory()`
    /// in tests).
    pub async fn open_with(db: DbConfig, config: LedgerConfig) -> LedgerResult<Self> {
        let store = SqliteStore::new(db).await?;
        Self::new(Arc::new(store), config)
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    /// Business date of an instant.
    pub fn business_date(&self, at: chrono::DateTime<Utc>) -> NaiveDate {
        self.clock.date_of(at)
    }

    // =========================================================================
    // Record Sale
    // =========================================================================

    /// Records a sale: the sale document, stock movements for every line,
    /// the customer balance for on-account sales, and the next receipt
    /// number, all in one batch.
    ///
    /// ## Errors
    /// - `EmptyCart`, `Validation`, `MissingCustomer`, `MissingInvoiceNumber`
    /// - `NotFound`: a product or the customer does not exist
    /// - `InsufficientStock`: only with `stock_policy = "reject"`
    /// - `ConcurrentModification`: every attempt lost a version race
    /// - `Persistence`: the store failed; nothing was written
    pub async fn record_sale(&self, request: SaleRequest, actor: &Actor) -> LedgerResult<Sale> {
        let invoice_number = request.validate()?;
        let totals = compute_sale_totals(
            &request.items,
            request.order_discount.as_ref(),
            request.tax.as_ref(),
        );
        let draft = SaleDraft {
            request: &request,
            actor,
            invoice_number,
            totals,
        };

        let draft = &draft;
        let sale = self
            .with_conflict_retry("record_sale", move || self.try_record_sale(draft))
            .await?;

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            total = %sale.total,
            status = %sale.payment_status,
            lines = sale.items.len(),
            "Sale recorded"
        );
        Ok(sale)
    }

    async fn try_record_sale(&self, draft: &SaleDraft<'_>) -> LedgerResult<Sale> {
        let request = draft.request;
        // Receipt date and commit instant come from one reading of the
        // store's clock.
        let now = self.store.now()?;
        let date = self.clock.date_of(now);

        let counter = self.read_counter(date).await?;
        let products = self.read_cart_products(&request.items).await?;
        if self.config.stock_policy() == StockPolicy::Reject {
            check_stock(&request.items, &products)?;
        }

        let customer = match request.customer_id.as_deref() {
            Some(id) => Some(self.read_customer(id).await?),
            None => None,
        };

        let totals = draft.totals;
        // Nothing owed: an on-account sale with a zero total is settled as
        // it is recorded.
        let payment_status = if request.payment_status.is_on_account() && totals.total.is_zero() {
            PaymentStatus::Paid
        } else {
            request.payment_status
        };
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            receipt_number: format_receipt_number(
                &self.config.business.receipt_prefix,
                date,
                counter.next_sequence(),
            ),
            items: request.items.clone(),
            actor_id: draft.actor.id.clone(),
            customer_id: customer.as_ref().map(|c| c.id.clone()),
            payment_method: request.payment_method,
            payment_status,
            invoice_number: draft.invoice_number.clone(),
            subtotal: totals.subtotal,
            item_discount_total: totals.item_discount_total,
            order_discount: request.order_discount,
            order_discount_amount: totals.order_discount_amount,
            tax: totals.applied_tax(request.tax.as_ref()),
            total: totals.total,
            total_cost: totals.total_cost,
            profit: totals.profit,
            created_at: now,
            paid_at: (payment_status == PaymentStatus::Paid).then_some(now),
            version: 0,
        };

        let ops = sale_batch(&sale, &products, customer.as_ref(), &counter)?;
        let records = self.store.batch_commit_at(ops, now).await?;
        Ok(first(&records)?.decode()?)
    }

    /// Reads the day's receipt counter, seeding it from the day's sales when
    /// the document does not exist yet.
    async fn read_counter(&self, date: NaiveDate) -> LedgerResult<ReceiptCounter> {
        if let Some(record) = self.store.get(Collection::Counters, &counter_id(date)).await? {
            return Ok(ReceiptCounter::from_record(date, &record));
        }

        let (start, end) = self.clock.day_bounds(date);
        let existing = self
            .store
            .count(Collection::Sales, &Filter::all().created_between(start, end))
            .await?;
        debug!(%date, existing, "Seeding receipt counter");
        Ok(ReceiptCounter::seeded(date, existing as u64))
    }

    async fn read_cart_products(&self, items: &[SaleItem]) -> LedgerResult<Vec<Product>> {
        let mut products = Vec::new();
        for item in items {
            if products.iter().any(|p: &Product| p.id == item.product_id) {
                continue;
            }
            products.push(self.read_product(&item.product_id).await?);
        }
        Ok(products)
    }

    pub(crate) async fn read_product(&self, id: &str) -> LedgerResult<Product> {
        let record = self
            .store
            .get(Collection::Products, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("product", id))?;
        Ok(record.decode()?)
    }

    pub(crate) async fn read_customer(&self, id: &str) -> LedgerResult<Customer> {
        let record = self
            .store
            .get(Collection::Customers, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("customer", id))?;
        Ok(record.decode()?)
    }

    // =========================================================================
    // Retry
    // =========================================================================

    /// Runs `attempt` until it commits, fails with something other than a
    /// version conflict, or runs out of attempts.
    ///
    /// Each attempt must re-read everything it writes.
    pub(crate) async fn with_conflict_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let settings = &self.config.engine;
        let mut backoff = ExponentialBackoff {
            current_interval: settings.initial_backoff(),
            initial_interval: settings.initial_backoff(),
            max_interval: settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Err(err) if err.is_conflict() => {
                    if attempts >= settings.max_commit_attempts {
                        warn!(operation, attempts, error = %err, "Giving up after repeated conflicts");
                        return Err(LedgerError::ConcurrentModification {
                            operation,
                            attempts,
                        });
                    }

                    let delay = backoff.next_backoff().unwrap_or_else(|| settings.max_backoff());
                    warn!(
                        operation,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Commit conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

/// Inputs of a sale that stay fixed across retries.
struct SaleDraft<'a> {
    request: &'a SaleRequest,
    actor: &'a Actor,
    invoice_number: Option<String>,
    totals: shopkeep_core::SaleTotals,
}

/// Refuses carts that would take any product below zero.
fn check_stock(items: &[SaleItem], products: &[Product]) -> LedgerResult<()> {
    for product in products {
        let requested: i64 = items
            .iter()
            .filter(|i| i.product_id == product.id)
            .map(|i| i.quantity)
            .sum();
        if requested > product.stock {
            return Err(LedgerError::InsufficientStock {
                product_id: product.id.clone(),
                name: product.name.clone(),
                available: product.stock,
                requested,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shopkeep_core::Money;

    fn item(product_id: &str, qty: i64) -> SaleItem {
        SaleItem {
            product_id: product_id.to_string(),
            name: "Widget".to_string(),
            quantity: qty,
            unit_price: Money::from_cents(500),
            unit_cost: Money::from_cents(200),
            discount: None,
        }
    }

    #[test]
    fn test_request_builders() {
        let request = SaleRequest::paid(vec![item("p-1", 1)], PaymentMethod::Card)
            .on_invoice("c-1", "INV-9")
            .with_tax(Adjustment::percent_bps(1000));
        assert_eq!(request.payment_status, PaymentStatus::Invoice);
        assert_eq!(request.customer_id.as_deref(), Some("c-1"));
        assert_eq!(request.validate().unwrap().as_deref(), Some("INV-9"));
    }

    #[test]
    fn test_request_validation() {
        let empty = SaleRequest::paid(vec![], PaymentMethod::Cash);
        assert!(matches!(empty.validate(), Err(LedgerError::EmptyCart)));

        let mut credit = SaleRequest::paid(vec![item("p-1", 1)], PaymentMethod::Cash);
        credit.payment_status = PaymentStatus::Credit;
        assert!(matches!(credit.validate(), Err(LedgerError::MissingCustomer)));

        let mut invoice = SaleRequest::paid(vec![item("p-1", 1)], PaymentMethod::Cash).for_customer("c-1");
        invoice.payment_status = PaymentStatus::Invoice;
        assert!(matches!(invoice.validate(), Err(LedgerError::MissingInvoiceNumber)));

        let bad_qty = SaleRequest::paid(vec![item("p-1", 0)], PaymentMethod::Cash);
        assert!(matches!(bad_qty.validate(), Err(LedgerError::Validation(_))));

        let bad_discount = SaleRequest::paid(vec![item("p-1", 1)], PaymentMethod::Cash)
            .with_order_discount(Adjustment::percent_bps(20_000));
        assert!(matches!(bad_discount.validate(), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_check_stock_sums_repeated_lines() {
        let product = Product {
            id: "p-1".to_string(),
            name: "Widget".to_string(),
            sku: None,
            price: Money::from_cents(500),
            cost: Money::from_cents(200),
            stock: 4,
            supplier_id: None,
            low_stock_threshold: None,
            created_at: Utc::now(),
            version: 1,
        };

        assert!(check_stock(&[item("p-1", 2), item("p-1", 2)], &[product.clone()]).is_ok());
        let err = check_stock(&[item("p-1", 2), item("p-1", 3)], &[product]).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientStock { available: 4, requested: 5, .. }
        ));
    }
}
