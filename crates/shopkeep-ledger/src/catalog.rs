//! # Catalog
//!
//! Creating and reading the documents the ledger works on: products,
//! customers, bills, and lookups over sales and payments.
//!
//! Creation is plain: nothing else depends on a document that does not exist
//! yet, so no version conditions are needed. The one exception is a product
//! created with opening stock, which gets its first audit row in the same
//! batch so the stock history replays from zero.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shopkeep_core::validation::{validate_name, validate_price};
use shopkeep_core::{
    Actor, Bill, BillStatus, Customer, CustomerKind, Money, Payment, Product, Recurrence, Sale,
    StockReason, StockUpdate, ValidationError,
};
use shopkeep_store::{decode_all, to_document, Collection, Filter, WriteOp};
use tracing::info;
use uuid::Uuid;

use crate::engine::SaleLedgerEngine;
use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Money,
    pub cost: Money,
    /// Units on the shelf when the product is added.
    #[serde(default)]
    pub opening_stock: i64,
    #[serde(default)]
    pub supplier_id: Option<String>,
    #[serde(default)]
    pub low_stock_threshold: Option<i64>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money, cost: Money) -> Self {
        NewProduct {
            name: name.into(),
            sku: None,
            price,
            cost,
            opening_stock: 0,
            supplier_id: None,
            low_stock_threshold: None,
        }
    }

    pub fn with_stock(mut self, stock: i64) -> Self {
        self.opening_stock = stock;
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub kind: CustomerKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>, kind: CustomerKind) -> Self {
        NewCustomer {
            name: name.into(),
            kind,
            phone: None,
            email: None,
            address: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBill {
    pub vendor: String,
    #[serde(default)]
    pub description: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

impl NewBill {
    pub fn new(vendor: impl Into<String>, amount: Money, due_date: NaiveDate) -> Self {
        NewBill {
            vendor: vendor.into(),
            description: String::new(),
            amount,
            due_date,
            category: String::new(),
            recurrence: None,
        }
    }

    pub fn recurring(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = Some(recurrence);
        self
    }
}

// =============================================================================
// Create
// =============================================================================

impl SaleLedgerEngine {
    pub async fn create_product(&self, new: NewProduct, actor: &Actor) -> LedgerResult<Product> {
        validate_name("name", &new.name)?;
        validate_price("price", new.price)?;
        validate_price("cost", new.cost)?;
        if new.opening_stock < 0 {
            return Err(ValidationError::OutOfRange {
                field: "opening_stock".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            sku: new.sku,
            price: new.price,
            cost: new.cost,
            stock: new.opening_stock,
            supplier_id: new.supplier_id,
            low_stock_threshold: new.low_stock_threshold,
            created_at: now,
            version: 0,
        };

        let mut ops = vec![WriteOp::create_with_id(
            Collection::Products,
            product.id.clone(),
            to_document(&product)?,
        )];
        if product.stock > 0 {
            let opening = StockUpdate {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                quantity_change: product.stock,
                previous_stock: 0,
                new_stock: product.stock,
                reason: StockReason::NewSupply,
                reference_id: None,
                actor_id: actor.id.clone(),
                note: Some("opening stock".to_string()),
                created_at: now,
            };
            ops.push(WriteOp::create_with_id(
                Collection::StockUpdates,
                opening.id.clone(),
                to_document(&opening)?,
            ));
        }

        let records = self.store().batch_commit(ops).await?;
        let product: Product = first(&records)?.decode()?;
        info!(product_id = %product.id, name = %product.name, stock = product.stock, "Product created");
        Ok(product)
    }

    pub async fn create_customer(&self, new: NewCustomer) -> LedgerResult<Customer> {
        validate_name("name", &new.name)?;

        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            kind: new.kind,
            phone: new.phone,
            email: new.email,
            address: new.address,
            credit_balance: Money::zero(),
            created_at: Utc::now(),
            version: 0,
        };

        let record = self
            .store()
            .create(Collection::Customers, to_document(&customer)?)
            .await?;
        let customer: Customer = record.decode()?;
        info!(customer_id = %customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    pub async fn create_bill(&self, new: NewBill) -> LedgerResult<Bill> {
        validate_name("vendor", &new.vendor)?;
        if !new.amount.is_positive() {
            return Err(ValidationError::must_be_positive("amount").into());
        }
        validate_price("amount", new.amount)?;
        if let Some(recurrence) = &new.recurrence {
            recurrence.validate()?;
        }

        let bill = Bill {
            id: Uuid::new_v4().to_string(),
            vendor: new.vendor.trim().to_string(),
            description: new.description,
            amount: new.amount,
            due_date: new.due_date,
            status: BillStatus::Unpaid,
            category: new.category,
            recurrence: new.recurrence,
            previous_bill_id: None,
            paid_at: None,
            created_at: Utc::now(),
            version: 0,
        };

        let record = self
            .store()
            .create(Collection::Bills, to_document(&bill)?)
            .await?;
        let bill: Bill = record.decode()?;
        info!(bill_id = %bill.id, vendor = %bill.vendor, due = %bill.due_date, "Bill created");
        Ok(bill)
    }

    // =========================================================================
    // Read
    // =========================================================================

    pub async fn product(&self, id: &str) -> LedgerResult<Product> {
        self.read_product(id).await
    }

    pub async fn products(&self) -> LedgerResult<Vec<Product>> {
        self.all(Collection::Products).await
    }

    pub async fn customer(&self, id: &str) -> LedgerResult<Customer> {
        self.read_customer(id).await
    }

    pub async fn customers(&self) -> LedgerResult<Vec<Customer>> {
        self.all(Collection::Customers).await
    }

    pub async fn sale(&self, id: &str) -> LedgerResult<Sale> {
        let record = self
            .store()
            .get(Collection::Sales, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("sale", id))?;
        Ok(record.decode()?)
    }

    /// Sales whose business date falls in `from..=to`, oldest first.
    pub async fn sales_between(&self, from: NaiveDate, to: NaiveDate) -> LedgerResult<Vec<Sale>> {
        let (start, _) = self.clock().day_bounds(from);
        let (_, end) = self.clock().day_bounds(to);
        let records = self
            .store()
            .query(Collection::Sales, &Filter::all().created_between(start, end))
            .await?;
        Ok(decode_all(&records)?)
    }

    pub async fn sales_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<Sale>> {
        let records = self
            .store()
            .query(Collection::Sales, &Filter::all().eq("customer_id", json!(customer_id)))
            .await?;
        Ok(decode_all(&records)?)
    }

    pub async fn bill(&self, id: &str) -> LedgerResult<Bill> {
        let record = self
            .store()
            .get(Collection::Bills, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("bill", id))?;
        Ok(record.decode()?)
    }

    pub async fn unpaid_bills(&self) -> LedgerResult<Vec<Bill>> {
        let records = self
            .store()
            .query(Collection::Bills, &Filter::all().eq("status", json!(BillStatus::Unpaid)))
            .await?;
        Ok(decode_all(&records)?)
    }

    /// Payments applied to one sale, oldest first.
    pub async fn payments_for_sale(&self, sale_id: &str) -> LedgerResult<Vec<Payment>> {
        let records = self
            .store()
            .query(Collection::Payments, &Filter::all().eq("target.sale_id", json!(sale_id)))
            .await?;
        Ok(decode_all(&records)?)
    }

    pub async fn payments_for_customer(&self, customer_id: &str) -> LedgerResult<Vec<Payment>> {
        let records = self
            .store()
            .query(
                Collection::Payments,
                &Filter::all().eq("target.customer_id", json!(customer_id)),
            )
            .await?;
        Ok(decode_all(&records)?)
    }

    async fn all<T: serde::de::DeserializeOwned>(&self, collection: Collection) -> LedgerResult<Vec<T>> {
        let records = self.store().query(collection, &Filter::all()).await?;
        Ok(decode_all(&records)?)
    }
}

pub(crate) fn first(records: &[shopkeep_store::Record]) -> LedgerResult<&shopkeep_store::Record> {
    records.first().ok_or_else(|| {
        LedgerError::Persistence(shopkeep_store::StoreError::Internal(
            "batch returned no records".to_string(),
        ))
    })
}
