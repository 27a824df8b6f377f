//! # Inventory Movements
//!
//! Stock changes outside of a sale. Each movement is one batch: the audit
//! row and the product's new stock, written on the product version read.
//!
//! ```text
//! receive_supply(p, +12)      stock 3  ──► 15    reason new_supply
//! record_return(p, +1, sale)  stock 15 ──► 16    reason return
//! correct_stock(p, 14, note)  stock 16 ──► 14    reason correction
//! ```

use chrono::Utc;
use serde_json::json;
use shopkeep_core::stock::{verify_stock_history, StockReplay};
use shopkeep_core::validation::{validate_movement_quantity, validate_name};
use shopkeep_core::{Actor, StockReason, StockUpdate, ValidationError};
use shopkeep_store::{decode_all, Collection, Filter};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog::first;
use crate::engine::SaleLedgerEngine;
use crate::error::LedgerResult;
use crate::mutator::stock_movement_batch;

/// How a movement changes the count.
#[derive(Debug, Clone, Copy)]
enum Change {
    By(i64),
    To(i64),
}

#[derive(Debug, Clone)]
struct Movement<'a> {
    change: Change,
    reason: StockReason,
    reference_id: Option<&'a str>,
    note: Option<&'a str>,
}

impl SaleLedgerEngine {
    /// Adds delivered units to a product.
    pub async fn receive_supply(
        &self,
        product_id: &str,
        quantity: i64,
        note: Option<&str>,
        actor: &Actor,
    ) -> LedgerResult<StockUpdate> {
        validate_movement_quantity(quantity)?;
        self.move_stock(
            "receive_supply",
            product_id,
            Movement {
                change: Change::By(quantity),
                reason: StockReason::NewSupply,
                reference_id: None,
                note,
            },
            actor,
        )
        .await
    }

    /// Puts returned units back on the shelf, optionally against the sale
    /// they came from.
    pub async fn record_return(
        &self,
        product_id: &str,
        quantity: i64,
        sale_id: Option<&str>,
        actor: &Actor,
    ) -> LedgerResult<StockUpdate> {
        validate_movement_quantity(quantity)?;
        if let Some(sale_id) = sale_id {
            self.sale(sale_id).await?;
        }
        self.move_stock(
            "record_return",
            product_id,
            Movement {
                change: Change::By(quantity),
                reason: StockReason::Return,
                reference_id: sale_id,
                note: None,
            },
            actor,
        )
        .await
    }

    /// Sets the stock to a physical count. A note is required.
    pub async fn correct_stock(
        &self,
        product_id: &str,
        counted: i64,
        note: &str,
        actor: &Actor,
    ) -> LedgerResult<StockUpdate> {
        validate_name("note", note)?;
        if counted < 0 {
            return Err(ValidationError::OutOfRange {
                field: "counted".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        self.move_stock(
            "correct_stock",
            product_id,
            Movement {
                change: Change::To(counted),
                reason: StockReason::Correction,
                reference_id: None,
                note: Some(note.trim()),
            },
            actor,
        )
        .await
    }

    /// Audit trail of one product, oldest first.
    pub async fn stock_history(&self, product_id: &str) -> LedgerResult<Vec<StockUpdate>> {
        let records = self
            .store()
            .query(
                Collection::StockUpdates,
                &Filter::all().eq("product_id", json!(product_id)),
            )
            .await?;
        Ok(decode_all(&records)?)
    }

    /// Replays the audit trail and checks it lands on the current stock.
    ///
    /// Fails with `StockAudit` at the first broken entry.
    pub async fn verify_stock(&self, product_id: &str) -> LedgerResult<StockReplay> {
        let product = self.read_product(product_id).await?;
        let history = self.stock_history(product_id).await?;
        verify_stock_history(&product, &history).map_err(|err| {
            warn!(product_id, error = %err, "Stock history does not replay");
            err.into()
        })
    }

    async fn move_stock(
        &self,
        operation: &'static str,
        product_id: &str,
        movement: Movement<'_>,
        actor: &Actor,
    ) -> LedgerResult<StockUpdate> {
        let movement = &movement;
        let update = self
            .with_conflict_retry(operation, move || self.try_move_stock(product_id, movement, actor))
            .await?;

        info!(
            product_id,
            reason = ?update.reason,
            change = update.quantity_change,
            stock = update.new_stock,
            "Stock moved"
        );
        Ok(update)
    }

    async fn try_move_stock(
        &self,
        product_id: &str,
        movement: &Movement<'_>,
        actor: &Actor,
    ) -> LedgerResult<StockUpdate> {
        let product = self.read_product(product_id).await?;
        let quantity_change = match movement.change {
            Change::By(delta) => Some(delta),
            Change::To(count) => count.checked_sub(product.stock),
        };
        let (quantity_change, new_stock) = quantity_change
            .and_then(|change| Some((change, product.stock.checked_add(change)?)))
            .ok_or_else(|| ValidationError::OutOfRange {
                field: "stock".to_string(),
                min: i64::MIN,
                max: i64::MAX,
            })?;

        let update = StockUpdate {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            quantity_change,
            previous_stock: product.stock,
            new_stock,
            reason: movement.reason,
            reference_id: movement.reference_id.map(str::to_string),
            actor_id: actor.id.clone(),
            note: movement.note.map(str::to_string),
            created_at: Utc::now(),
        };

        let records = self
            .store()
            .batch_commit(stock_movement_batch(&product, &update)?)
            .await?;
        Ok(first(&records)?.decode()?)
    }
}
