//! # Stock History
//!
//! Every stock mutation writes a [`StockUpdate`]. Ordered by creation, a
//! product's updates form a chain:
//!
//! ```text
//!   initial 10
//!      │  sale −2          new_supply +24       correction −1
//!      ▼                   ▼                    ▼
//!   [10 → 8] ────────► [8 → 32] ─────────► [32 → 31] ──► product.stock == 31
//! ```
//!
//! Each link must satisfy `previous + change == new`, each `previous` must
//! equal the prior link's `new`, and the last `new` must equal the product's
//! current stock. Replaying the chain is how the dashboard audits inventory.

use crate::error::{CoreError, CoreResult};
use crate::types::{Product, StockReason, StockUpdate};

/// Result of a successful replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockReplay {
    pub initial_stock: i64,
    pub final_stock: i64,
    pub updates: usize,
    pub units_sold: i64,
    pub units_received: i64,
}

/// Replays `updates` (already ordered) starting from `initial_stock`.
///
/// Returns the replay summary or the first broken link.
pub fn replay_stock_history(initial_stock: i64, updates: &[StockUpdate]) -> CoreResult<StockReplay> {
    let mut stock = initial_stock;
    let mut units_sold = 0;
    let mut units_received = 0;

    for update in updates {
        if update.previous_stock != stock {
            return Err(CoreError::BrokenStockChain {
                update_id: update.id.clone(),
                expected: stock,
                found: update.previous_stock,
            });
        }
        if !update.is_consistent() {
            return Err(CoreError::InconsistentStockUpdate {
                update_id: update.id.clone(),
                previous: update.previous_stock,
                change: update.quantity_change,
                new: update.new_stock,
            });
        }

        match update.reason {
            StockReason::Sale => units_sold -= update.quantity_change,
            StockReason::NewSupply => units_received += update.quantity_change,
            StockReason::Return => units_sold -= update.quantity_change,
            StockReason::Correction => {}
        }
        stock = update.new_stock;
    }

    Ok(StockReplay {
        initial_stock,
        final_stock: stock,
        updates: updates.len(),
        units_sold,
        units_received,
    })
}

/// Verifies a product's full audit trail against its current stock.
///
/// The chain's starting point is the first update's `previous_stock` (the
/// stock the product was created with). A product with no updates trivially
/// verifies.
pub fn verify_stock_history(product: &Product, updates: &[StockUpdate]) -> CoreResult<StockReplay> {
    let initial = updates
        .first()
        .map(|u| u.previous_stock)
        .unwrap_or(product.stock);

    let replay = replay_stock_history(initial, updates)?;

    if replay.final_stock != product.stock {
        return Err(CoreError::StockMismatch {
            product_id: product.id.clone(),
            replayed: replay.final_stock,
            current: product.stock,
        });
    }

    Ok(replay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use chrono::Utc;

    fn update(id: &str, prev: i64, change: i64, reason: StockReason) -> StockUpdate {
        StockUpdate {
            id: id.to_string(),
            product_id: "p-1".to_string(),
            quantity_change: change,
            previous_stock: prev,
            new_stock: prev + change,
            reason,
            reference_id: None,
            actor_id: "cashier".to_string(),
            note: None,
            created_at: Utc::now(),
        }
    }

    fn product(stock: i64) -> Product {
        Product {
            id: "p-1".to_string(),
            name: "Rice 5kg".to_string(),
            sku: None,
            price: Money::from_cents(1200),
            cost: Money::from_cents(900),
            stock,
            supplier_id: None,
            low_stock_threshold: None,
            created_at: Utc::now(),
            version: 1,
        }
    }

    #[test]
    fn replays_a_valid_chain() {
        let history = vec![
            update("a", 10, -2, StockReason::Sale),
            update("b", 8, 24, StockReason::NewSupply),
            update("c", 32, 1, StockReason::Return),
            update("d", 33, -2, StockReason::Correction),
        ];

        let replay = verify_stock_history(&product(31), &history).unwrap();
        assert_eq!(replay.initial_stock, 10);
        assert_eq!(replay.final_stock, 31);
        assert_eq!(replay.units_sold, 1);
        assert_eq!(replay.units_received, 24);
    }

    #[test]
    fn detects_missing_link() {
        let history = vec![
            update("a", 10, -2, StockReason::Sale),
            update("b", 7, -1, StockReason::Sale),
        ];

        let err = replay_stock_history(10, &history).unwrap_err();
        assert!(matches!(
            err,
            CoreError::BrokenStockChain { ref update_id, expected: 8, found: 7 } if update_id == "b"
        ));
    }

    #[test]
    fn detects_bad_arithmetic() {
        let mut bad = update("a", 10, -2, StockReason::Sale);
        bad.new_stock = 9;

        let err = replay_stock_history(10, &[bad]).unwrap_err();
        assert!(matches!(err, CoreError::InconsistentStockUpdate { .. }));
    }

    #[test]
    fn detects_untracked_stock_change() {
        let history = vec![update("a", 10, -2, StockReason::Sale)];
        let err = verify_stock_history(&product(5), &history).unwrap_err();
        assert!(matches!(err, CoreError::StockMismatch { replayed: 8, current: 5, .. }));
    }

    #[test]
    fn empty_history_verifies() {
        let replay = verify_stock_history(&product(12), &[]).unwrap();
        assert_eq!(replay.final_stock, 12);
        assert_eq!(replay.updates, 0);
    }
}
