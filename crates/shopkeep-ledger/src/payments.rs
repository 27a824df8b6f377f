//! # Payment Application
//!
//! Applies money to balances, on-account sales and vendor bills.
//!
//! ## Payment Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CUSTOMER PAYMENT         customer.balance = max(0, balance - amount)   │
//! │  ────────────────         + inbound Payment{balance_after}              │
//! │                                                                         │
//! │  INVOICE PAYMENT          amount <= total - prior payments on the sale  │
//! │  ───────────────          reduces the balance like a customer payment   │
//! │                           sale → paid once payments reach the total     │
//! │                                                                         │
//! │  BILL PAYMENT             bill → paid + outbound Payment                │
//! │  ────────────             recurring: successor bill due next period     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each operation is one batch. Documents it modifies are written on the
//! version it read; a lost race re-reads and retries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shopkeep_core::validation::validate_payment_amount;
use shopkeep_core::{
    Actor, Bill, BillStatus, Money, Payment, PaymentDirection, PaymentMethod, PaymentStatus,
    PaymentTarget, Sale,
};
use shopkeep_store::{to_document, Collection, Filter, WriteOp};
use tracing::info;
use uuid::Uuid;

use crate::catalog::first;
use crate::engine::SaleLedgerEngine;
use crate::error::{LedgerError, LedgerResult};
use crate::mutator::customer_balance_op;

/// Result of a payment against an on-account sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoicePayment {
    pub payment: Payment,
    /// The sale after the payment (paid when `fully_paid`).
    pub sale: Sale,
    /// Still owed on the sale after this payment.
    pub remaining: Money,
    pub fully_paid: bool,
}

/// Result of paying a vendor bill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillPayment {
    pub bill: Bill,
    pub payment: Payment,
    /// Next occurrence of a recurring bill.
    pub successor: Option<Bill>,
}

impl SaleLedgerEngine {
    // =========================================================================
    // Customer Payments
    // =========================================================================

    /// Records money received from a customer against their balance.
    ///
    /// The balance never goes below zero; an overpayment is accepted and the
    /// balance floors at zero.
    pub async fn apply_customer_payment(
        &self,
        customer_id: &str,
        amount: Money,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<Payment> {
        validate_payment_amount(amount)?;

        let payment = self
            .with_conflict_retry("apply_customer_payment", move || {
                self.try_customer_payment(customer_id, amount, method, actor)
            })
            .await?;

        info!(
            payment_id = %payment.id,
            customer_id,
            amount = %amount,
            balance_after = ?payment.balance_after_payment,
            "Customer payment applied"
        );
        Ok(payment)
    }

    // =========================================================================
    // Invoice Payments
    // =========================================================================

    /// Applies a payment to one credit or invoice sale.
    ///
    /// ## Errors
    /// - `NotOnAccount`: the sale was paid at the counter
    /// - `SaleAlreadyPaid`: earlier payments already settled it, or it was
    ///   recorded with nothing owed
    /// - `Overpayment`: `amount` exceeds what is still owed on the sale
    pub async fn apply_invoice_payment(
        &self,
        sale_id: &str,
        amount: Money,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<InvoicePayment> {
        validate_payment_amount(amount)?;

        let applied = self
            .with_conflict_retry("apply_invoice_payment", move || {
                self.try_invoice_payment(sale_id, amount, method, actor)
            })
            .await?;

        info!(
            payment_id = %applied.payment.id,
            sale_id,
            amount = %amount,
            remaining = %applied.remaining,
            fully_paid = applied.fully_paid,
            "Invoice payment applied"
        );
        Ok(applied)
    }

    // =========================================================================
    // Bill Payments
    // =========================================================================

    /// Pays a vendor bill in full.
    ///
    /// A recurring bill spawns its next occurrence, due one period after the
    /// paid bill's due date. The paid bill keeps its own due date.
    pub async fn apply_bill_payment(
        &self,
        bill_id: &str,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<BillPayment> {
        let paid = self
            .with_conflict_retry("apply_bill_payment", move || {
                self.try_bill_payment(bill_id, method, actor)
            })
            .await?;

        info!(
            bill_id,
            vendor = %paid.bill.vendor,
            amount = %paid.payment.amount,
            successor = ?paid.successor.as_ref().map(|b| b.due_date),
            "Bill paid"
        );
        Ok(paid)
    }

    /// Outbound payments, oldest first.
    pub async fn bill_payments(&self) -> LedgerResult<Vec<Payment>> {
        let records = self
            .store()
            .query(
                Collection::Payments,
                &Filter::all().eq("direction", json!(PaymentDirection::Outbound)),
            )
            .await?;
        Ok(shopkeep_store::decode_all(&records)?)
    }

    // =========================================================================
    // Single Attempts
    // =========================================================================

    async fn try_customer_payment(
        &self,
        customer_id: &str,
        amount: Money,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<Payment> {
        let customer = self.read_customer(customer_id).await?;
        let balance_after = customer.credit_balance.saturating_sub_floor(amount);
        let now = self.store().now()?;

        let payment = inbound_payment(
            PaymentTarget::Customer {
                customer_id: customer.id.clone(),
                sale_id: None,
            },
            amount,
            method,
            actor,
            balance_after,
            now,
        );

        let records = self
            .store()
            .batch_commit_at(
                vec![
                    payment_op(&payment)?,
                    customer_balance_op(&customer, balance_after),
                ],
                now,
            )
            .await?;
        Ok(first(&records)?.decode()?)
    }

    async fn try_invoice_payment(
        &self,
        sale_id: &str,
        amount: Money,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<InvoicePayment> {
        let sale = self.sale(sale_id).await?;
        let prior = self.payments_for_sale(sale_id).await?;
        let paid_so_far: Money = prior.iter().map(|p| p.amount).sum();

        if sale.payment_status == PaymentStatus::Paid {
            // Zero-total on-account sales are recorded as paid and never
            // take payments.
            let settled_on_account = sale.total.is_zero() && sale.customer_id.is_some();
            return Err(if prior.is_empty() && !settled_on_account {
                LedgerError::NotOnAccount { sale_id: sale.id }
            } else {
                LedgerError::SaleAlreadyPaid { sale_id: sale.id }
            });
        }

        let outstanding = sale.total.saturating_sub_floor(paid_so_far);
        if amount > outstanding {
            return Err(LedgerError::Overpayment {
                sale_id: sale.id,
                amount,
                outstanding,
            });
        }

        let customer_id = sale.customer_id.as_deref().ok_or(LedgerError::MissingCustomer)?;
        let customer = self.read_customer(customer_id).await?;
        let balance_after = customer.credit_balance.saturating_sub_floor(amount);
        let now = self.store().now()?;
        let remaining = outstanding - amount;
        let fully_paid = remaining.is_zero();

        let payment = inbound_payment(
            PaymentTarget::Customer {
                customer_id: customer.id.clone(),
                sale_id: Some(sale.id.clone()),
            },
            amount,
            method,
            actor,
            balance_after,
            now,
        );

        // The sale is always written on its read version, which serializes
        // partial payments against the outstanding amount.
        let sale_patch = if fully_paid {
            json!({
                "payment_status": PaymentStatus::Paid,
                "paid_at": payment.created_at,
            })
        } else {
            json!({})
        };

        let records = self
            .store()
            .batch_commit_at(
                vec![
                    payment_op(&payment)?,
                    customer_balance_op(&customer, balance_after),
                    WriteOp::update(Collection::Sales, sale.id.clone(), sale_patch)
                        .if_version(sale.version),
                ],
                now,
            )
            .await?;

        Ok(InvoicePayment {
            payment: records[0].decode()?,
            sale: records[2].decode()?,
            remaining,
            fully_paid,
        })
    }

    async fn try_bill_payment(
        &self,
        bill_id: &str,
        method: PaymentMethod,
        actor: &Actor,
    ) -> LedgerResult<BillPayment> {
        let bill = self.bill(bill_id).await?;
        if bill.is_paid() {
            return Err(LedgerError::BillAlreadyPaid { bill_id: bill.id });
        }

        let now = self.store().now()?;
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            target: PaymentTarget::Bill {
                bill_id: bill.id.clone(),
            },
            amount: bill.amount,
            direction: PaymentDirection::Outbound,
            method,
            actor_id: actor.id.clone(),
            balance_after_payment: None,
            created_at: now,
        };

        let mut ops = vec![
            WriteOp::update(
                Collection::Bills,
                bill.id.clone(),
                json!({ "status": BillStatus::Paid, "paid_at": now }),
            )
            .if_version(bill.version),
            payment_op(&payment)?,
        ];

        if let Some(recurrence) = bill.recurrence {
            let successor = Bill {
                id: Uuid::new_v4().to_string(),
                due_date: recurrence.next_due_date(bill.due_date)?,
                status: BillStatus::Unpaid,
                previous_bill_id: Some(bill.id.clone()),
                paid_at: None,
                created_at: now,
                version: 0,
                ..bill.clone()
            };
            ops.push(WriteOp::create_with_id(
                Collection::Bills,
                successor.id.clone(),
                to_document(&successor)?,
            ));
        }

        let records = self.store().batch_commit_at(ops, now).await?;
        Ok(BillPayment {
            bill: records[0].decode()?,
            payment: records[1].decode()?,
            successor: records.get(2).map(|r| r.decode()).transpose()?,
        })
    }
}

fn inbound_payment(
    target: PaymentTarget,
    amount: Money,
    method: PaymentMethod,
    actor: &Actor,
    balance_after: Money,
    at: DateTime<Utc>,
) -> Payment {
    Payment {
        id: Uuid::new_v4().to_string(),
        target,
        amount,
        direction: PaymentDirection::Inbound,
        method,
        actor_id: actor.id.clone(),
        balance_after_payment: Some(balance_after),
        created_at: at,
    }
}

fn payment_op(payment: &Payment) -> LedgerResult<WriteOp> {
    Ok(WriteOp::create_with_id(
        Collection::Payments,
        payment.id.clone(),
        to_document(payment)?,
    ))
}
