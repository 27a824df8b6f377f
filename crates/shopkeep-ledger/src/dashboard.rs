//! # Dashboard Reports
//!
//! Store-backed entry points for the pure reports in `shopkeep_core::reports`,
//! using the configured business clock, stock threshold and bill horizon.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shopkeep_core::reports::{
    bills_due, low_stock, receivables, summarize_sales, top_products, BillsDue, ProductPerformance,
    Receivable, ReportBucket, SalesSummary, TopProductsBy,
};
use shopkeep_core::{Money, Product};

use crate::engine::SaleLedgerEngine;
use crate::error::LedgerResult;

/// Everything the home screen shows for one business day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOverview {
    pub date: NaiveDate,
    /// `None` when nothing was sold.
    pub sales: Option<SalesSummary>,
    pub top_sellers: Vec<ProductPerformance>,
    pub low_stock: Vec<Product>,
    pub bills: BillsDue,
    pub receivables_total: Money,
}

impl SaleLedgerEngine {
    /// Sales grouped by bucket over the business dates `from..=to`.
    pub async fn sales_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        bucket: ReportBucket,
    ) -> LedgerResult<Vec<SalesSummary>> {
        let sales = self.sales_between(from, to).await?;
        Ok(summarize_sales(&sales, bucket, self.clock()))
    }

    pub async fn top_products(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        by: TopProductsBy,
        limit: usize,
    ) -> LedgerResult<Vec<ProductPerformance>> {
        let sales = self.sales_between(from, to).await?;
        Ok(top_products(&sales, by, limit))
    }

    pub async fn low_stock_products(&self) -> LedgerResult<Vec<Product>> {
        let products = self.products().await?;
        Ok(low_stock(&products, self.config().inventory.low_stock_threshold)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn bills_due(&self, today: NaiveDate) -> LedgerResult<BillsDue> {
        let bills = self.unpaid_bills().await?;
        Ok(bills_due(&bills, today, self.config().reports.bills_horizon_days))
    }

    pub async fn receivables(&self) -> LedgerResult<Vec<Receivable>> {
        let customers = self.customers().await?;
        Ok(receivables(&customers))
    }

    /// Overview for today's business date.
    pub async fn daily_overview(&self) -> LedgerResult<DailyOverview> {
        let today = self.business_date(Utc::now());
        let sales = self.sales_between(today, today).await?;

        Ok(DailyOverview {
            date: today,
            sales: summarize_sales(&sales, ReportBucket::Day, self.clock()).pop(),
            top_sellers: top_products(&sales, TopProductsBy::Revenue, 5),
            low_stock: self.low_stock_products().await?,
            bills: self.bills_due(today).await?,
            receivables_total: self.receivables().await?.iter().map(|r| r.balance).sum(),
        })
    }
}
