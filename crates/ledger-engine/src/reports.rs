//! # Reports
//!
//! Read-side views. Each call takes a fresh snapshot from the store and
//! hands it to the pure aggregations in `ledger_core::report`; nothing is
//! cached. Calendar days are local days.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use ledger_core::report::{self, FinancialSummary, PeriodSummary, TopProduct};
use ledger_core::{Product, Sale};
use ledger_db::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LedgerResult;

/// Finalized sales between two local dates, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Newest first.
    pub sales: Vec<Sale>,
    pub summary: PeriodSummary,
}

/// Report queries over a shared store.
pub struct Reports<S> {
    store: Arc<S>,
    top_products_limit: usize,
}

impl<S> Clone for Reports<S> {
    fn clone(&self) -> Self {
        Reports {
            store: Arc::clone(&self.store),
            top_products_limit: self.top_products_limit,
        }
    }
}

impl<S: RecordStore> Reports<S> {
    pub fn new(store: Arc<S>, top_products_limit: usize) -> Self {
        Reports {
            store,
            top_products_limit,
        }
    }

    /// Active products at or below their minimum threshold.
    pub async fn low_stock(&self) -> LedgerResult<Vec<Product>> {
        let products = self.store.select_products().await?;
        let low = report::low_stock(&products);
        debug!(count = low.len(), "Low stock report");
        Ok(low)
    }

    /// Count, revenue and average ticket for `[start, end]`.
    pub async fn period(&self, start: NaiveDate, end: NaiveDate) -> LedgerResult<PeriodReport> {
        let sales = self.store.select_sales().await?;
        let sales = report::sales_in_period(&sales, start, end, &Local);
        let summary = PeriodSummary::of(&sales);

        debug!(%start, %end, count = summary.sale_count, "Period report");
        Ok(PeriodReport {
            start,
            end,
            sales,
            summary,
        })
    }

    /// Best sellers, limited to the configured row count.
    pub async fn top_products(&self) -> LedgerResult<Vec<TopProduct>> {
        self.top_products_limited(self.top_products_limit).await
    }

    /// Best sellers, at most `limit` rows.
    pub async fn top_products_limited(&self, limit: usize) -> LedgerResult<Vec<TopProduct>> {
        let sales = self.store.select_sales().await?;
        let items = self.store.select_sale_items().await?;
        let products = self.store.select_products().await?;

        Ok(report::top_products(&sales, &items, &products, limit))
    }

    /// Today and this month, payment breakdown and low-stock count.
    pub async fn financial_summary(&self) -> LedgerResult<FinancialSummary> {
        self.financial_summary_on(Local::now().date_naive()).await
    }

    /// The financial summary as seen on `date`.
    pub async fn financial_summary_on(&self, date: NaiveDate) -> LedgerResult<FinancialSummary> {
        let sales = self.store.select_sales().await?;
        let products = self.store.select_products().await?;

        Ok(report::financial_summary(&sales, &products, date, &Local))
    }
}
