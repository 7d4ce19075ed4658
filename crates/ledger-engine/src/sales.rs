//! # Sales Desk
//!
//! Builds, commits, cancels and looks up sales.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SaleBuilder ──add_item()──► LineItems ──checkout()──► SaleDraft        │
//! │  (stock checked, not held)                    (discount + payment)      │
//! │                                                      │                  │
//! │                                                 commit()                │
//! │                                                      │                  │
//! │     ┌──────────────── one store transaction ─────────┴───────────┐      │
//! │     │ insert header ─► for each line: insert item, take stock     │      │
//! │     │ any failure ──► rollback, nothing persisted                 │      │
//! │     └─────────────────────────────────────────────────────────────┘      │
//! │                                                      │                  │
//! │                                              Sale (Finalized)           │
//! │                                                      │                  │
//! │                                                 cancel()                │
//! │                                                      │                  │
//! │     ┌──────────────── one store transaction ─────────┴───────────┐      │
//! │     │ flip Finalized→Cancelled (conditional) ─► restore stock     │      │
//! │     └─────────────────────────────────────────────────────────────┘      │
//! │                                                      │                  │
//! │                                              Sale (Cancelled)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The builder only checks availability. Another sale may take the stock
//! before this one commits; the conditional decrement in `commit` catches
//! that and reports `InsufficientStock`.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Local, NaiveDate, SubsecRound};
use ledger_core::pricing::{self, SaleStamp};
use ledger_core::report::{self, PeriodSummary};
use ledger_core::validation::normalize_code;
use ledger_core::{
    CoreError, LineItem, Product, Sale, SaleBuilder, SaleDraft, SaleItem, SaleStatus,
    ValidationError,
};
use ledger_db::{DbError, RecordStore, StockChange, StockUpdate, StoreTransaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{CommitStage, LedgerError, LedgerResult};

// =============================================================================
// Results
// =============================================================================

/// A sale as persisted by [`SalesDesk::commit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Outcome of [`SalesDesk::cancel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// The sale, now Cancelled.
    pub sale: Sale,
    /// Items whose stock was put back.
    pub restored: usize,
    /// Product ids of items skipped because the product no longer exists.
    pub skipped: Vec<i64>,
}

/// Finalized sales of one local date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySales {
    pub date: NaiveDate,
    /// Newest first.
    pub sales: Vec<Sale>,
    pub summary: PeriodSummary,
}

/// One item of a sale with the product it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub item: SaleItem,
    /// `None` when the product record is gone. Removed products still show.
    pub product: Option<Product>,
}

/// A sale with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleDetail {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Sale Clock
// =============================================================================

/// Hands out strictly increasing microsecond instants for sale numbers.
///
/// Two sales stamped in the same microsecond would collide on the unique
/// sale number, so a repeat is pushed one microsecond past the last stamp.
#[derive(Debug, Clone, Default)]
pub(crate) struct SaleClock {
    last: Arc<Mutex<Option<DateTime<Local>>>>,
}

impl SaleClock {
    pub(crate) fn next(&self) -> SaleStamp {
        let mut now = Local::now().trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(previous) = *last {
            if now <= previous {
                now = previous + Duration::microseconds(1);
            }
        }
        *last = Some(now);

        SaleStamp::at(now)
    }
}

// =============================================================================
// Sales Desk
// =============================================================================

/// Sale operations over a shared store.
pub struct SalesDesk<S> {
    store: Arc<S>,
    clock: SaleClock,
}

impl<S> Clone for SalesDesk<S> {
    fn clone(&self) -> Self {
        SalesDesk {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
        }
    }
}

impl<S: RecordStore> SalesDesk<S> {
    pub fn new(store: Arc<S>) -> Self {
        SalesDesk::with_clock(store, SaleClock::default())
    }

    pub(crate) fn with_clock(store: Arc<S>, clock: SaleClock) -> Self {
        SalesDesk { store, clock }
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Looks up the active product `code` and adds `quantity` of it to
    /// `builder`.
    ///
    /// ## Errors
    /// - `ProductNotFound` when no active product has this code
    /// - `InvalidQuantity` when `quantity <= 0`
    /// - `InsufficientStock` when the builder would hold more than is in stock
    /// - `Validation(OutOfRange)` when the line or sale total would not fit
    ///   in cents
    ///
    /// Stock is read, never written.
    pub async fn add_item(
        &self,
        builder: &mut SaleBuilder,
        code: &str,
        quantity: i64,
    ) -> LedgerResult<LineItem> {
        let code = normalize_code(code);
        let product = self
            .store
            .find_active_product(&code)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(code.clone()))?;

        let line = match builder.add_product(&product, quantity) {
            Ok(line) => line.clone(),
            Err(e) => {
                warn!(code = %code, quantity, error = %e, "Item rejected");
                return Err(e.into());
            }
        };

        debug!(
            code = %line.code,
            quantity,
            running_total = %builder.current_total(),
            "Added item"
        );
        Ok(line)
    }

    /// Prices the builder's lines into a draft stamped with a fresh sale
    /// number.
    pub fn checkout(
        &self,
        builder: SaleBuilder,
        discount_input: &str,
        payment_choice: &str,
        notes: Option<String>,
    ) -> LedgerResult<SaleDraft> {
        let items = builder.finish()?;
        let draft = pricing::checkout(items, discount_input, payment_choice, notes, self.clock.next())?;

        if draft.final_total().is_negative() {
            warn!(
                number = %draft.number,
                final_total = %draft.final_total(),
                "Discount exceeds subtotal"
            );
        }
        Ok(draft)
    }

    /// Checkout and commit in one call.
    pub async fn complete(
        &self,
        builder: SaleBuilder,
        discount_input: &str,
        payment_choice: &str,
        notes: Option<String>,
    ) -> LedgerResult<CommittedSale> {
        let draft = self.checkout(builder, discount_input, payment_choice, notes)?;
        self.commit(draft).await
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Persists the draft: header, then each item with its stock decrement,
    /// all in one store transaction.
    ///
    /// ## Errors
    /// - `EmptySale` for a draft without items (nothing is written)
    /// - `SaleWriteFailed` when the header is rejected
    /// - `InsufficientStock` / `ProductNotFound` when a decrement no longer
    ///   fits; the whole sale is rolled back
    /// - `PartialCommitFailure` when a later write fails
    pub async fn commit(&self, draft: SaleDraft) -> LedgerResult<CommittedSale> {
        if draft.items.is_empty() {
            return Err(CoreError::EmptySale.into());
        }

        let mut tx = self.store.begin().await?;

        let sale = match tx.insert_sale(&draft).await {
            Ok(sale) => sale,
            Err(source) => {
                warn!(number = %draft.number, error = %source, "Sale header rejected");
                if let Err(rollback) = tx.rollback().await {
                    error!(number = %draft.number, error = %rollback, "Rollback failed");
                }
                return Err(LedgerError::SaleWriteFailed { source });
            }
        };

        let mut items = Vec::with_capacity(draft.items.len());
        for (index, line) in draft.items.iter().enumerate() {
            let product_id = line.product_id;

            match tx.insert_sale_item(sale.id, line).await {
                Ok(item) => items.push(item),
                Err(source) => {
                    let stage = CommitStage::LineItem { index, product_id };
                    return Err(abort(tx, &draft.number, stage, source).await);
                }
            }

            let rejection = match tx.apply_stock(product_id, StockChange::Take(line.quantity)).await {
                Ok(StockUpdate::Applied { current, .. }) => {
                    debug!(code = %line.code, quantity = line.quantity, remaining = current, "Stock taken");
                    continue;
                }
                Ok(StockUpdate::Insufficient { available }) => CoreError::InsufficientStock {
                    code: line.code.clone(),
                    available,
                    requested: line.quantity,
                },
                Ok(StockUpdate::Missing) => CoreError::ProductNotFound(line.code.clone()),
                Ok(StockUpdate::OutOfRange { current }) => ValidationError::OutOfRange {
                    field: "quantity".into(),
                    min: 1,
                    max: current,
                }
                .into(),
                Err(source) => {
                    let stage = CommitStage::StockDecrement { index, product_id };
                    return Err(abort(tx, &draft.number, stage, source).await);
                }
            };

            warn!(number = %draft.number, error = %rejection, "Sale rejected at commit");
            let stage = CommitStage::StockDecrement { index, product_id };
            return Err(reject(tx, &draft.number, stage, rejection).await);
        }

        if let Err(source) = tx.commit().await {
            error!(number = %draft.number, error = %source, "Sale commit failed");
            // An unfinished commit leaves the transaction unapplied
            return Err(LedgerError::PartialCommitFailure {
                sale_number: draft.number,
                stage: CommitStage::Finalize,
                rolled_back: true,
                source,
            });
        }

        info!(
            number = %sale.number,
            items = items.len(),
            total = %sale.final_total(),
            payment = sale.payment_method.label(),
            "Sale committed"
        );
        Ok(CommittedSale { sale, items })
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancels a finalized sale and puts its stock back.
    ///
    /// Products that were removed since the sale get their stock back too.
    /// Items whose product record is gone are skipped with a warning.
    ///
    /// ## Errors
    /// - `SaleNotFound` when the number is unknown or already cancelled;
    ///   stock is untouched
    /// - `Validation(OutOfRange)` when a restored level would not fit in an
    ///   `i64`; nothing changes
    /// - `PartialCommitFailure` when a write fails (rolled back)
    pub async fn cancel(&self, number: &str) -> LedgerResult<Cancellation> {
        let number = number.trim();
        let mut tx = self.store.begin().await?;

        let sale = match tx
            .transition_sale(number, SaleStatus::Finalized, SaleStatus::Cancelled)
            .await
        {
            Ok(Some(sale)) => sale,
            Ok(None) => {
                warn!(number, "Cancel rejected: no finalized sale");
                let stage = CommitStage::StatusFlip;
                return Err(reject(tx, number, stage, CoreError::SaleNotFound(number.to_string())).await);
            }
            Err(source) => return Err(abort(tx, number, CommitStage::StatusFlip, source).await),
        };

        let items = match tx.sale_items(sale.id).await {
            Ok(items) => items,
            Err(source) => return Err(abort(tx, number, CommitStage::ItemLookup, source).await),
        };

        let mut restored = 0;
        let mut skipped = Vec::new();
        for item in &items {
            let stage = CommitStage::StockRestore {
                product_id: item.product_id,
            };
            match tx.apply_stock(item.product_id, StockChange::Restore(item.quantity)).await {
                Ok(StockUpdate::Applied { current, .. }) => {
                    debug!(product_id = item.product_id, quantity = item.quantity, current, "Stock restored");
                    restored += 1;
                }
                Ok(StockUpdate::OutOfRange { current }) => {
                    warn!(number, product_id = item.product_id, current, "Restored stock would overflow");
                    let rejection = ValidationError::OutOfRange {
                        field: "stock_quantity".into(),
                        min: 0,
                        max: i64::MAX - item.quantity,
                    };
                    return Err(reject(tx, number, stage, rejection.into()).await);
                }
                Ok(other) => {
                    warn!(number, product_id = item.product_id, ?other, "Product gone; stock not restored");
                    skipped.push(item.product_id);
                }
                Err(source) => return Err(abort(tx, number, stage, source).await),
            }
        }

        if let Err(source) = tx.commit().await {
            error!(number, error = %source, "Cancellation commit failed");
            return Err(LedgerError::PartialCommitFailure {
                sale_number: number.to_string(),
                stage: CommitStage::Finalize,
                rolled_back: true,
                source,
            });
        }

        info!(number, restored, skipped = skipped.len(), "Sale cancelled");
        Ok(Cancellation {
            sale,
            restored,
            skipped,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Finalized sales of a local date, newest first, with count and revenue.
    pub async fn sales_of_day(&self, date: NaiveDate) -> LedgerResult<DaySales> {
        let sales = self.store.select_sales().await?;
        let sales = report::sales_in_period(&sales, date, date, &Local);
        let summary = PeriodSummary::of(&sales);

        Ok(DaySales {
            date,
            sales,
            summary,
        })
    }

    /// A sale (any status) with its items and their products.
    pub async fn sale_detail(&self, number: &str) -> LedgerResult<Option<SaleDetail>> {
        let Some(sale) = self.store.find_sale(number.trim()).await? else {
            return Ok(None);
        };

        let items = self.store.find_sale_items(sale.id).await?;
        let products = self.store.select_products().await?;

        let lines = items
            .into_iter()
            .map(|item| {
                let product = products.iter().find(|p| p.id == item.product_id).cloned();
                SaleLine { item, product }
            })
            .collect();

        Ok(Some(SaleDetail { sale, lines }))
    }
}

// =============================================================================
// Rollback Helpers
// =============================================================================

/// Rolls back after a store failure at `stage`.
async fn abort(
    tx: Box<dyn StoreTransaction>,
    sale_number: &str,
    stage: CommitStage,
    source: DbError,
) -> LedgerError {
    error!(number = sale_number, %stage, error = %source, "Store write failed");

    let rolled_back = match tx.rollback().await {
        Ok(()) => true,
        Err(rollback) => {
            error!(number = sale_number, %stage, error = %rollback, "Rollback failed");
            false
        }
    };

    LedgerError::PartialCommitFailure {
        sale_number: sale_number.to_string(),
        stage,
        rolled_back,
        source,
    }
}

/// Rolls back after a business rule rejected the write at `stage`.
///
/// The rule violation is returned unless the rollback itself fails.
async fn reject(
    tx: Box<dyn StoreTransaction>,
    sale_number: &str,
    stage: CommitStage,
    rejection: CoreError,
) -> LedgerError {
    match tx.rollback().await {
        Ok(()) => rejection.into(),
        Err(source) => {
            error!(number = sale_number, %stage, error = %source, "Rollback failed");
            LedgerError::PartialCommitFailure {
                sale_number: sale_number.to_string(),
                stage,
                rolled_back: false,
                source,
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
