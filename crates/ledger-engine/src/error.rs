//! # Engine Error Type
//!
//! The single error type the UI collaborator sees.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Stockledger                            │
//! │                                                                         │
//! │  Catalog / SalesDesk / Reports                                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Business rule broken? ── CoreError ─────────► LedgerError::Core        │
//! │         │                                       (recoverable: re-prompt)│
//! │         ▼                                                               │
//! │  Header insert rejected? ── DbError ─────────► SaleWriteFailed          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Item / stock / flip failed? ── DbError ─────► PartialCommitFailure     │
//! │         │                                       { stage, rolled_back }  │
//! │         ▼                                                               │
//! │  Store could not be reached? ── DbError ─────► StoreUnavailable         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine never retries. A `PartialCommitFailure` with
//! `rolled_back == false` is the only case where the store may hold a
//! half-written sale.

use std::fmt;

use ledger_core::{CoreError, ValidationError};
use ledger_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Commit Stage
// =============================================================================

/// The step of a multi-record write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitStage {
    /// Writing the line item at `index`.
    LineItem { index: usize, product_id: i64 },
    /// Decrementing stock for the line item at `index`.
    StockDecrement { index: usize, product_id: i64 },
    /// Flipping a sale from Finalized to Cancelled.
    StatusFlip,
    /// Loading the items of a sale being cancelled.
    ItemLookup,
    /// Restoring stock for one item of a cancelled sale.
    StockRestore { product_id: i64 },
    /// Committing the store transaction.
    Finalize,
}

impl fmt::Display for CommitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStage::LineItem { index, product_id } => {
                write!(f, "line item #{} (product {})", index + 1, product_id)
            }
            CommitStage::StockDecrement { index, product_id } => {
                write!(f, "stock decrement #{} (product {})", index + 1, product_id)
            }
            CommitStage::StatusFlip => write!(f, "status change"),
            CommitStage::ItemLookup => write!(f, "item lookup"),
            CommitStage::StockRestore { product_id } => {
                write!(f, "stock restore (product {})", product_id)
            }
            CommitStage::Finalize => write!(f, "transaction commit"),
        }
    }
}

// =============================================================================
// Ledger Error
// =============================================================================

/// Errors returned by every engine operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The sale header was rejected; nothing was written.
    #[error("Sale could not be recorded: {source}")]
    SaleWriteFailed {
        #[source]
        source: DbError,
    },

    /// A write after the header failed.
    ///
    /// ## Recovery
    /// ```text
    /// rolled_back == true   store is exactly as before the call
    /// rolled_back == false  header/items may be orphaned; needs manual repair
    /// ```
    #[error("Sale {sale_number} failed at {stage} (rolled back: {rolled_back}): {source}")]
    PartialCommitFailure {
        sale_number: String,
        stage: CommitStage,
        rolled_back: bool,
        #[source]
        source: DbError,
    },

    /// The store could not serve a read or start a transaction.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] DbError),
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl LedgerError {
    /// Whether the caller can fix the input and try the same step again.
    ///
    /// Store failures are terminal for the operation.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LedgerError::Core(_))
    }

    /// The business rule violation, if that is what this is.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Convenience type alias for engine results.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================
