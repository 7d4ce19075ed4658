//! # Store Error Types
//!
//! What a [`RecordStore`](crate::RecordStore) reports when it cannot do what
//! was asked. Absence is never an error here: lookups return `Ok(None)`.
//!
//! ## Where Each Variant Comes From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  SqliteStore                              MemoryStore                  │
//! │  ───────────                              ───────────                  │
//! │  UNIQUE (sales.number)  ──┐          ┌── number already taken          │
//! │  FOREIGN KEY            ──┤          ├── unknown sale / product id     │
//! │  CHECK (stock >= 0 ...) ──┤          │                                  │
//! │  database is locked     ──┤          ├── writer lock wait elapsed      │
//! │                           ▼          ▼                                  │
//! │                    UniqueViolation / ForeignKeyViolation /              │
//! │                    CheckViolation / Busy                                │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  LedgerError (ledger-engine): SaleWriteFailed / PartialCommitFailure   │
//! │                               / StoreUnavailable                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// `update_product` named an id the store does not hold.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: &'static str, id: i64 },

    /// A unique index rejected the row.
    ///
    /// ## When This Occurs
    /// - Two sales stamped in the same microsecond (`sales.number`)
    #[error("Duplicate value for {column}")]
    UniqueViolation { column: String },

    /// A sale item points at a sale or product that is not stored.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A CHECK constraint rejected the row.
    ///
    /// ## When This Occurs
    /// - A write would leave `stock_quantity`, a price or a discount negative
    /// - A status or payment method outside the known set
    #[error("Check constraint failed: {constraint}")]
    CheckViolation { constraint: String },

    /// Another writer holds the store longer than the configured wait.
    ///
    /// SQLite reports this after `busy_timeout`; the memory store after its
    /// `lock_timeout`.
    #[error("Store busy: {0}")]
    Busy(String),

    /// The database file could not be opened or the pool is closed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Every pooled connection stayed in use past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row does not decode into its record type.
    #[error("Stored row could not be decoded: {0}")]
    Decode(String),

    /// Begin, commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Any other statement failure.
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl DbError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DbError::NotFound { entity, id }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }

    /// Classifies a SQLite statement failure by constraint kind, then by
    /// primary result code.
    fn from_sqlite(kind: ErrorKind, code: Option<&str>, message: &str) -> Self {
        let detail = |prefix: &str| {
            message
                .strip_prefix(prefix)
                .unwrap_or(message)
                .trim()
                .to_string()
        };

        match kind {
            ErrorKind::UniqueViolation => DbError::UniqueViolation {
                column: detail("UNIQUE constraint failed:"),
            },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation {
                message: message.to_string(),
            },
            ErrorKind::CheckViolation => DbError::CheckViolation {
                constraint: detail("CHECK constraint failed:"),
            },
            // SQLITE_BUSY (5) and SQLITE_LOCKED (6), with extended codes
            _ if matches!(code, Some("5" | "6" | "261" | "262" | "517"))
                || message.contains("database is locked") =>
            {
                DbError::Busy(message.to_string())
            }
            _ => DbError::QueryFailed(message.to_string()),
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database        → from_sqlite (constraint kind, busy codes)
/// sqlx::Error::ColumnDecode /
///              Decode          → DbError::Decode
/// sqlx::Error::PoolTimedOut    → DbError::PoolExhausted
/// sqlx::Error::PoolClosed / Io → DbError::ConnectionFailed
/// Other                        → DbError::QueryFailed
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                DbError::from_sqlite(db_err.kind(), db_err.code().as_deref(), db_err.message())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Decode(err.to_string())
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            sqlx::Error::Io(_) => DbError::ConnectionFailed(err.to_string()),
            _ => DbError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_kinds() {
        let err = DbError::from_sqlite(
            ErrorKind::UniqueViolation,
            Some("2067"),
            "UNIQUE constraint failed: sales.number",
        );
        assert!(matches!(&err, DbError::UniqueViolation { column } if column == "sales.number"));

        let err = DbError::from_sqlite(
            ErrorKind::CheckViolation,
            Some("275"),
            "CHECK constraint failed: stock_quantity >= 0",
        );
        assert!(matches!(
            &err,
            DbError::CheckViolation { constraint } if constraint == "stock_quantity >= 0"
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_lock_contention_is_busy() {
        let err = DbError::from_sqlite(ErrorKind::Other, Some("5"), "database is locked");
        assert!(matches!(err, DbError::Busy(_)));
        assert!(err.is_transient());

        let err = DbError::from_sqlite(ErrorKind::Other, Some("517"), "database is locked");
        assert!(matches!(err, DbError::Busy(_)));

        let err = DbError::from_sqlite(ErrorKind::Other, Some("1"), "no such table: widgets");
        assert!(matches!(err, DbError::QueryFailed(_)));
    }

    #[test]
    fn test_pool_errors() {
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::PoolExhausted));
        assert!(matches!(
            DbError::from(sqlx::Error::PoolClosed),
            DbError::ConnectionFailed(_)
        ));
        assert!(matches!(
            DbError::from(sqlx::Error::RowNotFound),
            DbError::QueryFailed(_)
        ));
    }

    #[test]
    fn test_messages() {
        assert_eq!(DbError::not_found("Product", 42).to_string(), "Product 42 does not exist");
        assert_eq!(
            DbError::UniqueViolation {
                column: "sales.number".into()
            }
            .to_string(),
            "Duplicate value for sales.number"
        );
    }
}
