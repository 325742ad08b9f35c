//! # Database Errors
//!
//! Billing operations return [`DbResult`] so one `?` carries both storage
//! failures and business rule violations ([`CoreError`]) out of a unit of
//! work. Callers see either as an [`ErrorReport`].
//!
//! ```text
//!   sqlx::Error ──► From ──┐
//!                          ├──► DbError ──► kind() / report()
//!   CoreError ─► Core ─────┘
//! ```

use argent_core::{CoreError, ErrorKind, ErrorReport, ValidationError};
use thiserror::Error;

/// SQLite result codes for "database is locked" (SQLITE_BUSY and its
/// extended variants share the low byte 5).
const SQLITE_BUSY: i32 = 5;

#[derive(Debug, Error)]
pub enum DbError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index refused the row: a second wholesale customer on the
    /// same phone, a reused voucher number.
    #[error("Duplicate {constraint}")]
    UniqueViolation { constraint: String },

    /// Usually a customer delete while sales or ledger entries still
    /// reference the customer.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Another unit of work held the write lock past `busy_timeout`.
    #[error("Timed out waiting for the ledger write lock")]
    WriteLockTimeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Any other SQL failure, including CHECK constraints and the
    /// append-only triggers on `ledger_entries`.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// The stable code for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Core(err) => err.kind(),
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation { .. } => {
                ErrorKind::Conflict
            }
            _ => ErrorKind::DatabaseError,
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }

    /// The business rule error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            DbError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    sqlx::error::ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        constraint: message
                            .strip_prefix("UNIQUE constraint failed: ")
                            .unwrap_or(message.as_str())
                            .to_string(),
                    },
                    sqlx::error::ErrorKind::ForeignKeyViolation => {
                        DbError::ForeignKeyViolation { message }
                    }
                    _ if is_busy(db_err.code().as_deref()) => DbError::WriteLockTimeout,
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

fn is_busy(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| c & 0xff == SQLITE_BUSY)
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Core(err.into())
    }
}

pub type DbResult<T> = Result<T, DbError>;
