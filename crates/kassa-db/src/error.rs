//! # Database Error Types
//!
//! Error types for kassa-db operations.
//!
//! ## Design Principles
//! - Unique violations get their own variant: the closing coordinator turns
//!   them into the "already closed" business outcome instead of a failure
//! - Everything else carries enough context to debug the failed query

use thiserror::Error;

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Database error type.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to open or configure the connection pool.
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failure on startup.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// A UNIQUE constraint rejected the write. For closings this is the
    /// idempotence guard per (register, date, period) key.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Row expected but not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// JSON (de)serialization of a payload column failed.
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other query failure.
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return DbError::UniqueViolation(db_err.message().to_string());
            }
        }
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            other => DbError::QueryFailed(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}
