//! # Fiscal Error Types
//!
//! Error types for the orchestration layer.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Fiscal Error Categories                             │
//! │                                                                         │
//! │  FATAL to the triggering request (no receipt/closing is produced):      │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Signing      │  │    Database     │  │      Validation         │ │
//! │  │ DeviceUnavail.  │  │  QueryFailed    │  │  Required / OutOfRange  │ │
//! │  │ CertInvalid     │  │  UniqueViol.    │  │  EmptyInvoice           │ │
//! │  │ Transport       │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  RECOVERABLE (deferred, retried by the queue, never fail a sale):       │
//! │  ┌─────────────────────┐  ┌──────────────────────────┐                  │
//! │  │ NetworkUnavailable  │  │ AuthorityRejected        │                  │
//! │  └─────────────────────┘  └──────────────────────────┘                  │
//! │                                                                         │
//! │  NOT errors at all: "already closed" and "no activity" are ordinary     │
//! │  business outcomes, expressed as ClosingOutcome variants.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use kassa_core::error::ValidationError;
use kassa_db::DbError;
use kassa_signing::SigningError;

/// Result type alias for fiscal operations.
pub type FiscalResult<T> = Result<T, FiscalError>;

/// Fiscal orchestration error type.
#[derive(Debug, Error)]
pub enum FiscalError {
    /// The signing path failed; the enclosing business operation aborts.
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),

    /// Persistence failed; the enclosing business operation aborts.
    #[error("database error: {0}")]
    Database(#[from] DbError),

    /// The request was rejected before signing.
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// The network or the tax portal is unreachable. Remote submission is
    /// deferred; local signing is never blocked by this.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The authority rejected or failed a submission; retried next cycle.
    #[error("authority submission rejected: {0}")]
    AuthorityRejected(String),

    /// Payload (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("invalid fiscal configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load or save the config file.
    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Actor channel closed (component shut down).
    #[error("channel error: {0}")]
    ChannelError(String),
}

impl From<std::io::Error> for FiscalError {
    fn from(err: std::io::Error) -> Self {
        FiscalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for FiscalError {
    fn from(err: toml::de::Error) -> Self {
        FiscalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for FiscalError {
    fn from(err: toml::ser::Error) -> Self {
        FiscalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<reqwest::Error> for FiscalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            FiscalError::NetworkUnavailable(err.to_string())
        } else {
            FiscalError::AuthorityRejected(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl FiscalError {
    /// True when the failed operation can be retried later without operator
    /// intervention.
    ///
    /// ## Retryable
    /// - Network unreachable (queue waits for the next cycle)
    /// - Authority rejections (transient portal failures)
    ///
    /// ## Non-Retryable
    /// - Signing failures (the request itself is dead; the caller may
    ///   resubmit the whole business event)
    /// - Validation and configuration errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FiscalError::NetworkUnavailable(_) | FiscalError::AuthorityRejected(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_categorization() {
        assert!(FiscalError::NetworkUnavailable("offline".into()).is_retryable());
        assert!(FiscalError::AuthorityRejected("503".into()).is_retryable());

        assert!(!FiscalError::InvalidConfig("bad".into()).is_retryable());
        assert!(!FiscalError::Validation(ValidationError::EmptyInvoice).is_retryable());
    }
}
