//! # Error Types
//!
//! Domain-specific error types for kassa-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kassa-core errors (this file)                                         │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kassa-signing errors (separate crate)                                 │
//! │  ├── DeviceError      - Security device failures                       │
//! │  └── SigningError     - Fail-closed signing failures                   │
//! │                                                                         │
//! │  kassa-db errors       → DbError                                       │
//! │  kassa-fiscal errors   → FiscalError (wraps the above)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. `thiserror` derive macros, never manual impls
//! 2. Context in the message (register id, period, field name)
//! 3. Errors are enum variants, never bare strings
//! 4. Expected business outcomes (already closed, no activity) are NOT
//!    errors — they live in result enums in kassa-fiscal

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core fiscal domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An invoice references a period it does not belong to, or a record
    /// that does not exist.
    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// A closing totals computation received inconsistent data.
    #[error("Inconsistent totals for invoice {invoice_id}: {reason}")]
    InconsistentTotals { invoice_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before any signing or persistence runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed register id, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A request with no line items.
    #[error("invoice must contain at least one line item")]
    EmptyInvoice,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
