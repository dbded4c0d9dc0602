//! # Validation Module
//!
//! Input validation for requests entering the signing core.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Host application (POS frontend / API layer)                  │
//! │  └── Basic format checks, immediate user feedback                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  └── Runs BEFORE the device signs anything: a rejected request         │
//! │      must never consume a signature counter                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / UNIQUE / foreign key constraints                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::request::InvoiceRequest;
use crate::MAX_INVOICE_LINES;
use crate::MAX_LINE_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates a cash register id.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 50 characters
/// - Alphanumeric plus hyphen (the id is embedded verbatim in the canonical
///   receipt string, which uses `_` as its field separator)
///
/// ## Example
/// ```rust
/// use kassa_core::validation::validate_register_id;
///
/// assert!(validate_register_id("AT-REG-001").is_ok());
/// assert!(validate_register_id("").is_err());
/// assert!(validate_register_id("bad_id").is_err());
/// ```
pub fn validate_register_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "cash_register_id".to_string(),
        });
    }

    if id.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "cash_register_id".to_string(),
            max: 50,
        });
    }

    if !id.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ValidationError::InvalidFormat {
            field: "cash_register_id".to_string(),
            reason: "must contain only letters, numbers, and hyphens".to_string(),
        });
    }

    Ok(())
}

/// Validates an Austrian tax number (Steuernummer): 9 digits, the first two
/// being the tax office code.
pub fn validate_tax_number(tax_number: &str) -> ValidationResult<()> {
    let tax_number = tax_number.trim();

    if tax_number.is_empty() {
        return Err(ValidationError::Required {
            field: "tax_number".to_string(),
        });
    }

    if tax_number.len() != 9 || !tax_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "tax_number".to_string(),
            reason: "must be exactly 9 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a line item quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit price in cents. Negative unit prices are allowed for
/// correction lines; the zero-total case is handled at request level.
pub fn validate_unit_price_cents(cents: i64) -> ValidationResult<()> {
    if cents.abs() > 100_000_000 {
        return Err(ValidationError::OutOfRange {
            field: "unit_price_cents".to_string(),
            min: -100_000_000,
            max: 100_000_000,
        });
    }

    Ok(())
}

/// Validates a line item description.
pub fn validate_description(description: &str) -> ValidationResult<()> {
    let description = description.trim();

    if description.is_empty() {
        return Err(ValidationError::Required {
            field: "description".to_string(),
        });
    }

    if description.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "description".to_string(),
            max: 200,
        });
    }

    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a full invoice request before it reaches the signer.
pub fn validate_invoice_request(request: &InvoiceRequest) -> ValidationResult<()> {
    validate_register_id(&request.cash_register_id)?;

    if request.lines.is_empty() {
        return Err(ValidationError::EmptyInvoice);
    }

    if request.lines.len() > MAX_INVOICE_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_INVOICE_LINES as i64,
        });
    }

    for line in &request.lines {
        validate_description(&line.description)?;
        validate_quantity(line.quantity)?;
        validate_unit_price_cents(line.unit_price_cents)?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
