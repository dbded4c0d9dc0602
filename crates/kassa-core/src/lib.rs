//! # kassa-core: Pure Fiscal Domain for the RKSV Signing Core
//!
//! This crate is the heart of the signing core. It contains the fiscal
//! domain as pure functions and plain types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Kassa RKSV Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Host POS Application                         │   │
//! │  │        sale flow ──► closing flow ──► operator diagnostics      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 kassa-fiscal (orchestration)                    │   │
//! │  │    InvoiceService, ClosingCoordinator, SubmissionQueue,         │   │
//! │  │    NetworkMonitor, FinanzOnline client, year-end export         │   │
//! │  └───────┬─────────────────────┬───────────────────────────────────┘   │
//! │          │                     │                                        │
//! │  ┌───────▼────────┐   ┌────────▼────────┐                              │
//! │  │ kassa-signing  │   │    kassa-db     │                              │
//! │  │ device + JWS   │   │ SQLite, DEP,    │                              │
//! │  │ pipeline       │   │ repositories    │                              │
//! │  └───────┬────────┘   └────────┬────────┘                              │
//! │          │                     │                                        │
//! │  ┌───────▼─────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ kassa-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐  │   │
//! │  │   │   types   │  │   money   │  │  receipt  │  │ validation │  │   │
//! │  │   │ Signature │  │   Money   │  │ canonical │  │   rules    │  │   │
//! │  │   │ Closing   │  │  TaxRate  │  │  string   │  │   checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO HARDWARE               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (SignatureRecord, ClosingRecord, DEP entry, ...)
//! - [`money`] - Money type with integer Euro-cent arithmetic
//! - [`receipt`] - Canonical machine-readable receipt string
//! - [`request`] - Boundary request/response shapes
//! - [`validation`] - Business rule validation
//! - [`base64url`] - Padless base64url helpers used by every encoded field
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, which is what makes the
//!    canonical receipt string and the checklist hash comparison meaningful
//! 2. **No I/O**: database, network, and device access live in other crates
//! 3. **Integer Money**: all amounts are Euro cents (i64), never floats
//! 4. **Explicit Errors**: typed errors, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod base64url;
pub mod error;
pub mod money;
pub mod receipt;
pub mod request;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use receipt::ProcessData;
pub use request::{ClosingRequest, ClosingResponse, InvoiceRequest, NewInvoiceLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items on a single invoice.
pub const MAX_INVOICE_LINES: usize = 100;

/// Maximum quantity of a single line item.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Retention window for unsubmitted authority records, in days. Records
/// older than this are archived (cancelled), not retried forever.
pub const SUBMISSION_RETENTION_DAYS: i64 = 30;
