//! # kassa-db: Database Layer for the RKSV Signing Core
//!
//! SQLite persistence for everything the signing core owns: signature
//! records, signed invoices, the append-only DEP / audit trail, period
//! closings, and the FinanzOnline submission outbox.
//!
//! ## Unit-of-Work Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  A signed sale commits atomically:                                      │
//! │                                                                         │
//! │    let mut tx = db.begin().await?;                                      │
//! │    SignatureRepository::insert_tx(&mut *tx, &record).await?;            │
//! │    InvoiceRepository::insert_tx(&mut *tx, &invoice, &lines).await?;     │
//! │    LedgerRepository::append_tx(&mut *tx, kind, &payload).await?;        │
//! │    SubmissionRepository::enqueue_tx(&mut *tx, &id, signed_at).await?;   │
//! │    tx.commit().await?;                                                  │
//! │                                                                         │
//! │  Either all five rows exist, or none of them do: no invoice without     │
//! │  a signature, no DEP gap, no orphaned outbox entry.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::closing::ClosingRepository;
pub use repository::invoice::{generate_receipt_number, InvoiceRepository};
pub use repository::ledger::LedgerRepository;
pub use repository::signature::SignatureRepository;
pub use repository::submission::SubmissionRepository;
