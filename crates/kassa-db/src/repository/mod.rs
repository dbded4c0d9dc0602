//! # Repository Module
//!
//! One repository per aggregate:
//!
//! - [`signature`] - signature records (write-once)
//! - [`invoice`] - signed invoices and their lines
//! - [`ledger`] - the append-only DEP / audit trail
//! - [`closing`] - period closings with idempotence guard
//! - [`submission`] - the FinanzOnline outbox
//!
//! Methods suffixed `_tx` take a `&mut SqliteConnection` and participate in
//! the caller's transaction; everything else runs on the pool.

pub mod closing;
pub mod invoice;
pub mod ledger;
pub mod signature;
pub mod submission;

// =============================================================================
// Shared Test Helpers
// =============================================================================
