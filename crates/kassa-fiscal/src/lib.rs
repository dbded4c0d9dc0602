//! # kassa-fiscal: Fiscal Orchestration for the RKSV Signing Core
//!
//! This crate wires the signing path, the database, and the outside world
//! together: issuing signed invoices, performing closings, monitoring
//! connectivity, and draining the FinanzOnline outbox.
//!
//! ## Runtime Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Fiscal Runtime Shape                              │
//! │                                                                         │
//! │  REQUEST PATH (synchronous, blocking on the device mutex):              │
//! │                                                                         │
//! │    sale ───► InvoiceService ──► TransactionSigner ──► one DB tx         │
//! │    closing ► ClosingCoordinator ──► TransactionSigner ──► one DB tx     │
//! │                                                                         │
//! │  BACKGROUND TASKS (tokio, interval-driven, skip-if-busy):               │
//! │                                                                         │
//! │    NetworkMonitor  ── every 30s ──► watch<NetworkSnapshot>              │
//! │                                           │                             │
//! │    SubmissionQueue ── every 5s ───────────┴─► gate, drain outbox        │
//! │                                                                         │
//! │  The snapshot gates only the REMOTE side. Local signing never waits     │
//! │  for a probe and never fails because the portal is down.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`invoicing`] - `InvoiceService`: validate → sign → persist → submit
//! - [`closing`] - `ClosingCoordinator` state machine and outcomes
//! - [`queue`] - `SubmissionQueue`: fixed-interval outbox draining
//! - [`network`] - `NetworkMonitor`: probes and status snapshots
//! - [`authority`] - FinanzOnline payload shape and HTTP client
//! - [`export`] - read-only year-end bundle
//! - [`config`] - TOML configuration
//! - [`error`] - `FiscalError` and retryability

// =============================================================================
// Module Declarations
// =============================================================================

pub mod authority;
pub mod closing;
pub mod config;
pub mod error;
pub mod export;
pub mod invoicing;
pub mod network;
pub mod queue;

#[cfg(test)]
pub(crate) mod testsupport;

// =============================================================================
// Re-exports
// =============================================================================

pub use authority::{AuthorityClient, FinanzOnlineClient, SubmissionPayload};
pub use closing::{ClosingCoordinator, ClosingOutcome};
pub use config::{AuthorityConfig, FiscalConfig, NetworkConfig, QueueConfig, RegisterConfig};
pub use error::{FiscalError, FiscalResult};
pub use export::{YearEndExport, YearEndExporter};
pub use invoicing::{InvoiceService, IssuedInvoice};
pub use network::{NetworkMonitor, NetworkMonitorHandle, ReachabilityProbe, StandardProbe};
pub use queue::{CycleOutcome, SubmissionQueue, SubmissionQueueHandle};
