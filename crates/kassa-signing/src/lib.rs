//! # kassa-signing: Security Device & Signature Pipeline
//!
//! This crate owns the RKSV signing path: the uniform device contract, the
//! software ECDSA P-256 device, the compact signature format, the
//! checklist 1-5 diagnostics, and the fail-closed transaction signer.
//!
//! ## Signing Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Signing Path                                     │
//! │                                                                         │
//! │  ProcessData (kassa-core)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  TransactionSigner ── mutex ──► SigningDevice (trait)                   │
//! │       │                              │                                  │
//! │       │                              └── SoftwareSigningDevice          │
//! │       ▼                                  (ECDSA P-256, monotonic        │
//! │  SignaturePipeline                        counter)                      │
//! │   build: header.payload.signature                                       │
//! │   verify: checklist 1-5 (diagnostic, no short-circuit)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SignatureRecord (persisted by kassa-db, owned by the invoice or        │
//! │  closing it signs)                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`device`] - `SigningDevice` trait, hardware status, command surface
//! - [`software`] - software TSE implementation (ECDSA P-256)
//! - [`pipeline`] - compact signature build + checklist verify
//! - [`signer`] - `TransactionSigner`, fail-closed orchestration
//! - [`error`] - `DeviceError` / `SigningError`

// =============================================================================
// Module Declarations
// =============================================================================

pub mod device;
pub mod error;
pub mod pipeline;
pub mod signer;
pub mod software;

// =============================================================================
// Re-exports
// =============================================================================

pub use device::{commands, HardwareStatus, SigningDevice};
pub use error::{DeviceError, DeviceResult, SigningError, SigningResult};
pub use pipeline::{
    build_compact_signature, verify_compact_signature, ChecklistReport, ChecklistStep, StepStatus,
};
pub use signer::{SignedTransaction, TransactionSigner};
pub use software::SoftwareSigningDevice;
