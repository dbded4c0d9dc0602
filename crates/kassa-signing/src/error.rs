//! # Signing Error Types
//!
//! Error types for the device contract and the fail-closed signing path.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Signing Error Categories                           │
//! │                                                                         │
//! │  ┌──────────────────┐   ┌──────────────────────────────────────────┐   │
//! │  │   DeviceError    │   │             SigningError                 │   │
//! │  │                  │   │                                          │   │
//! │  │  NotConnected    │──►│  DeviceUnavailable   (terminal)          │   │
//! │  │  CertificateInv. │──►│  CertificateInvalid  (terminal)          │   │
//! │  │  Transport       │──►│  TransportFailure    (terminal, wraps    │   │
//! │  │  UnknownCommand  │   │                       the inner cause)   │   │
//! │  └──────────────────┘   └──────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Every SigningError aborts the enclosing business operation: no         │
//! │  invoice or closing may exist without a valid signature.                │
//! │                                                                         │
//! │  Verification failures are NOT errors - they are FAIL steps in the      │
//! │  checklist report.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Result type alias for signing operations.
pub type SigningResult<T> = Result<T, SigningError>;

// =============================================================================
// Device Error
// =============================================================================

/// Failures surfaced by the security device itself.
///
/// Callers need the three-way distinction to decide whether retrying now is
/// meaningful: a transport hiccup may clear, an invalid certificate will not.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device is not connected.
    #[error("signing device is not connected")]
    NotConnected,

    /// The device certificate failed validation.
    #[error("device certificate is invalid: {0}")]
    CertificateInvalid(String),

    /// Transport-level failure talking to the device.
    #[error("device transport failure during {command}: {detail}")]
    Transport { command: String, detail: String },

    /// The device received a command it does not understand.
    #[error("unknown device command: {0}")]
    UnknownCommand(String),
}

impl DeviceError {
    /// Transport failure helper carrying the failed command mnemonic.
    pub fn transport(command: impl Into<String>, detail: impl Into<String>) -> Self {
        DeviceError::Transport {
            command: command.into(),
            detail: detail.into(),
        }
    }
}

// =============================================================================
// Signing Error
// =============================================================================

/// Failures of the fail-closed signing path. All variants are terminal for
/// the triggering request: no receipt or closing is issued.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The device is unavailable and a single connect attempt failed.
    #[error("signing device unavailable")]
    DeviceUnavailable(#[source] DeviceError),

    /// The device certificate is invalid; signing is forbidden.
    #[error("device certificate invalid")]
    CertificateInvalid(#[source] DeviceError),

    /// The sign call itself failed; the inner cause is preserved for
    /// diagnostics.
    #[error("signing transport failure")]
    TransportFailure(#[source] DeviceError),
}

impl From<DeviceError> for SigningError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::NotConnected => SigningError::DeviceUnavailable(err),
            DeviceError::CertificateInvalid(_) => SigningError::CertificateInvalid(err),
            DeviceError::Transport { .. } | DeviceError::UnknownCommand(_) => {
                SigningError::TransportFailure(err)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
