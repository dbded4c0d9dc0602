//! # Signing Device Contract
//!
//! The uniform contract over RKSV security devices (TSE).
//!
//! ## Why One Trait
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     SigningDevice Contract                              │
//! │                                                                         │
//! │  Concrete devices differ per platform and bus (USB HSM, smartcard,      │
//! │  cloud TSE, software device for non-production paths). The contract     │
//! │  is uniform; the implementation is selected once at startup and         │
//! │  injected, so TransactionSigner stays platform-agnostic.                │
//! │                                                                         │
//! │   ┌──────────────────┐     ┌───────────────────────┐                    │
//! │   │ TransactionSigner│────►│  dyn SigningDevice    │                    │
//! │   └──────────────────┘     ├───────────────────────┤                    │
//! │                            │ SoftwareSigningDevice │  (this crate)      │
//! │                            │ UsbTseDevice          │  (hardware build)  │
//! │                            │ CloudTseDevice        │  (hardware build)  │
//! │                            └───────────────────────┘                    │
//! │                                                                         │
//! │  The device is NOT safe for concurrent signing: counters and device     │
//! │  state are serialized behind a mutex by the caller.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Command Surface
//! Devices speak ASCII mnemonic commands plus one binary sign command
//! (4-byte tag + payload). The helpers in [`commands`] build and parse the
//! frames so every implementation interprets them identically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

// =============================================================================
// Command Surface
// =============================================================================

/// Device command mnemonics and frame helpers.
pub mod commands {
    use super::DeviceError;

    /// Returns the device serial number (ASCII response).
    pub const GET_SERIAL_NUMBER: &str = "GET_SERIAL_NUMBER";

    /// Returns the device status block.
    pub const GET_STATUS: &str = "GET_STATUS";

    /// Validates the device certificate chain.
    pub const VALIDATE_CERT: &str = "VALIDATE_CERT";

    /// 4-byte tag of the binary sign command.
    pub const SIGN_TAG: [u8; 4] = *b"SIGN";

    /// Builds a binary sign frame: tag + payload bytes.
    pub fn sign_frame(payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(SIGN_TAG.len() + payload.len());
        frame.extend_from_slice(&SIGN_TAG);
        frame.extend_from_slice(payload);
        frame
    }

    /// Splits a sign frame back into its payload.
    pub fn parse_sign_frame(frame: &[u8]) -> Result<&[u8], DeviceError> {
        if frame.len() < SIGN_TAG.len() || frame[..SIGN_TAG.len()] != SIGN_TAG {
            return Err(DeviceError::UnknownCommand(format!(
                "expected SIGN frame, got {} bytes",
                frame.len()
            )));
        }
        Ok(&frame[SIGN_TAG.len()..])
    }
}

// =============================================================================
// Hardware Status
// =============================================================================

/// Snapshot of device health, read via `GET_STATUS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareStatus {
    pub is_connected: bool,
    /// Fill level of the device's internal signature memory.
    pub memory_usage_percent: u8,
    pub certificate_valid: bool,
    pub last_signature_time: Option<DateTime<Utc>>,
    /// Current value of the monotonic signature counter.
    pub signature_counter: i64,
}

// =============================================================================
// Signing Device Trait
// =============================================================================

/// Contract every RKSV security device implements.
///
/// `sign` must only be invoked on an already-connected, certificate-valid
/// device, and never concurrently - the caller serializes access.
pub trait SigningDevice: Send {
    /// Establishes the platform-specific connection.
    fn connect(&mut self) -> DeviceResult<()>;

    /// Releases the device.
    fn disconnect(&mut self);

    /// Whether the device is currently connected.
    fn is_connected(&self) -> bool;

    /// The device serial number (`GET_SERIAL_NUMBER`).
    fn serial_number(&self) -> DeviceResult<String>;

    /// Signs the given bytes (binary SIGN command) and returns the raw
    /// signature bytes.
    fn sign(&mut self, payload: &[u8]) -> DeviceResult<Vec<u8>>;

    /// Validates the device certificate (`VALIDATE_CERT`).
    fn validate_certificate(&self) -> DeviceResult<bool>;

    /// Reads the device status block (`GET_STATUS`).
    fn status(&self) -> HardwareStatus;

    /// SEC1-encoded public key material of the device certificate, used by
    /// the verification pipeline. Public material only; never the key.
    fn public_key(&self) -> DeviceResult<Vec<u8>>;
}

// =============================================================================
// Unit Tests
// =============================================================================
