//! # Transaction Signer
//!
//! Orchestrates the device and the pipeline for one business event.
//!
//! ## Fail-Closed Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   TransactionSigner.sign()                              │
//! │                                                                         │
//! │  1. Acquire the device mutex (single serialized resource)               │
//! │  2. Ensure connected; one connect attempt, failure is terminal          │
//! │  3. Validate certificate; invalid is terminal                           │
//! │  4. Stamp a fresh server timestamp, build the canonical string          │
//! │  5. Device sign; any error is wrapped with its inner cause              │
//! │  6. Read the signature counter, emit the SignatureRecord                │
//! │                                                                         │
//! │  No step is retried silently. Retries belong to the caller, which       │
//! │  resubmits the whole logical event; silent retries here would           │
//! │  double-sign one event with divergent counters.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use kassa_core::receipt::ProcessData;
use kassa_core::types::SignatureRecord;

use crate::device::SigningDevice;
use crate::error::{DeviceError, SigningError, SigningResult};
use crate::pipeline;

// =============================================================================
// Signed Transaction
// =============================================================================

/// The result of one successful signing call: the record plus the exact
/// data that was signed (the caller persists both).
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub record: SignatureRecord,
    /// Process data as signed, including the stamped timestamp.
    pub process_data: ProcessData,
    /// The canonical string covered by the signature.
    pub canonical: String,
}

// =============================================================================
// Transaction Signer
// =============================================================================

/// Signs business events through the single serialized signing device.
///
/// The device is an explicitly owned resource behind a mutex, passed in at
/// construction; the signer never creates or globally caches one.
pub struct TransactionSigner {
    device: Arc<Mutex<Box<dyn SigningDevice>>>,
}

impl TransactionSigner {
    /// Creates a signer around an injected device.
    pub fn new(device: Arc<Mutex<Box<dyn SigningDevice>>>) -> Self {
        TransactionSigner { device }
    }

    /// Shared handle to the underlying device (diagnostics, public key).
    pub fn device(&self) -> Arc<Mutex<Box<dyn SigningDevice>>> {
        Arc::clone(&self.device)
    }

    /// Signs one business event, fail-closed.
    ///
    /// The timestamp inside `data` is overwritten with a fresh server
    /// timestamp before canonicalization, which keeps signatures
    /// non-replayable across distinct calls.
    pub async fn sign(&self, mut data: ProcessData) -> SigningResult<SignedTransaction> {
        let mut device = self.device.lock().await;

        // Step 1: ensure connected; exactly one connect attempt.
        if !device.is_connected() {
            warn!("Signing device not connected, attempting connect");
            device
                .connect()
                .map_err(SigningError::DeviceUnavailable)?;
        }

        // Step 2: certificate gate.
        let certificate_valid = device
            .validate_certificate()
            .map_err(SigningError::from)?;
        if !certificate_valid {
            return Err(SigningError::CertificateInvalid(
                DeviceError::CertificateInvalid("rejected by VALIDATE_CERT".into()),
            ));
        }

        // Step 3: fresh timestamp, deterministic canonical string.
        data.timestamp = Utc::now();
        let canonical = data.to_canonical_string();

        // Step 4: sign. Every device error is wrapped with its cause.
        let signature_value = pipeline::build_compact_signature(&mut **device, &canonical)
            .map_err(SigningError::from)?;

        // Step 5: freshly read counter and serial for the record.
        let status = device.status();
        let device_serial = device.serial_number().map_err(SigningError::from)?;

        let record = SignatureRecord {
            id: Uuid::new_v4().to_string(),
            signature_value,
            signature_counter: status.signature_counter,
            device_serial,
            process_type: data.process_type,
            signed_at: data.timestamp,
        };

        info!(
            process_type = %record.process_type,
            counter = record.signature_counter,
            receipt = %data.receipt_number,
            "Signed transaction"
        );

        Ok(SignedTransaction {
            record,
            process_data: data,
            canonical,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
