//! # Software Signing Device
//!
//! ECDSA P-256 software implementation of the [`SigningDevice`] contract.
//!
//! Certified TSE hardware signs with ECDSA P-256 over SHA-256; this device
//! uses the same primitive in software so that everything downstream (the
//! compact format, the checklist, the ledger) behaves exactly as it would
//! against real hardware. Non-production deployments and tests run on it;
//! hardware builds swap in their own implementation behind the same trait.
//!
//! The device keeps its own monotonic signature counter: it increments once
//! per successful SIGN command and never decreases.

use chrono::{DateTime, Utc};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use tracing::{debug, info};

use crate::device::{commands, HardwareStatus, SigningDevice};
use crate::error::{DeviceError, DeviceResult};

/// How many signatures fit into the simulated device memory. Real devices
/// report the fill level of their internal log; the software device derives
/// it from the counter so operators see the same gauge.
const MEMORY_CAPACITY_SIGNATURES: i64 = 1_000_000;

// =============================================================================
// Software Signing Device
// =============================================================================

/// Software TSE: ECDSA P-256 behind the uniform device contract.
pub struct SoftwareSigningDevice {
    serial: String,
    connected: bool,
    certificate_valid: bool,
    /// Test knob: simulate a transport fault on the next commands.
    transport_fault: Option<String>,
    signing_key: SigningKey,
    signature_counter: i64,
    last_signature_time: Option<DateTime<Utc>>,
}

impl SoftwareSigningDevice {
    /// Creates a device with a freshly generated P-256 key.
    pub fn new(serial: impl Into<String>) -> Self {
        SoftwareSigningDevice::with_signing_key(serial, SigningKey::random(&mut OsRng))
    }

    /// Creates a device from an existing key (deterministic tests, key
    /// material restored from secure storage).
    pub fn with_signing_key(serial: impl Into<String>, signing_key: SigningKey) -> Self {
        SoftwareSigningDevice {
            serial: serial.into(),
            connected: false,
            certificate_valid: true,
            transport_fault: None,
            signing_key,
            signature_counter: 0,
            last_signature_time: None,
        }
    }

    /// Marks the certificate invalid (expired/revoked simulation).
    pub fn set_certificate_valid(&mut self, valid: bool) {
        self.certificate_valid = valid;
    }

    /// Injects a transport fault for every following command.
    pub fn set_transport_fault(&mut self, detail: Option<String>) {
        self.transport_fault = detail;
    }

    /// Executes an ASCII mnemonic command, returning the raw response bytes.
    fn dispatch_ascii(&self, command: &str) -> DeviceResult<Vec<u8>> {
        self.check_transport(command)?;

        match command {
            commands::GET_SERIAL_NUMBER => Ok(self.serial.as_bytes().to_vec()),
            commands::VALIDATE_CERT => Ok(vec![u8::from(self.certificate_valid)]),
            commands::GET_STATUS => {
                // Status is assembled typed in status(); the raw command
                // exists so the surface matches the wire contract.
                Ok(vec![u8::from(self.connected), u8::from(self.certificate_valid)])
            }
            other => Err(DeviceError::UnknownCommand(other.to_string())),
        }
    }

    fn check_transport(&self, command: &str) -> DeviceResult<()> {
        if let Some(detail) = &self.transport_fault {
            return Err(DeviceError::transport(command, detail.clone()));
        }
        Ok(())
    }

    fn memory_usage_percent(&self) -> u8 {
        let pct = self.signature_counter * 100 / MEMORY_CAPACITY_SIGNATURES;
        pct.min(100) as u8
    }
}

impl SigningDevice for SoftwareSigningDevice {
    fn connect(&mut self) -> DeviceResult<()> {
        self.check_transport("CONNECT")?;

        if !self.connected {
            info!(serial = %self.serial, "Connecting software signing device");
            self.connected = true;
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            info!(serial = %self.serial, "Disconnecting software signing device");
            self.connected = false;
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn serial_number(&self) -> DeviceResult<String> {
        let raw = self.dispatch_ascii(commands::GET_SERIAL_NUMBER)?;
        String::from_utf8(raw).map_err(|_| {
            DeviceError::transport(commands::GET_SERIAL_NUMBER, "non-UTF8 serial response")
        })
    }

    fn sign(&mut self, payload: &[u8]) -> DeviceResult<Vec<u8>> {
        if !self.connected {
            return Err(DeviceError::NotConnected);
        }
        if !self.certificate_valid {
            return Err(DeviceError::CertificateInvalid(
                "certificate rejected by device".into(),
            ));
        }
        self.check_transport("SIGN")?;

        // Round-trip through the binary frame so the software device
        // interprets exactly the wire command a hardware device would see.
        let frame = commands::sign_frame(payload);
        let payload = commands::parse_sign_frame(&frame)?;

        let signature: Signature = self.signing_key.sign(payload);

        self.signature_counter += 1;
        self.last_signature_time = Some(Utc::now());

        debug!(
            serial = %self.serial,
            counter = self.signature_counter,
            payload_len = payload.len(),
            "Signed payload"
        );

        Ok(signature.to_bytes().to_vec())
    }

    fn validate_certificate(&self) -> DeviceResult<bool> {
        let raw = self.dispatch_ascii(commands::VALIDATE_CERT)?;
        Ok(raw.first().copied() == Some(1))
    }

    fn status(&self) -> HardwareStatus {
        HardwareStatus {
            is_connected: self.connected,
            memory_usage_percent: self.memory_usage_percent(),
            certificate_valid: self.certificate_valid,
            last_signature_time: self.last_signature_time,
            signature_counter: self.signature_counter,
        }
    }

    fn public_key(&self) -> DeviceResult<Vec<u8>> {
        let verifying_key = self.signing_key.verifying_key();
        Ok(verifying_key.to_encoded_point(false).as_bytes().to_vec())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_device() -> SoftwareSigningDevice {
        let mut device = SoftwareSigningDevice::new("SW-TSE-001");
        device.connect().unwrap();
        device
    }

    #[test]
    fn test_counter_strictly_increases() {
        let mut device = connected_device();

        let mut previous = device.status().signature_counter;
        for _ in 0..5 {
            device.sign(b"payload").unwrap();
            let current = device.status().signature_counter;
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn test_sign_requires_connection() {
        let mut device = SoftwareSigningDevice::new("SW-TSE-001");
        assert!(matches!(
            device.sign(b"payload"),
            Err(DeviceError::NotConnected)
        ));
        // No counter consumed by the failed call.
        assert_eq!(device.status().signature_counter, 0);
    }

    #[test]
    fn test_sign_requires_valid_certificate() {
        let mut device = connected_device();
        device.set_certificate_valid(false);

        assert!(matches!(
            device.sign(b"payload"),
            Err(DeviceError::CertificateInvalid(_))
        ));
        assert!(!device.validate_certificate().unwrap());
    }

    #[test]
    fn test_transport_fault_is_reported() {
        let mut device = connected_device();
        device.set_transport_fault(Some("bus timeout".into()));

        assert!(matches!(
            device.sign(b"payload"),
            Err(DeviceError::Transport { .. })
        ));
        assert!(matches!(
            device.serial_number(),
            Err(DeviceError::Transport { .. })
        ));
    }

    #[test]
    fn test_serial_and_unknown_command() {
        let device = connected_device();
        assert_eq!(device.serial_number().unwrap(), "SW-TSE-001");
        assert!(matches!(
            device.dispatch_ascii("SELF_DESTRUCT"),
            Err(DeviceError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_signatures_differ_per_payload() {
        let mut device = connected_device();
        let a = device.sign(b"payload-a").unwrap();
        let b = device.sign(b"payload-b").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
