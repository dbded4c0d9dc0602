//! # Signature Pipeline
//!
//! Builds and verifies the compact signature wire format.
//!
//! ## Compact Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │          base64url(header) . base64url(payload) . base64url(sig)        │
//! │                                                                         │
//! │  header   {"alg":"ES256"}  - JWS protected header                       │
//! │  payload  the canonical receipt string (kassa-core::receipt)            │
//! │  sig      raw ECDSA signature over "header.payload" (the JWS            │
//! │           signing input), produced by the device                        │
//! │                                                                         │
//! │  No `=` padding anywhere. This string IS the persisted                  │
//! │  signature_value of every SignatureRecord.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Checklist 1-5
//! Verification is a diagnostic, not a gate: every step runs even when an
//! earlier one fails, so an operator sees exactly which property broke.
//!
//! | # | Step            | Checks                                          |
//! |---|-----------------|--------------------------------------------------|
//! | 1 | device-id match | register id embedded in payload == expected      |
//! | 2 | JWS structure   | three dot-separated base64url segments           |
//! | 3 | payload hash    | SHA-256 of payload segment == expected hash      |
//! | 4 | signature       | ECDSA verify over the signing input              |
//! | 5 | base64url rules | no padding, url-safe alphabet, valid lengths     |
//!
//! Structural correctness (1, 2, 5) is orthogonal to content integrity
//! (3, 4): a one-byte payload mutation flips exactly steps 3 and 4.

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use kassa_core::base64url;
use kassa_core::receipt::ProcessData;

use crate::device::SigningDevice;
use crate::error::DeviceResult;

/// The JWS protected header of every compact signature. Serialized once,
/// verbatim, so the byte representation is stable.
pub const JWS_HEADER: &str = r#"{"alg":"ES256"}"#;

// =============================================================================
// Checklist Types
// =============================================================================

/// PASS/FAIL outcome of one checklist step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Pass,
    Fail,
}

/// One diagnostic checklist step.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistStep {
    pub step_number: u8,
    pub step_name: &'static str,
    pub status: StepStatus,
    pub detail: String,
}

impl ChecklistStep {
    fn pass(step_number: u8, step_name: &'static str, detail: impl Into<String>) -> Self {
        ChecklistStep {
            step_number,
            step_name,
            status: StepStatus::Pass,
            detail: detail.into(),
        }
    }

    fn fail(step_number: u8, step_name: &'static str, detail: impl Into<String>) -> Self {
        ChecklistStep {
            step_number,
            step_name,
            status: StepStatus::Fail,
            detail: detail.into(),
        }
    }
}

/// The ordered checklist report, steps 1 through 5.
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistReport {
    pub steps: Vec<ChecklistStep>,
}

impl ChecklistReport {
    /// True when every step passed.
    pub fn all_passed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Pass)
    }

    /// Status of one step by number (1-based).
    pub fn step(&self, step_number: u8) -> Option<&ChecklistStep> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }
}

// =============================================================================
// Build
// =============================================================================

/// Builds the compact signature for canonical process data.
///
/// The device signs the JWS signing input (`header.payload`), never the raw
/// canonical string alone, so the header is covered by the signature.
pub fn build_compact_signature(
    device: &mut dyn SigningDevice,
    canonical: &str,
) -> DeviceResult<String> {
    let header_segment = base64url::encode(JWS_HEADER.as_bytes());
    let payload_segment = base64url::encode(canonical.as_bytes());

    let signing_input = format!("{header_segment}.{payload_segment}");
    let signature_bytes = device.sign(signing_input.as_bytes())?;
    let signature_segment = base64url::encode(&signature_bytes);

    debug!(
        payload_len = canonical.len(),
        signature_len = signature_bytes.len(),
        "Built compact signature"
    );

    Ok(format!("{signing_input}.{signature_segment}"))
}

// =============================================================================
// Verify (Checklist 1-5)
// =============================================================================

/// Runs the full diagnostic checklist over a compact signature.
///
/// ## Arguments
/// * `compact` - the `header.payload.signature` string under test
/// * `expected_canonical` - the canonical string the caller believes was
///   signed; step 3 compares hashes against it
/// * `expected_register_id` - the cash register the signature must belong to
/// * `public_key_sec1` - SEC1-encoded public key of the signing device
///
/// Only public material is needed, so the checklist also works on exported
/// records long after the device is gone.
pub fn verify_compact_signature(
    compact: &str,
    expected_canonical: &str,
    expected_register_id: &str,
    public_key_sec1: &[u8],
) -> ChecklistReport {
    let segments: Vec<&str> = compact.split('.').collect();

    let steps = vec![
        check_device_id(&segments, expected_register_id),
        check_structure(&segments),
        check_payload_hash(&segments, expected_canonical),
        check_signature(&segments, public_key_sec1),
        check_padding(&segments),
    ];

    ChecklistReport { steps }
}

/// Step 1: the register id embedded in the payload matches the expected one.
fn check_device_id(segments: &[&str], expected_register_id: &str) -> ChecklistStep {
    const STEP: u8 = 1;
    const NAME: &str = "device-id match";

    let Some(payload_segment) = segments.get(1) else {
        return ChecklistStep::fail(STEP, NAME, "no payload segment present");
    };
    let Ok(payload) = base64url::decode(payload_segment) else {
        return ChecklistStep::fail(STEP, NAME, "payload segment is not decodable");
    };
    let Ok(canonical) = String::from_utf8(payload) else {
        return ChecklistStep::fail(STEP, NAME, "payload is not valid UTF-8");
    };

    match ProcessData::parse_register_id(&canonical) {
        Some(embedded) if embedded == expected_register_id => ChecklistStep::pass(
            STEP,
            NAME,
            format!("embedded register id '{embedded}' matches"),
        ),
        Some(embedded) => ChecklistStep::fail(
            STEP,
            NAME,
            format!("embedded register id '{embedded}', expected '{expected_register_id}'"),
        ),
        None => ChecklistStep::fail(STEP, NAME, "no register id embedded in payload"),
    }
}

/// Step 2: exactly three dot-separated segments, each valid base64url.
fn check_structure(segments: &[&str]) -> ChecklistStep {
    const STEP: u8 = 2;
    const NAME: &str = "JWS structure";

    if segments.len() != 3 {
        return ChecklistStep::fail(
            STEP,
            NAME,
            format!("expected 3 segments, found {}", segments.len()),
        );
    }

    for (idx, segment) in segments.iter().enumerate() {
        if base64url::decode(segment).is_err() {
            return ChecklistStep::fail(STEP, NAME, format!("segment {idx} is not base64url"));
        }
    }

    ChecklistStep::pass(STEP, NAME, "three valid base64url segments")
}

/// Step 3: SHA-256 of the payload segment equals the hash of the expected
/// canonical string.
fn check_payload_hash(segments: &[&str], expected_canonical: &str) -> ChecklistStep {
    const STEP: u8 = 3;
    const NAME: &str = "payload hash";

    let Some(payload_segment) = segments.get(1) else {
        return ChecklistStep::fail(STEP, NAME, "no payload segment present");
    };
    let Ok(payload) = base64url::decode(payload_segment) else {
        return ChecklistStep::fail(STEP, NAME, "payload segment is not decodable");
    };

    let actual = Sha256::digest(&payload);
    let expected = Sha256::digest(expected_canonical.as_bytes());

    if actual == expected {
        ChecklistStep::pass(STEP, NAME, "payload hash matches canonical data")
    } else {
        ChecklistStep::fail(
            STEP,
            NAME,
            "payload hash differs from canonical data".to_string(),
        )
    }
}

/// Step 4: cryptographic verification of the signature segment over the
/// signing input.
fn check_signature(segments: &[&str], public_key_sec1: &[u8]) -> ChecklistStep {
    const STEP: u8 = 4;
    const NAME: &str = "signature verify";

    if segments.len() < 3 {
        return ChecklistStep::fail(STEP, NAME, "missing signature segment");
    }

    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key_sec1) else {
        return ChecklistStep::fail(STEP, NAME, "invalid public key material");
    };
    let Ok(signature_bytes) = base64url::decode(segments[2]) else {
        return ChecklistStep::fail(STEP, NAME, "signature segment is not decodable");
    };
    let Ok(signature) = Signature::from_slice(&signature_bytes) else {
        return ChecklistStep::fail(STEP, NAME, "signature bytes are not a valid ECDSA signature");
    };

    let signing_input = format!("{}.{}", segments[0], segments[1]);
    match verifying_key.verify(signing_input.as_bytes(), &signature) {
        Ok(()) => ChecklistStep::pass(STEP, NAME, "ECDSA verification succeeded"),
        Err(_) => ChecklistStep::fail(STEP, NAME, "ECDSA verification failed"),
    }
}

/// Step 5: base64url well-formedness of every segment - no `=` padding,
/// url-safe alphabet, valid lengths.
fn check_padding(segments: &[&str]) -> ChecklistStep {
    const STEP: u8 = 5;
    const NAME: &str = "base64url padding";

    for (idx, segment) in segments.iter().enumerate() {
        if !base64url::is_well_formed(segment) {
            return ChecklistStep::fail(
                STEP,
                NAME,
                format!("segment {idx} violates base64url rules"),
            );
        }
    }

    ChecklistStep::pass(STEP, NAME, "all segments padless and url-safe")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::software::SoftwareSigningDevice;
    use chrono::TimeZone;
    use chrono::Utc;
    use kassa_core::money::Money;
    use kassa_core::receipt::chain_value;
    use kassa_core::types::ProcessType;

    const REGISTER: &str = "AT-REG-001";

    fn process_data() -> ProcessData {
        ProcessData {
            process_type: ProcessType::Sign,
            cash_register_id: REGISTER.into(),
            receipt_number: "20260301-01-0001".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap(),
            bracket_amounts: [
                Money::from_cents(12000),
                Money::zero(),
                Money::zero(),
                Money::zero(),
                Money::zero(),
            ],
            turnover_counter_cents: 12000,
            certificate_serial: "CERT-77".into(),
            chain_value: chain_value(None, REGISTER),
        }
    }

    fn signed_fixture() -> (String, String, Vec<u8>) {
        let mut device = SoftwareSigningDevice::new("SW-TSE-001");
        device.connect().unwrap();

        let canonical = process_data().to_canonical_string();
        let compact = build_compact_signature(&mut device, &canonical).unwrap();
        let public_key = device.public_key().unwrap();

        (compact, canonical, public_key)
    }

    #[test]
    fn test_fresh_signature_passes_all_steps() {
        let (compact, canonical, public_key) = signed_fixture();
        let report = verify_compact_signature(&compact, &canonical, REGISTER, &public_key);

        assert_eq!(report.steps.len(), 5);
        assert!(report.all_passed(), "report: {report:?}");
        // Steps come back ordered 1..=5.
        let numbers: Vec<u8> = report.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_payload_mutation_flips_exactly_steps_3_and_4() {
        let (compact, canonical, public_key) = signed_fixture();

        // Flip one byte inside an amount field of the decoded payload,
        // then re-encode, keeping structure and padding intact.
        let segments: Vec<&str> = compact.split('.').collect();
        let mut payload = kassa_core::base64url::decode(segments[1]).unwrap();
        let comma = payload
            .iter()
            .position(|b| *b == b',')
            .expect("amount field present");
        payload[comma + 1] ^= 0x01;
        let mutated = format!(
            "{}.{}.{}",
            segments[0],
            kassa_core::base64url::encode(&payload),
            segments[2]
        );

        let report = verify_compact_signature(&mutated, &canonical, REGISTER, &public_key);

        assert_eq!(report.step(1).unwrap().status, StepStatus::Pass);
        assert_eq!(report.step(2).unwrap().status, StepStatus::Pass);
        assert_eq!(report.step(3).unwrap().status, StepStatus::Fail);
        assert_eq!(report.step(4).unwrap().status, StepStatus::Fail);
        assert_eq!(report.step(5).unwrap().status, StepStatus::Pass);
    }

    #[test]
    fn test_wrong_register_id_fails_only_step_1() {
        let (compact, canonical, public_key) = signed_fixture();
        let report = verify_compact_signature(&compact, &canonical, "AT-REG-999", &public_key);

        assert_eq!(report.step(1).unwrap().status, StepStatus::Fail);
        for n in 2..=5 {
            assert_eq!(report.step(n).unwrap().status, StepStatus::Pass);
        }
    }

    #[test]
    fn test_structural_damage_reports_every_step() {
        let (compact, canonical, public_key) = signed_fixture();
        let two_segments = compact.rsplit_once('.').unwrap().0.to_string();

        let report = verify_compact_signature(&two_segments, &canonical, REGISTER, &public_key);

        // No short-circuit: all five steps are present even when the
        // structure itself is broken.
        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.step(2).unwrap().status, StepStatus::Fail);
        assert_eq!(report.step(4).unwrap().status, StepStatus::Fail);
    }

    #[test]
    fn test_padded_segment_fails_step_5() {
        let (compact, canonical, public_key) = signed_fixture();
        let padded = format!("{compact}==");

        let report = verify_compact_signature(&padded, &canonical, REGISTER, &public_key);
        assert_eq!(report.step(5).unwrap().status, StepStatus::Fail);
    }

    #[test]
    fn test_tampered_signature_fails_only_step_4() {
        let (compact, canonical, public_key) = signed_fixture();

        let segments: Vec<&str> = compact.split('.').collect();
        let mut sig = kassa_core::base64url::decode(segments[2]).unwrap();
        sig[10] ^= 0xff;
        let tampered = format!(
            "{}.{}.{}",
            segments[0],
            segments[1],
            kassa_core::base64url::encode(&sig)
        );

        let report = verify_compact_signature(&tampered, &canonical, REGISTER, &public_key);

        assert_eq!(report.step(3).unwrap().status, StepStatus::Pass);
        assert_eq!(report.step(4).unwrap().status, StepStatus::Fail);
        assert_eq!(report.step(5).unwrap().status, StepStatus::Pass);
    }
}
