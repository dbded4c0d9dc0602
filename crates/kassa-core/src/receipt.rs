//! # Canonical Receipt Data
//!
//! Builds the deterministic RKSV machine-readable process string that the
//! security device signs.
//!
//! ## Canonical Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  _R1-AT1_REG_RECEIPT_TIMESTAMP_A1_A2_A3_A4_A5_CTR_CERT_CHAIN            │
//! │                                                                         │
//! │  _R1-AT1      format prefix (signature suite identifier)                │
//! │  REG          cash register id                                          │
//! │  RECEIPT      receipt number                                            │
//! │  TIMESTAMP    UTC, second precision: 2026-03-01T10:15:00                │
//! │  A1..A5       gross amount per tax bucket, fixed order:                 │
//! │               Standard, Reduced1, Reduced2, Special, Zero               │
//! │  CTR          base64 of the turnover counter (cents)                    │
//! │  CERT         certificate serial of the signing device                  │
//! │  CHAIN        chain value derived from the previous signature           │
//! │                                                                         │
//! │  Same inputs → byte-identical string. The timestamp comes from the      │
//! │  caller, so signatures stay non-replayable across distinct calls        │
//! │  while the formatting itself is a pure function.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{ProcessType, TaxBracket};

/// Format prefix of the Austrian R1 signature suite.
pub const FORMAT_PREFIX: &str = "_R1-AT1";

/// Timestamp format inside the canonical string (UTC, second precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// =============================================================================
// Process Data
// =============================================================================

/// Everything that goes into one signed receipt string.
///
/// The struct is plain data; [`ProcessData::to_canonical_string`] is the only
/// place in the system that decides field order and formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessData {
    pub process_type: ProcessType,
    pub cash_register_id: String,
    pub receipt_number: String,
    pub timestamp: DateTime<Utc>,
    /// Gross amounts in canonical bucket order (see [`TaxBracket::ALL`]).
    pub bracket_amounts: [Money; 5],
    /// Running turnover counter in cents, after applying this receipt.
    pub turnover_counter_cents: i64,
    /// Certificate serial of the signing device.
    pub certificate_serial: String,
    /// Chain value linking this receipt to the previous signature.
    pub chain_value: String,
}

impl ProcessData {
    /// Sets the amount for one tax bucket.
    pub fn set_amount(&mut self, bracket: TaxBracket, amount: Money) {
        let idx = TaxBracket::ALL
            .iter()
            .position(|b| *b == bracket)
            .expect("bracket is always in ALL");
        self.bracket_amounts[idx] = amount;
    }

    /// Sum of all bucket amounts.
    pub fn total(&self) -> Money {
        self.bracket_amounts
            .iter()
            .fold(Money::zero(), |acc, a| acc + *a)
    }

    /// Renders the canonical machine-readable string.
    ///
    /// Deterministic: fixed field order, fixed timestamp format, fixed
    /// amount formatting. Two calls with the same data produce the same
    /// bytes, which is what makes checklist step 3 (hash comparison)
    /// meaningful.
    pub fn to_canonical_string(&self) -> String {
        let amounts: Vec<String> = self
            .bracket_amounts
            .iter()
            .map(Money::to_rksv_string)
            .collect();

        format!(
            "{prefix}_{ptype}_{register}_{receipt}_{ts}_{amounts}_{counter}_{cert}_{chain}",
            prefix = FORMAT_PREFIX,
            ptype = self.process_type.tag(),
            register = self.cash_register_id,
            receipt = self.receipt_number,
            ts = self.timestamp.format(TIMESTAMP_FORMAT),
            amounts = amounts.join("_"),
            counter = encode_counter(self.turnover_counter_cents),
            cert = self.certificate_serial,
            chain = self.chain_value,
        )
    }

    /// Extracts the cash register id from a canonical string.
    ///
    /// Used by checklist step 1 to compare the embedded device identity
    /// against the expected one without re-parsing the whole record.
    pub fn parse_register_id(canonical: &str) -> Option<&str> {
        // Field 0 is empty (leading underscore), 1 is "R1-AT1", 2 the
        // process tag, 3 the register id.
        canonical.split('_').nth(3).filter(|s| !s.is_empty())
    }
}

/// Encodes the turnover counter the way the receipt string carries it.
///
/// Certified hardware encrypts this counter (AES-ICM over the register key);
/// the software device carries it base64-plain, which keeps the field shape
/// identical for the verifier.
fn encode_counter(cents: i64) -> String {
    use crate::base64url;
    base64url::encode(cents.to_be_bytes())
}

// =============================================================================
// Chain Value
// =============================================================================

/// Derives the chain value for the next receipt.
///
/// First receipt of a register chains from the register id itself; every
/// later receipt chains from the previous compact signature. Only the first
/// 8 bytes of the SHA-256 digest are carried, as in the original format.
pub fn chain_value(previous_signature: Option<&str>, cash_register_id: &str) -> String {
    use crate::base64url;
    use sha2::{Digest, Sha256};

    let input = previous_signature.unwrap_or(cash_register_id);
    let digest = Sha256::digest(input.as_bytes());
    base64url::encode(&digest[..8])
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> ProcessData {
        ProcessData {
            process_type: ProcessType::Sign,
            cash_register_id: "AT-REG-001".into(),
            receipt_number: "20260301-01-0042".into(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap(),
            bracket_amounts: [
                Money::from_cents(12000),
                Money::zero(),
                Money::zero(),
                Money::zero(),
                Money::zero(),
            ],
            turnover_counter_cents: 52000,
            certificate_serial: "CERT-77".to_string(),
            chain_value: chain_value(None, "AT-REG-001"),
        }
    }

    #[test]
    fn test_canonical_string_is_deterministic() {
        let data = sample();
        assert_eq!(data.to_canonical_string(), data.to_canonical_string());
    }

    #[test]
    fn test_canonical_string_shape() {
        let canonical = sample().to_canonical_string();

        assert!(canonical.starts_with("_R1-AT1_BELEG_AT-REG-001_"));
        assert!(canonical.contains("_2026-03-01T10:15:00_"));
        assert!(canonical.contains("_120,00_0,00_0,00_0,00_0,00_"));
        assert!(canonical.ends_with(&chain_value(None, "AT-REG-001")));
    }

    #[test]
    fn test_parse_register_id() {
        let canonical = sample().to_canonical_string();
        assert_eq!(
            ProcessData::parse_register_id(&canonical),
            Some("AT-REG-001")
        );
        assert_eq!(ProcessData::parse_register_id("garbage"), None);
    }

    #[test]
    fn test_total_sums_buckets() {
        let mut data = sample();
        data.set_amount(TaxBracket::Reduced1, Money::from_cents(500));
        assert_eq!(data.total().cents(), 12500);
    }

    #[test]
    fn test_chain_value_changes_with_input() {
        let first = chain_value(None, "AT-REG-001");
        let second = chain_value(Some("ey.sig.value"), "AT-REG-001");
        assert_ne!(first, second);
        // Stable for the same input.
        assert_eq!(second, chain_value(Some("ey.sig.value"), "AT-REG-001"));
    }
}
