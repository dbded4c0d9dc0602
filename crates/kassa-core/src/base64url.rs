//! Base64url (RFC 4648 §5) helpers, always without padding.
//!
//! Every base64 field in the system goes through this module: the compact
//! signature segments, the turnover counter, and the chain value. RKSV
//! forbids `=` padding in the compact representation, so the padless engine
//! is the only one exposed.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Encodes bytes as base64url without padding.
pub fn encode(input: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Decodes a padless base64url string.
pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(input)
}

/// Checks the base64url well-formedness rules the checklist cares about:
/// non-empty, no `=` padding, only the url-safe alphabet, and a length
/// that is not ≡ 1 (mod 4).
pub fn is_well_formed(segment: &str) -> bool {
    if segment.is_empty() || segment.contains('=') {
        return false;
    }
    if segment.len() % 4 == 1 {
        return false;
    }
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"_R1-AT1_BELEG";
        let encoded = encode(data);
        assert!(!encoded.contains('='));
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed(&encode(b"payload")));
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("has=padding"));
        assert!(!is_well_formed("bad+alphabet/"));
        // length 5 ≡ 1 (mod 4) can never be valid base64
        assert!(!is_well_formed("abcde"));
    }
}
