//! # Tracking Codec
//!
//! Encodes the structured tracking record embedded in a QR code's target URL
//! into a URL-safe opaque token, and back.
//!
//! ## Token Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              TrackingRecord ⇄ Token                                     │
//! │                                                                         │
//! │  { type, business_id, location_id?, scan_nonce,                        │
//! │    issued_at, schema_version }                                         │
//! │        │                                           ▲                    │
//! │        │ serde_json (stable field order)           │ parse              │
//! │        ▼                                           │                    │
//! │  canonical JSON bytes ────── sha256 hex ──► qr_hash (stored on QrCode) │
//! │        │                                           ▲                    │
//! │        │ base64 URL_SAFE_NO_PAD                    │ decode             │
//! │        ▼                                           │                    │
//! │  opaque token  ──────────────────────────────────►─┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The codec carries no signature. Integrity comes from the companion hash:
//! the registry recomputes `record_hash` from decoded data and trusts the
//! fields only if it matches a known QrCode row.
//!
//! Decoding must be tolerant of tokens of any length and content — garbage in
//! is `DecodeError::Malformed` out, never a panic.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Record type marker carried in every token.
pub const RECORD_TYPE: &str = "affiliate_qr";

/// Current schema version written into new tokens.
pub const SCHEMA_VERSION: &str = "1.0";

// =============================================================================
// Tracking Record
// =============================================================================

/// The structured payload embedded in a QR code's target URL.
///
/// Field order is fixed by the struct definition, which keeps the JSON —
/// and therefore both the token and the integrity hash — deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub scan_nonce: String,
    /// Issue time as epoch seconds.
    pub issued_at: i64,
    pub schema_version: String,
}

impl TrackingRecord {
    /// Builds a record for a new QR code issuance.
    pub fn new(
        business_id: impl Into<String>,
        location_id: Option<String>,
        scan_nonce: impl Into<String>,
        issued_at: i64,
    ) -> Self {
        TrackingRecord {
            record_type: RECORD_TYPE.to_string(),
            business_id: business_id.into(),
            location_id,
            scan_nonce: scan_nonce.into(),
            issued_at,
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }
}

/// Fields recovered from a token that fails strict decoding but still parses
/// as a JSON object. Used by the scan pipeline's fallback ladder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub business_id: Option<String>,
    pub location_id: Option<String>,
    pub scan_nonce: Option<String>,
    pub issued_at: Option<i64>,
}

// =============================================================================
// Errors
// =============================================================================

/// Token decode failure.
///
/// Deliberately carries no detail about WHICH stage failed: callers surface a
/// generic "invalid or expired" signal so the encoding scheme cannot be
/// probed error-by-error.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed tracking token")]
    Malformed,
}

// =============================================================================
// Encode / Decode
// =============================================================================

/// Encodes a tracking record into a URL-safe opaque token.
///
/// Deterministic: the same record always yields the same token. The
/// URL_SAFE_NO_PAD engine performs the `+`→`-`, `/`→`_` mapping and strips
/// the trailing `=` padding.
pub fn encode(record: &TrackingRecord) -> String {
    // Serializing a fully-typed struct cannot fail.
    let json = serde_json::to_vec(record).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decodes a token back into a tracking record.
///
/// Any failure — bad base64, bad UTF-8, bad JSON, wrong shape — is
/// `DecodeError::Malformed`.
pub fn decode(token: &str) -> Result<TrackingRecord, DecodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .map_err(|_| DecodeError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| DecodeError::Malformed)
}

/// Lenient decode: recovers whatever known fields are present in a token
/// whose payload parses as a JSON object, even if the full record shape
/// does not.
///
/// Returns `Malformed` only when nothing object-like can be recovered.
pub fn decode_lenient(token: &str) -> Result<PartialRecord, DecodeError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .map_err(|_| DecodeError::Malformed)?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| DecodeError::Malformed)?;
    let obj = value.as_object().ok_or(DecodeError::Malformed)?;

    let as_string = |key: &str| -> Option<String> {
        match obj.get(key) {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    };

    Ok(PartialRecord {
        business_id: as_string("business_id"),
        location_id: as_string("location_id"),
        scan_nonce: as_string("scan_nonce"),
        issued_at: obj.get("issued_at").and_then(|v| v.as_i64()),
    })
}

/// Computes the integrity hash of a record: sha256 hex of the canonical JSON
/// (the pre-encoded bytes, NOT the token).
///
/// Stored on the QrCode row at issue time; the registry recomputes it from
/// decoded data to confirm the token maps to a known code before trusting
/// any decoded field.
pub fn record_hash(record: &TrackingRecord) -> String {
    let json = serde_json::to_vec(record).unwrap_or_default();
    let digest = Sha256::digest(&json);
    hex::encode(digest)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> TrackingRecord {
        TrackingRecord::new(
            "biz-42",
            Some("loc-7".to_string()),
            "qr_66f1a2b3",
            1_760_000_000,
        )
    }

    #[test]
    fn test_round_trip() {
        let r = record();
        let token = encode(&r);
        assert_eq!(decode(&token).unwrap(), r);
    }

    #[test]
    fn test_round_trip_without_location() {
        let r = TrackingRecord::new("biz-1", None, "qr_x", 1);
        assert_eq!(decode(&encode(&r)).unwrap(), r);
    }

    #[test]
    fn test_encode_is_deterministic_and_url_safe() {
        let r = record();
        let a = encode(&r);
        let b = encode(&r);
        assert_eq!(a, b);
        assert!(!a.contains('+'));
        assert!(!a.contains('/'));
        assert!(!a.contains('='));
    }

    #[test]
    fn test_decode_garbage_never_panics() {
        for garbage in [
            "",
            "!!!!",
            "a",
            "====",
            "not-base64-at-all ***",
            "AAAA",        // decodes to bytes that are not JSON
            "bnVsbA",      // "null" - JSON but not an object
            "WzEsMl0",     // "[1,2]" - JSON array
            "eyJmb28iOg",  // truncated JSON object
        ] {
            assert_eq!(decode(garbage), Err(DecodeError::Malformed), "{garbage:?}");
        }
    }

    #[test]
    fn test_decode_tolerates_stray_padding() {
        let r = record();
        let padded = format!("{}==", encode(&r));
        assert_eq!(decode(&padded).unwrap(), r);
    }

    #[test]
    fn test_lenient_decode_recovers_partial_fields() {
        // An object with only some known fields and an unexpected extra.
        let json = br#"{"business_id":"biz-9","scan_nonce":"qr_abc","extra":true}"#;
        let token = URL_SAFE_NO_PAD.encode(json);

        assert!(decode(&token).is_err(), "strict decode must reject");
        let partial = decode_lenient(&token).unwrap();
        assert_eq!(partial.business_id.as_deref(), Some("biz-9"));
        assert_eq!(partial.scan_nonce.as_deref(), Some("qr_abc"));
        assert_eq!(partial.location_id, None);
        assert_eq!(partial.issued_at, None);
    }

    #[test]
    fn test_lenient_decode_rejects_non_objects() {
        let token = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert_eq!(decode_lenient(&token), Err(DecodeError::Malformed));
    }

    #[test]
    fn test_record_hash_is_stable_and_tamper_evident() {
        let r = record();
        assert_eq!(record_hash(&r), record_hash(&r));
        assert_eq!(record_hash(&r).len(), 64);

        let mut tampered = r.clone();
        tampered.business_id = "biz-43".to_string();
        assert_ne!(record_hash(&r), record_hash(&tampered));
    }

    #[test]
    fn test_hash_covers_record_not_token() {
        // Re-encoding does not change the hash: it is bound to the record.
        let r = record();
        let decoded = decode(&encode(&r)).unwrap();
        assert_eq!(record_hash(&r), record_hash(&decoded));
    }
}
