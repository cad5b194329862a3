//! # Token Generation
//!
//! All opaque identifiers handed out by the engine are minted here.
//!
//! ## Token Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Family           Shape                        Purpose                  │
//! │  ───────────      ─────────────────────────    ───────────────────────  │
//! │  short code       8 chars, A-Z 2-9             public landing-URL slug  │
//! │  scan nonce       qr_<12 hex>                  binds token to QrCode    │
//! │  SCAN- token      SCAN-<uuid>                  per-scan booking handle  │
//! │  SESSION- token   SESSION-<32 hex>             scan continuity /        │
//! │                                                 dashboard sessions      │
//! │  AFF- token       AFF-<40 hex>                 business bearer token    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Short codes deliberately exclude 0/O/1/I — they end up printed next to QR
//! codes and get typed by hand.

use rand::Rng;
use uuid::Uuid;

use qrtrack_core::SHORT_CODE_LEN;

/// Short-code alphabet: uppercase letters and digits minus the four
/// characters commonly misread in print.
const SHORT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates a random short code.
///
/// Uniqueness is NOT guaranteed here; the registry inserts and retries on a
/// collision. 32^8 values make a collision rare but not impossible.
pub fn short_code() -> String {
    let mut rng = rand::thread_rng();
    (0..SHORT_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..SHORT_CODE_ALPHABET.len());
            SHORT_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// Generates the nonce embedded in a tracking record at issue time.
pub fn scan_nonce() -> String {
    format!("qr_{}", random_hex(12))
}

/// Generates the unique per-scan token handed to the booking flow.
pub fn scan_token() -> String {
    format!("SCAN-{}", Uuid::new_v4())
}

/// Generates a session token, shared by dashboard sessions and anonymous
/// scan-continuity sessions.
pub fn session_token() -> String {
    format!("SESSION-{}", random_hex(32))
}

/// Generates a long-lived dashboard bearer token for a business.
pub fn dashboard_token() -> String {
    format!("AFF-{}", random_hex(40))
}

fn random_hex(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let digit: u8 = rng.gen_range(0..16);
            char::from_digit(digit as u32, 16).unwrap_or('0')
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
