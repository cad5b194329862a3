//! # Engine Errors
//!
//! The operational layer's error type. Wraps domain ([`CoreError`]) and
//! storage ([`DbError`]) failures and adds the rejections the pipelines
//! themselves produce.
//!
//! ## Mapping Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Repository guarded writes return bool, not errors:                     │
//! │                                                                         │
//! │    rows_affected = 0  ──►  the engine decides WHAT that means:          │
//! │                                                                         │
//! │    commission approve refused    → CoreError::InvalidTransition         │
//! │    usage counter refused         → QrRejection::UsageLimitReached       │
//! │    booking completion replayed   → EngineError::BookingAlreadyRecorded  │
//! │                                                                         │
//! │  Scan-facing failures collapse into ONE public rejection reason so the  │
//! │  validity machinery cannot be probed error-by-error.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use qrtrack_core::error::CoreError;
use qrtrack_db::DbError;

/// Why a scan or validity check rejected a QR code.
///
/// Internal diagnostic detail; the public surface reports every variant as
/// the same generic "invalid or expired" outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrRejection {
    /// No code matches the presented short code or token.
    UnknownCode,
    /// Decoded token failed the integrity-hash check.
    IntegrityMismatch,
    /// Code status is not `active`.
    NotActive,
    /// Current time is outside [valid_from, valid_until) or past expires_at.
    OutsideWindow,
    /// Total usage limit consumed.
    UsageLimitReached,
    /// Per-day scan limit consumed.
    DailyLimitReached,
    /// Per-month scan limit consumed.
    MonthlyLimitReached,
    /// Owning business is missing, unverified, suspended, or deleted.
    BusinessNotEligible,
}

impl QrRejection {
    /// Stable diagnostic label written to logs (never to the public surface).
    pub fn as_str(self) -> &'static str {
        match self {
            QrRejection::UnknownCode => "unknown_code",
            QrRejection::IntegrityMismatch => "integrity_mismatch",
            QrRejection::NotActive => "not_active",
            QrRejection::OutsideWindow => "outside_window",
            QrRejection::UsageLimitReached => "usage_limit_reached",
            QrRejection::DailyLimitReached => "daily_limit_reached",
            QrRejection::MonthlyLimitReached => "monthly_limit_reached",
            QrRejection::BusinessNotEligible => "business_not_eligible",
        }
    }
}

/// Operational-layer errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Domain rule or state-machine guard failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Storage failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Referenced business does not exist.
    #[error("Business not found: {business_id}")]
    BusinessNotFound { business_id: String },

    /// Business exists but may not operate (unverified/suspended/deleted).
    #[error("Business {business_id} is not eligible: {reason}")]
    BusinessNotEligible {
        business_id: String,
        reason: &'static str,
    },

    /// Referenced QR code does not exist.
    #[error("QR code not found: {qr_id}")]
    QrNotFound { qr_id: String },

    /// The single public signal for anything wrong with a presented code.
    #[error("QR code is invalid or expired")]
    InvalidOrExpired,

    /// Short-code generation kept colliding; the space needs widening.
    #[error("Could not allocate a unique short code after {attempts} attempts")]
    ShortCodeSpaceExhausted { attempts: u32 },

    /// Referenced scan does not exist.
    #[error("Scan not found: {scan_token}")]
    ScanNotFound { scan_token: String },

    /// The scan's booking outcome was already written.
    #[error("Scan {scan_id} already has booking {booking_id} recorded")]
    BookingAlreadyRecorded { scan_id: String, booking_id: String },

    /// Referenced session does not exist.
    #[error("Session not found")]
    SessionNotFound,

    /// Operation on a revoked session that only reactivation can undo.
    #[error("Session has been revoked: {reason}")]
    SessionRevoked { reason: String },

    /// Presented dashboard credential is missing, expired, or revoked.
    #[error("Dashboard credential is invalid or expired")]
    InvalidCredential,

    /// Per-business overrides are disabled by global settings.
    #[error("Business-specific overrides are disabled globally")]
    OverridesDisabled,
}

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
