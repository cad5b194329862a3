//! # Domain Types
//!
//! Core domain types used throughout qrtrack.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Business     │──►│     QrCode      │──►│  CustomerScan   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  short_code     │   │  session_token  │       │
//! │  │  status         │   │  qr_hash        │   │  device/geo     │       │
//! │  │  dashboard tok. │   │  validity win.  │   │  fraud signals  │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │        │    │                                          │                │
//! │        │    └──► BusinessLocation, BusinessModel       ▼                │
//! │        │                                      ┌─────────────────┐       │
//! │        └──► DashboardSession                  │   Commission    │       │
//! │                                               │  (1 per scan)   │       │
//! │  GlobalSettings (singleton)                   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string, immutable, used for relations
//! - Monetary amounts: integer cents; percentage values: basis points
//! - Enum-like strings from the storage layer are closed Rust enums so an
//!   unrecognized value is a compile-checked fallback path, not a runtime
//!   string-comparison bug

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Status Enums
// =============================================================================

/// Discount variants a QR code can carry.
///
/// `FreeDelivery`/`FreeUpgrade` are non-monetary perks: they are valid
/// configuration but contribute zero to the monetary discount calculation
/// (fail-safe-closed, see the calculator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Discount value is basis points of the booking amount.
    Percentage,
    /// Discount value is a flat amount in cents, capped at the booking amount.
    FixedAmount,
    /// Non-monetary perk; zero monetary discount.
    FreeDelivery,
    /// Non-monetary perk; zero monetary discount.
    FreeUpgrade,
}

impl Default for DiscountType {
    fn default() -> Self {
        DiscountType::Percentage
    }
}

/// Commission variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    /// Rate is basis points of the commissionable amount.
    Percentage,
    /// Rate is a flat payout in cents, not scaled by amount.
    Fixed,
    /// Single-band lookup over the commissionable amount.
    /// Deliberately NOT a progressive marginal tier; changing this would
    /// alter observable commission output.
    Tiered,
}

impl Default for CommissionType {
    fn default() -> Self {
        CommissionType::Percentage
    }
}

/// QR code lifecycle states.
///
/// ```text
/// pending ──► active ◄──► inactive
///               ▲ │
///               │ ▼
///            suspended      active ──► expired (automatic, terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum QrStatus {
    Pending,
    Active,
    Inactive,
    Suspended,
    Expired,
}

impl QrStatus {
    /// Whether a manual transition from `self` to `to` is allowed.
    ///
    /// `Expired` is terminal and only ever reached automatically; it is not
    /// a valid manual target, and nothing leaves it.
    pub fn can_transition_to(self, to: QrStatus) -> bool {
        use QrStatus::*;
        matches!(
            (self, to),
            (Pending, Active)
                | (Active, Inactive)
                | (Active, Suspended)
                | (Inactive, Active)
                | (Suspended, Active)
        )
    }
}

impl Default for QrStatus {
    fn default() -> Self {
        QrStatus::Pending
    }
}

/// Commission lifecycle states.
///
/// ```text
/// pending ──► approved ──► paid (terminal)
///    │  │        │  ▲
///    │  └────────┼──┼──► rejected (terminal)
///    │           ▼  │
///    └──────► disputed ──► rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
    Disputed,
}

impl CommissionStatus {
    /// Whether a transition from `self` to `to` is allowed.
    pub fn can_transition_to(self, to: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Disputed)
                | (Approved, Paid)
                | (Approved, Rejected)
                | (Approved, Disputed)
                | (Disputed, Approved)
                | (Disputed, Rejected)
        )
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, CommissionStatus::Paid | CommissionStatus::Rejected)
    }
}

/// Business verification states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
}

/// Business lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BusinessStatus {
    Pending,
    Active,
    Suspended,
}

/// Kinds of merchant entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum BusinessType {
    Hotel,
    TravelAgent,
    Partner,
    HotelChain,
}

/// Outcome recorded on a scan row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ScanResult {
    Success,
    Rejected,
}

/// Coarse device classification from the user-agent string.
/// Advisory field, never used in a security decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

// =============================================================================
// Business
// =============================================================================

/// A merchant entity (hotel, travel agent, partner).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Business {
    pub id: String,
    pub name: String,
    pub business_type: BusinessType,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub currency: String,
    pub verification_status: VerificationStatus,
    pub status: BusinessStatus,
    pub verified_at: Option<DateTime<Utc>>,
    /// Long-lived coarse-grained bearer credential for the dashboard.
    /// Coexists with [`DashboardSession`] rows, which are the fine-grained
    /// mechanism.
    pub dashboard_access_token: Option<String>,
    pub dashboard_token_expires_at: Option<DateTime<Utc>>,
    pub last_dashboard_access: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Business {
    /// Checks if the business is verified.
    #[inline]
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Checks if the business is active (and not soft-deleted).
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == BusinessStatus::Active && self.deleted_at.is_none()
    }

    /// Dashboard bearer token validity: non-null token, unexpired, business
    /// active. All three required.
    pub fn is_dashboard_token_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.dashboard_access_token.is_some()
            && self
                .dashboard_token_expires_at
                .map(|exp| exp > now)
                .unwrap_or(false)
            && self.is_active()
    }
}

// =============================================================================
// Business Location
// =============================================================================

/// A physical point belonging to exactly one business, used for geo-matching
/// scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BusinessLocation {
    pub id: String,
    pub business_id: String,
    pub name: String,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    /// Matching radius in meters around the coordinates.
    pub accuracy_radius_m: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Business Model (override row)
// =============================================================================

/// Optional business-specific override of commercial terms.
///
/// ## Semantics
/// `None` in any field means "defer to global settings", NOT "zero".
/// Zero-or-one row per business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BusinessModelOverrides {
    pub id: String,
    pub business_id: String,
    pub discount_type: Option<DiscountType>,
    /// Basis points for percentage, cents for fixed_amount.
    pub discount_value: Option<i64>,
    pub min_booking_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
    /// Basis points for percentage, cents for fixed.
    pub commission_rate: Option<i64>,
    pub commission_type: Option<CommissionType>,
    pub payout_threshold_cents: Option<i64>,
    pub max_qr_per_month: Option<i64>,
    pub qr_validity_days: Option<i64>,
    pub configured_at: DateTime<Utc>,
}

// =============================================================================
// Global Settings (singleton)
// =============================================================================

/// Process-wide default commercial terms and operational limits.
///
/// Exactly one live row (fixed id); created lazily with safe defaults when
/// absent. Always re-read at resolution time, never cached indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct GlobalSettings {
    pub id: i64,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_booking_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
    pub commission_rate: i64,
    pub commission_type: CommissionType,
    pub payout_threshold_cents: i64,
    pub max_qr_per_month: i64,
    pub qr_validity_days: i64,
    /// Window within which repeat scans share one anonymous session.
    pub session_tracking_hours: i64,
    pub allow_business_override: bool,
    pub require_business_verification: bool,
    pub auto_approve_commissions: bool,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// QR Code
// =============================================================================

/// An issued QR code artifact.
///
/// ## Snapshot Pattern
/// Discount terms are copied from the effective business model at issue time
/// and do NOT track later changes — a printed code must keep honoring what it
/// advertised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QrCode {
    pub id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    /// Opaque unique value identifying the artifact.
    pub qr_value: String,
    /// sha256 hex of the pre-encoded tracking record; decoded tokens are
    /// trusted only after re-hashing matches this column.
    pub qr_hash: String,
    /// Compact public token embedded in the landing URL.
    pub short_code: String,
    pub qr_url: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_booking_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
    pub status: QrStatus,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub usage_limit: Option<i64>,
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
    pub current_usage: i64,
    pub total_scans: i64,
    pub unique_scans: i64,
    pub conversion_count: i64,
    pub total_revenue_cents: i64,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl QrCode {
    /// The five-condition validity check.
    ///
    /// Each condition is independent; any failing one invalidates:
    /// 1. status == active
    /// 2. valid_from unset or <= now
    /// 3. valid_until unset or > now
    /// 4. expires_at unset or > now
    /// 5. usage_limit unset/zero or current_usage < usage_limit
    ///
    /// This is deliberately only the QR-level check; business-level activity
    /// is a separate layer (see the registry) and must not be folded in here.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != QrStatus::Active {
            return false;
        }
        if let Some(from) = self.valid_from {
            if from > now {
                return false;
            }
        }
        if let Some(until) = self.valid_until {
            if until <= now {
                return false;
            }
        }
        if let Some(expires) = self.expires_at {
            if expires <= now {
                return false;
            }
        }
        if let Some(limit) = self.usage_limit {
            if limit > 0 && self.current_usage >= limit {
                return false;
            }
        }
        true
    }

    /// Whether the validity window has passed (candidate for the automatic
    /// `expired` transition).
    pub fn is_past_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map(|t| t <= now).unwrap_or(false)
            || self.expires_at.map(|t| t <= now).unwrap_or(false)
    }

    /// Scans-to-conversions ratio as a percentage.
    pub fn conversion_rate(&self) -> f64 {
        if self.total_scans == 0 {
            return 0.0;
        }
        self.conversion_count as f64 / self.total_scans as f64 * 100.0
    }
}

// =============================================================================
// Customer Scan
// =============================================================================

/// One scan event.
///
/// Immutable once `scan_result` is finalized, except for the booking-outcome
/// fields which are written exactly once when a booking completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CustomerScan {
    pub id: String,
    pub qr_code_id: String,
    /// Authenticated customer, if any.
    pub customer_id: Option<String>,
    /// Anonymous session token shared by repeat scans within the tracking
    /// window.
    pub session_token: String,
    /// Unique per-scan token handed to the booking flow.
    pub scan_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
    pub browser: String,
    pub platform: String,
    pub detected_latitude: Option<f64>,
    pub detected_longitude: Option<f64>,
    pub detected_accuracy_m: Option<i64>,
    pub matched_location_id: Option<String>,
    pub location_distance_km: Option<f64>,
    pub scan_date: NaiveDate,
    pub scan_hour: i64,
    pub user_timezone: String,
    pub scan_result: ScanResult,
    /// 0-100 additive advisory score.
    pub fraud_score: i64,
    pub is_suspicious: bool,
    /// JSON array of signal names that contributed to the score.
    pub fraud_flags: String,
    pub booking_initiated: bool,
    pub booking_completed: bool,
    pub booking_id: Option<String>,
    pub conversion_time_minutes: Option<i64>,
    pub scanned_at: DateTime<Utc>,
}

impl CustomerScan {
    /// Whether this scan converted into a completed booking.
    #[inline]
    pub fn has_booking(&self) -> bool {
        self.booking_completed && self.booking_id.is_some()
    }

    /// Parsed fraud signal names. A malformed column yields an empty list
    /// rather than an error; the flags are advisory.
    pub fn fraud_flag_list(&self) -> Vec<String> {
        serde_json::from_str(&self.fraud_flags).unwrap_or_default()
    }
}

// =============================================================================
// Commission
// =============================================================================

/// One append-only audit entry on a commission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// What happened: "created", "approved", "paid", "rejected",
    /// "dispute_created", "dispute_resolved".
    pub action: String,
    /// Who did it, when known.
    pub actor: Option<String>,
    pub at: DateTime<Utc>,
    /// Free-form context (reason, payment reference, resolution).
    pub data: serde_json::Value,
}

/// A payable record derived from a scan + completed booking.
/// Exactly one per converting scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Commission {
    pub id: String,
    pub business_id: String,
    pub location_id: Option<String>,
    pub scan_id: String,
    pub booking_id: String,
    pub customer_id: Option<String>,
    pub booking_amount_cents: i64,
    pub discount_amount_cents: i64,
    /// Booking amount minus discount: the base commission is computed on.
    pub commissionable_amount_cents: i64,
    /// Raw rate as configured (bps for percentage, cents for fixed).
    pub commission_rate: i64,
    pub commission_type: CommissionType,
    pub commission_amount_cents: i64,
    pub tax_amount_cents: i64,
    /// Commission after tax/dispute adjustments.
    pub net_commission_cents: i64,
    pub status: CommissionStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub transaction_reference: Option<String>,
    pub dispute_reason: Option<String>,
    pub dispute_resolution: Option<String>,
    pub dispute_resolved_at: Option<DateTime<Utc>>,
    /// Append-only JSON array; this layer never summarizes or compacts it.
    pub audit_log: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commission {
    #[inline]
    pub fn commission_amount(&self) -> Money {
        Money::from_cents(self.commission_amount_cents)
    }

    #[inline]
    pub fn net_commission(&self) -> Money {
        Money::from_cents(self.net_commission_cents)
    }

    /// Parsed audit trail, oldest first. Entries are written by the ledger;
    /// a malformed column yields an empty list.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        serde_json::from_str(&self.audit_log).unwrap_or_default()
    }
}

// =============================================================================
// Dashboard Session
// =============================================================================

/// A revocable, expiring credential for dashboard access.
///
/// Distinct from the business's long-lived `dashboard_access_token`; the two
/// mechanisms coexist and either one independently grants access (legacy
/// duality, preserved as-is).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DashboardSession {
    pub id: String,
    pub business_id: String,
    pub session_token: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_type: DeviceType,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DashboardSession {
    /// Session validity: `is_active` AND unexpired AND not revoked — all
    /// three required.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now && self.revoked_at.is_none()
    }

    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn qr_fixture(now: DateTime<Utc>) -> QrCode {
        QrCode {
            id: "qr-1".to_string(),
            business_id: "biz-1".to_string(),
            location_id: None,
            qr_value: "QR-TEST".to_string(),
            qr_hash: "deadbeef".to_string(),
            short_code: "ABCDEF123456".to_string(),
            qr_url: "https://example.test/r/ABCDEF123456".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 1000,
            min_booking_amount_cents: None,
            max_discount_amount_cents: None,
            status: QrStatus::Active,
            valid_from: Some(now - Duration::days(1)),
            valid_until: Some(now + Duration::days(30)),
            expires_at: None,
            usage_limit: None,
            daily_limit: None,
            monthly_limit: None,
            current_usage: 0,
            total_scans: 0,
            unique_scans: 0,
            conversion_count: 0,
            total_revenue_cents: 0,
            last_scanned_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_qr_valid_when_all_conditions_hold() {
        let now = Utc::now();
        assert!(qr_fixture(now).is_valid_at(now));
    }

    #[test]
    fn test_qr_invalid_status() {
        let now = Utc::now();
        for status in [
            QrStatus::Pending,
            QrStatus::Inactive,
            QrStatus::Suspended,
            QrStatus::Expired,
        ] {
            let mut qr = qr_fixture(now);
            qr.status = status;
            assert!(!qr.is_valid_at(now), "{status:?} should invalidate");
        }
    }

    #[test]
    fn test_qr_invalid_before_valid_from() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.valid_from = Some(now + Duration::hours(1));
        assert!(!qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_invalid_after_valid_until() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.valid_until = Some(now - Duration::hours(1));
        assert!(!qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_invalid_after_expires_at() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.expires_at = Some(now - Duration::seconds(1));
        assert!(!qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_invalid_at_usage_limit() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.usage_limit = Some(1);
        qr.current_usage = 1;
        assert!(!qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_zero_usage_limit_means_unlimited() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.usage_limit = Some(0);
        qr.current_usage = 10_000;
        assert!(qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_unset_windows_are_open() {
        let now = Utc::now();
        let mut qr = qr_fixture(now);
        qr.valid_from = None;
        qr.valid_until = None;
        qr.expires_at = None;
        assert!(qr.is_valid_at(now));
    }

    #[test]
    fn test_qr_status_transitions() {
        use QrStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(Active.can_transition_to(Inactive));
        assert!(Inactive.can_transition_to(Active));

        // expired is terminal and never a manual target
        assert!(!Active.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Active));
        // no shortcuts
        assert!(!Pending.can_transition_to(Suspended));
        assert!(!Inactive.can_transition_to(Suspended));
    }

    #[test]
    fn test_commission_status_transitions() {
        use CommissionStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Disputed));
        assert!(Approved.can_transition_to(Disputed));
        assert!(Disputed.can_transition_to(Approved));
        assert!(Disputed.can_transition_to(Rejected));

        assert!(Paid.is_terminal());
        assert!(Rejected.is_terminal());
        assert!(!Paid.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Paid), "approval cannot be skipped");
    }

    #[test]
    fn test_session_validity() {
        let now = Utc::now();
        let session = DashboardSession {
            id: "s-1".to_string(),
            business_id: "biz-1".to_string(),
            session_token: "SESSION-X".to_string(),
            ip_address: None,
            user_agent: None,
            device_type: DeviceType::Desktop,
            expires_at: now + Duration::days(30),
            last_accessed_at: None,
            is_active: true,
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };
        assert!(session.is_valid_at(now));

        let mut expired = session.clone();
        expired.expires_at = now - Duration::seconds(1);
        assert!(!expired.is_valid_at(now));

        let mut inactive = session.clone();
        inactive.is_active = false;
        assert!(!inactive.is_valid_at(now));

        let mut revoked = session;
        revoked.revoked_at = Some(now);
        assert!(!revoked.is_valid_at(now), "revoked_at alone must invalidate");
    }

    #[test]
    fn test_dashboard_token_validity_requires_active_business() {
        let now = Utc::now();
        let mut business = Business {
            id: "biz-1".to_string(),
            name: "Hotel Sol".to_string(),
            business_type: BusinessType::Hotel,
            contact_email: "front@sol.test".to_string(),
            contact_phone: None,
            website: None,
            city: None,
            country: None,
            currency: "EUR".to_string(),
            verification_status: VerificationStatus::Verified,
            status: BusinessStatus::Active,
            verified_at: Some(now),
            dashboard_access_token: Some("AFF-TOKEN".to_string()),
            dashboard_token_expires_at: Some(now + Duration::days(30)),
            last_dashboard_access: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        assert!(business.is_dashboard_token_valid_at(now));

        business.status = BusinessStatus::Suspended;
        assert!(!business.is_dashboard_token_valid_at(now));

        business.status = BusinessStatus::Active;
        business.dashboard_access_token = None;
        assert!(!business.is_dashboard_token_valid_at(now));
    }
}
