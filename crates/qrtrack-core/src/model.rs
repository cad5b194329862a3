//! # Effective Business Model
//!
//! Merges a business's optional commercial-term overrides with global
//! defaults into a record with NO optional fields.
//!
//! ## Resolution Order
//! ```text
//! business override (if present and non-null)
//!      └─else─► global settings field
//!                   └─else─► hard-coded safe default
//! ```
//!
//! The merge itself is pure; loading the rows (and lazily creating the
//! settings singleton) is the engine resolver's job.

use serde::{Deserialize, Serialize};

use crate::types::{BusinessModelOverrides, CommissionType, DiscountType, GlobalSettings};

// =============================================================================
// Hard Defaults
// =============================================================================

/// Safe defaults used when neither an override nor a global value exists.
/// These also seed the lazily-created settings singleton.
pub mod defaults {
    use crate::types::{CommissionType, DiscountType};

    pub const DISCOUNT_TYPE: DiscountType = DiscountType::Percentage;
    pub const DISCOUNT_VALUE: i64 = 0;
    pub const COMMISSION_TYPE: CommissionType = CommissionType::Percentage;
    pub const COMMISSION_RATE: i64 = 0;
    /// 100.00 in cents.
    pub const PAYOUT_THRESHOLD_CENTS: i64 = 10_000;
    pub const MAX_QR_PER_MONTH: i64 = 100;
    pub const QR_VALIDITY_DAYS: i64 = 365;
    pub const SESSION_TRACKING_HOURS: i64 = 24;
}

// =============================================================================
// Effective Model
// =============================================================================

/// Fully-resolved commercial terms for one business. No optional semantics
/// remain except for genuinely optional bounds (min booking / max discount),
/// where `None` means "no bound".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveModel {
    pub discount_type: DiscountType,
    /// Basis points for percentage, cents for fixed_amount.
    pub discount_value: i64,
    pub min_booking_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
    /// Basis points for percentage, cents for fixed.
    pub commission_rate: i64,
    pub commission_type: CommissionType,
    pub payout_threshold_cents: i64,
    pub max_qr_per_month: i64,
    pub qr_validity_days: i64,
}

impl EffectiveModel {
    /// Field-by-field merge: override -> global -> hard default.
    ///
    /// Pure; no side effects. Absence of an override field defers to the
    /// global value, never to zero.
    pub fn merge(overrides: Option<&BusinessModelOverrides>, global: &GlobalSettings) -> Self {
        let o = overrides;
        EffectiveModel {
            discount_type: o
                .and_then(|m| m.discount_type)
                .unwrap_or(global.discount_type),
            discount_value: o
                .and_then(|m| m.discount_value)
                .unwrap_or(global.discount_value),
            min_booking_amount_cents: o
                .and_then(|m| m.min_booking_amount_cents)
                .or(global.min_booking_amount_cents),
            max_discount_amount_cents: o
                .and_then(|m| m.max_discount_amount_cents)
                .or(global.max_discount_amount_cents),
            commission_rate: o
                .and_then(|m| m.commission_rate)
                .unwrap_or(global.commission_rate),
            commission_type: o
                .and_then(|m| m.commission_type)
                .unwrap_or(global.commission_type),
            payout_threshold_cents: o
                .and_then(|m| m.payout_threshold_cents)
                .unwrap_or(global.payout_threshold_cents),
            max_qr_per_month: o
                .and_then(|m| m.max_qr_per_month)
                .unwrap_or(global.max_qr_per_month),
            qr_validity_days: o
                .and_then(|m| m.qr_validity_days)
                .unwrap_or(global.qr_validity_days),
        }
    }
}

/// The terms an absent configuration resolves to.
impl Default for EffectiveModel {
    fn default() -> Self {
        EffectiveModel {
            discount_type: defaults::DISCOUNT_TYPE,
            discount_value: defaults::DISCOUNT_VALUE,
            min_booking_amount_cents: None,
            max_discount_amount_cents: None,
            commission_rate: defaults::COMMISSION_RATE,
            commission_type: defaults::COMMISSION_TYPE,
            payout_threshold_cents: defaults::PAYOUT_THRESHOLD_CENTS,
            max_qr_per_month: defaults::MAX_QR_PER_MONTH,
            qr_validity_days: defaults::QR_VALIDITY_DAYS,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
