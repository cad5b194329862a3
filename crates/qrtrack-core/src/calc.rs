//! # Discount & Commission Calculator
//!
//! Pure function layer computing discount and commission amounts from a
//! resolved business model and a booking amount. No I/O, no clock, no
//! randomness.
//!
//! ## Calculation Flow
//! ```text
//! booking_amount
//!      │
//!      ▼
//! discount(model, booking) ──► 0 if booking < min_booking_amount
//!      │                       percentage: booking × bps (half-up)
//!      │                       fixed_amount: min(value, booking)
//!      │                       clamped to max_discount_amount
//!      ▼
//! commissionable = booking - discount
//!      │
//!      ▼
//! commission(model, booking, discount)
//!                              percentage: commissionable × bps (half-up)
//!                              fixed: rate verbatim (not scaled)
//!                              tiered: single matching band × full amount
//! ```
//!
//! These functions never fail for valid numeric input. Non-monetary discount
//! variants and rate-less models degrade to zero — fail-safe-closed, the
//! platform never over-grants.

use crate::model::EffectiveModel;
use crate::money::Money;
use crate::types::{CommissionType, DiscountType};

// =============================================================================
// Tiered Bands
// =============================================================================

/// Single-band tiered commission: the full commissionable amount is charged
/// at the one matching band.
///
/// Deliberately NOT a progressive marginal tier — this mirrors observed
/// payout behavior and changing it would alter every tiered commission.
const TIER_BANDS: &[(i64, i64)] = &[
    (10_000, 500), // up to 100.00 → 5%
    (50_000, 700), // up to 500.00 → 7%
];
/// Above the last band boundary → 10%.
const TIER_TOP_BPS: i64 = 1_000;

fn tiered_bps(commissionable: Money) -> i64 {
    for &(upper_cents, bps) in TIER_BANDS {
        if commissionable.cents() <= upper_cents {
            return bps;
        }
    }
    TIER_TOP_BPS
}

// =============================================================================
// Discount
// =============================================================================

/// Computes the discount for a booking under the given model.
///
/// Guarantees, for any input:
/// - result ≤ booking_amount
/// - result ≤ max_discount_amount when set
/// - result == 0 when booking_amount < min_booking_amount
pub fn discount(model: &EffectiveModel, booking_amount: Money) -> Money {
    if let Some(min) = model.min_booking_amount_cents {
        if booking_amount.cents() < min {
            return Money::zero();
        }
    }

    let raw = match model.discount_type {
        DiscountType::Percentage => booking_amount.apply_bps(model.discount_value),
        DiscountType::FixedAmount => Money::from_cents(model.discount_value).min(booking_amount),
        // Non-monetary perks: no monetary discount.
        DiscountType::FreeDelivery | DiscountType::FreeUpgrade => Money::zero(),
    };

    let capped = match model.max_discount_amount_cents {
        Some(max) => raw.min(Money::from_cents(max)),
        None => raw,
    };

    // A discount can never exceed the booking itself.
    capped.min(booking_amount)
}

// =============================================================================
// Commission
// =============================================================================

/// Computes the commission for a booking under the given model.
///
/// `commissionable = booking_amount - discount_amount`. Monotonically
/// non-decreasing in booking amount for percentage and fixed types.
pub fn commission(model: &EffectiveModel, booking_amount: Money, discount_amount: Money) -> Money {
    let commissionable = booking_amount - discount_amount;

    match model.commission_type {
        CommissionType::Percentage => commissionable.apply_bps(model.commission_rate),
        // Flat payout, not scaled by amount.
        CommissionType::Fixed => Money::from_cents(model.commission_rate),
        CommissionType::Tiered => commissionable.apply_bps(tiered_bps(commissionable)),
    }
}

/// Convenience: discount and commission in one pass, as the booking-completion
/// path consumes them.
pub fn settle(model: &EffectiveModel, booking_amount: Money) -> Settlement {
    let discount_amount = discount(model, booking_amount);
    let commission_amount = commission(model, booking_amount, discount_amount);
    Settlement {
        booking_amount,
        discount_amount,
        commissionable_amount: booking_amount - discount_amount,
        commission_amount,
    }
}

/// The computed money breakdown for one converted booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub booking_amount: Money,
    pub discount_amount: Money,
    pub commissionable_amount: Money,
    pub commission_amount: Money,
}

// =============================================================================
// Unit Tests
// =============================================================================
