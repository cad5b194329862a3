//! Input validation for business model overrides and QR issue requests.
//!
//! Rules enforced here are the pure, storage-independent ones. Uniqueness
//! and referential checks live with the repositories.

use crate::error::ValidationError;
use crate::types::{BusinessModelOverrides, CommissionType, DiscountType};

/// Upper bound for percentage values expressed in basis points (100%).
pub const MAX_BPS: i64 = 10_000;

/// Validates a business model override row before it is persisted.
///
/// Every field is optional; only the fields present are checked. `None`
/// always passes — it means "defer to global settings".
pub fn validate_overrides(m: &BusinessModelOverrides) -> Result<(), ValidationError> {
    if let Some(value) = m.discount_value {
        if value < 0 {
            return Err(ValidationError::Negative {
                field: "discount_value",
            });
        }
        // Percentage discounts are basis points and cannot exceed 100%.
        if m.discount_type == Some(DiscountType::Percentage) && value > MAX_BPS {
            return Err(ValidationError::OutOfRange {
                field: "discount_value",
                min: 0,
                max: MAX_BPS,
            });
        }
    }

    if let Some(rate) = m.commission_rate {
        if rate < 0 {
            return Err(ValidationError::Negative {
                field: "commission_rate",
            });
        }
        if m.commission_type == Some(CommissionType::Percentage) && rate > MAX_BPS {
            return Err(ValidationError::OutOfRange {
                field: "commission_rate",
                min: 0,
                max: MAX_BPS,
            });
        }
    }

    for (field, value) in [
        ("min_booking_amount_cents", m.min_booking_amount_cents),
        ("max_discount_amount_cents", m.max_discount_amount_cents),
        ("payout_threshold_cents", m.payout_threshold_cents),
    ] {
        if let Some(v) = value {
            if v < 0 {
                return Err(ValidationError::Negative { field });
            }
        }
    }

    for (field, value) in [
        ("max_qr_per_month", m.max_qr_per_month),
        ("qr_validity_days", m.qr_validity_days),
    ] {
        if let Some(v) = value {
            if v < 1 {
                return Err(ValidationError::OutOfRange {
                    field,
                    min: 1,
                    max: i64::MAX,
                });
            }
        }
    }

    Ok(())
}

/// Validates the caller-supplied pieces of a QR issue request.
pub fn validate_qr_request(
    business_id: &str,
    usage_limit: Option<i64>,
    daily_limit: Option<i64>,
    monthly_limit: Option<i64>,
) -> Result<(), ValidationError> {
    if business_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "business_id",
        });
    }
    for (field, value) in [
        ("usage_limit", usage_limit),
        ("daily_limit", daily_limit),
        ("monthly_limit", monthly_limit),
    ] {
        if let Some(v) = value {
            if v < 0 {
                return Err(ValidationError::Negative { field });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
