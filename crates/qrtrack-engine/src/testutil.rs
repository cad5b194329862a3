//! Shared fixtures for engine tests.

use std::sync::Arc;

use chrono::Utc;

use qrtrack_core::{
    Business, BusinessModelOverrides, BusinessStatus, BusinessType, VerificationStatus,
};
use qrtrack_db::{Database, DbConfig};

use crate::registry::IssueQrRequest;
use crate::scanner::ScanRequest;

pub(crate) async fn test_db() -> Arc<Database> {
    Arc::new(Database::new(DbConfig::in_memory()).await.unwrap())
}

pub(crate) fn business_fixture(id: &str) -> Business {
    let now = Utc::now();
    Business {
        id: id.to_string(),
        name: "Hotel Sol".to_string(),
        business_type: BusinessType::Hotel,
        contact_email: "front@sol.test".to_string(),
        contact_phone: None,
        website: None,
        city: Some("Lisbon".to_string()),
        country: Some("PT".to_string()),
        currency: "EUR".to_string(),
        verification_status: VerificationStatus::Verified,
        status: BusinessStatus::Active,
        verified_at: Some(now),
        dashboard_access_token: None,
        dashboard_token_expires_at: None,
        last_dashboard_access: None,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub(crate) fn overrides_fixture(business_id: &str) -> BusinessModelOverrides {
    BusinessModelOverrides {
        id: uuid::Uuid::new_v4().to_string(),
        business_id: business_id.to_string(),
        discount_type: None,
        discount_value: None,
        min_booking_amount_cents: None,
        max_discount_amount_cents: None,
        commission_rate: None,
        commission_type: None,
        payout_threshold_cents: None,
        max_qr_per_month: None,
        qr_validity_days: None,
        configured_at: Utc::now(),
    }
}

pub(crate) fn issue_request(business_id: &str) -> IssueQrRequest {
    IssueQrRequest {
        business_id: business_id.to_string(),
        location_id: None,
        base_url: "https://track.test".to_string(),
        valid_from: None,
        valid_until: None,
        usage_limit: None,
        daily_limit: None,
        monthly_limit: None,
    }
}

pub(crate) fn scan_request(short_code: &str) -> ScanRequest {
    ScanRequest {
        short_code: Some(short_code.to_string()),
        qr_token: None,
        customer_id: None,
        ip_address: Some("203.0.113.10".to_string()),
        user_agent: Some(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) Version/17.4 Safari/604.1"
                .to_string(),
        ),
        latitude: None,
        longitude: None,
        accuracy_m: None,
        user_timezone: Some("Europe/Lisbon".to_string()),
    }
}
