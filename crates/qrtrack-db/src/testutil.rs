//! Shared fixtures for repository tests.

use chrono::Utc;
use uuid::Uuid;

use crate::pool::{Database, DbConfig};
use qrtrack_core::{
    Business, BusinessStatus, BusinessType, CustomerScan, DeviceType, DiscountType, QrCode,
    QrStatus, ScanResult, VerificationStatus,
};

pub(crate) async fn test_db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
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

pub(crate) fn qr_fixture(business_id: &str) -> QrCode {
    let now = Utc::now();
    let id = Uuid::new_v4().to_string();
    QrCode {
        id: id.clone(),
        business_id: business_id.to_string(),
        location_id: None,
        qr_value: format!("QR-{id}"),
        qr_hash: format!("hash-{id}"),
        short_code: id.replace('-', "")[..8].to_uppercase(),
        qr_url: format!("https://track.test/r/{id}"),
        discount_type: DiscountType::Percentage,
        discount_value: 1_000,
        min_booking_amount_cents: None,
        max_discount_amount_cents: None,
        status: QrStatus::Active,
        valid_from: None,
        valid_until: None,
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

pub(crate) fn scan_fixture(qr_code_id: &str, session_token: &str) -> CustomerScan {
    let now = Utc::now();
    CustomerScan {
        id: Uuid::new_v4().to_string(),
        qr_code_id: qr_code_id.to_string(),
        customer_id: None,
        session_token: session_token.to_string(),
        scan_token: format!("SCAN-{}", Uuid::new_v4()),
        ip_address: Some("203.0.113.10".to_string()),
        user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X)".to_string()),
        device_type: DeviceType::Mobile,
        browser: "Safari".to_string(),
        platform: "iOS".to_string(),
        detected_latitude: None,
        detected_longitude: None,
        detected_accuracy_m: None,
        matched_location_id: None,
        location_distance_km: None,
        scan_date: now.date_naive(),
        scan_hour: 12,
        user_timezone: "UTC".to_string(),
        scan_result: ScanResult::Success,
        fraud_score: 0,
        is_suspicious: false,
        fraud_flags: "[]".to_string(),
        booking_initiated: false,
        booking_completed: false,
        booking_id: None,
        conversion_time_minutes: None,
        scanned_at: now,
    }
}
