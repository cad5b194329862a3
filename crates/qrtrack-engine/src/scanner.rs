//! # Scan Processor
//!
//! Ingests QR scan events: validity, session continuity, device and geo
//! enrichment, fraud signals, counters, and the context handed to the
//! booking flow.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ScanProcessor::process                            │
//! │                                                                         │
//! │  1. Resolve the code: short code lookup, or the tracking-token          │
//! │     ladder (exact hash → rebuilt hash → business/location fallback);    │
//! │     unresolved → generic rejection, no row                              │
//! │  2. Validity: QR-level + business layer + day/month limits              │
//! │       rejected → rejected scan row + analytics counter, generic error   │
//! │  3. Session ladder:                                                     │
//! │       a. same customer + same code   → reuse session token              │
//! │          (30-day window, identified customers get long continuity)      │
//! │       b. same ip+ua + same code      → reuse session token              │
//! │          (window = settings.session_tracking_hours)                     │
//! │       c. otherwise                   → fresh SESSION- token             │
//! │  4. Device classification from the user agent                           │
//! │  5. Geo: nearest active business location, distance recorded            │
//! │  6. Fraud scoring (additive, advisory):                                 │
//! │       repeat scans in session  > 5      +40  repeat_scans               │
//! │       missing user agent                +20  missing_user_agent         │
//! │       distance > 5× location radius     +25  distance_anomaly           │
//! │       suspicious when score > 70; suspicious scans still process        │
//! │  7. Counters: atomic guarded usage increment (unique when this          │
//! │     session never scanned this code before)                             │
//! │  8. Persist the scan row, emit AffiliateContext                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use qrtrack_core::{
    device, geo, CustomerScan, DiscountType, QrCode, ScanResult, CUSTOMER_SESSION_DAYS,
};
use qrtrack_db::Database;

use crate::error::{EngineError, EngineResult, QrRejection};
use crate::registry::QrCodeRegistry;
use crate::token;

// =============================================================================
// Constants
// =============================================================================

/// Scans per session inside the tracking window before the repeat signal
/// fires.
const REPEAT_SCAN_THRESHOLD: i64 = 5;

/// Additive score contributions per signal.
const SCORE_REPEAT_SCANS: i64 = 40;
const SCORE_MISSING_USER_AGENT: i64 = 20;
const SCORE_DISTANCE_ANOMALY: i64 = 25;

/// Scans scoring above this are flagged suspicious (but still processed).
const SUSPICIOUS_THRESHOLD: i64 = 70;

/// A scan this many times the location radius away is a distance anomaly.
const DISTANCE_RADIUS_FACTOR: f64 = 5.0;

// =============================================================================
// Request / Context
// =============================================================================

/// Raw signals accompanying a scan.
///
/// Carries either the public short code from a landing URL or the raw
/// tracking token from a rendered QR image; short code wins when both are
/// set.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub short_code: Option<String>,
    pub qr_token: Option<String>,
    /// Authenticated customer, if any.
    pub customer_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy_m: Option<i64>,
    pub user_timezone: Option<String>,
}

/// What the landing page / booking flow receives for an accepted scan.
///
/// Carries the discount terms snapshotted on the code, NOT the live model:
/// the customer sees what the printed code advertised.
#[derive(Debug, Clone, Serialize)]
pub struct AffiliateContext {
    pub scan_id: String,
    /// Handle the booking flow presents when the booking completes.
    pub scan_token: String,
    pub session_token: String,
    pub qr_code_id: String,
    pub business_id: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub min_booking_amount_cents: Option<i64>,
    pub max_discount_amount_cents: Option<i64>,
}

// =============================================================================
// Scan Processor
// =============================================================================

/// Processes incoming scan events end to end.
pub struct ScanProcessor {
    /// Database connection.
    db: Arc<Database>,

    /// Registry answering validity questions.
    registry: QrCodeRegistry,
}

impl ScanProcessor {
    /// Creates a new scan processor.
    pub fn new(db: Arc<Database>) -> Self {
        let registry = QrCodeRegistry::new(db.clone());
        ScanProcessor { db, registry }
    }

    /// Processes one scan.
    ///
    /// Unknown codes and every rejection reason surface as the single
    /// generic [`EngineError::InvalidOrExpired`]; the real reason goes to
    /// the logs and (for known codes) the rejected scan row.
    pub async fn process(
        &self,
        request: &ScanRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<AffiliateContext> {
        let qr = match self.resolve_code(request).await? {
            Ok(qr) => qr,
            Err(rejection) => {
                // Unresolved scans leave no row at all.
                warn!(reason = rejection.as_str(), "Scan did not resolve to a code");
                return Err(EngineError::InvalidOrExpired);
            }
        };

        if let Some(rejection) = self.registry.rejection_for(&qr, now).await? {
            return self.reject(&qr, request, rejection, now).await;
        }

        let settings = self.db.settings().get_or_create(now).await?;
        let window = Duration::hours(settings.session_tracking_hours.max(0));
        let since = now - window;

        let session_token = self.resolve_session(&qr, request, now, since).await?;
        let info = device::classify(request.user_agent.as_deref());

        // Geo attribution is best-effort; a scan with no coordinates or a
        // business with no locations stays unattributed.
        let location_match = match (request.latitude, request.longitude) {
            (Some(lat), Some(lon)) => {
                let locations = self.db.businesses().locations_for(&qr.business_id).await?;
                geo::nearest_location(&locations, lat, lon)
            }
            _ => None,
        };

        let (fraud_score, fraud_flags) = self
            .score(request, &session_token, location_match.as_ref(), since)
            .await?;
        let is_suspicious = fraud_score > SUSPICIOUS_THRESHOLD;
        if is_suspicious {
            warn!(
                qr_id = %qr.id,
                fraud_score,
                flags = ?fraud_flags,
                "Suspicious scan (processed anyway)"
            );
        }

        let unique = !self
            .db
            .scans()
            .session_seen_for_qr(&qr.id, &session_token)
            .await?;

        // The counter advance carries the usage-limit guard; losing the race
        // turns this scan into a rejection after all.
        if !self.db.qr_codes().record_scan(&qr.id, unique, now).await? {
            return self.reject(&qr, request, QrRejection::UsageLimitReached, now).await;
        }

        let scan = CustomerScan {
            id: uuid::Uuid::new_v4().to_string(),
            qr_code_id: qr.id.clone(),
            customer_id: request.customer_id.clone(),
            session_token: session_token.clone(),
            scan_token: token::scan_token(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            device_type: info.device_type,
            browser: info.browser,
            platform: info.platform,
            detected_latitude: request.latitude,
            detected_longitude: request.longitude,
            detected_accuracy_m: request.accuracy_m,
            matched_location_id: location_match.as_ref().map(|m| m.location_id.clone()),
            location_distance_km: location_match.as_ref().map(|m| m.distance_m / 1_000.0),
            scan_date: now.date_naive(),
            scan_hour: i64::from(now.hour()),
            user_timezone: request
                .user_timezone
                .clone()
                .unwrap_or_else(|| "UTC".to_string()),
            scan_result: ScanResult::Success,
            fraud_score,
            is_suspicious,
            // Serializing a list of static names cannot fail.
            fraud_flags: serde_json::to_string(&fraud_flags).unwrap_or_else(|_| "[]".to_string()),
            booking_initiated: false,
            booking_completed: false,
            booking_id: None,
            conversion_time_minutes: None,
            scanned_at: now,
        };
        self.db.scans().insert(&scan).await?;

        info!(
            scan_id = %scan.id,
            qr_id = %qr.id,
            session = %session_token,
            unique,
            fraud_score,
            "Scan accepted"
        );

        Ok(AffiliateContext {
            scan_id: scan.id,
            scan_token: scan.scan_token,
            session_token,
            qr_code_id: qr.id,
            business_id: qr.business_id,
            discount_type: qr.discount_type,
            discount_value: qr.discount_value,
            min_booking_amount_cents: qr.min_booking_amount_cents,
            max_discount_amount_cents: qr.max_discount_amount_cents,
        })
    }

    /// Finds the scanned code from whichever identifier the request carries.
    async fn resolve_code(
        &self,
        request: &ScanRequest,
    ) -> EngineResult<Result<QrCode, QrRejection>> {
        if let Some(code) = request.short_code.as_deref() {
            return Ok(self
                .db
                .qr_codes()
                .get_by_short_code(code)
                .await?
                .ok_or(QrRejection::UnknownCode));
        }
        if let Some(token) = request.qr_token.as_deref() {
            return self.registry.resolve_token(token).await;
        }
        Ok(Err(QrRejection::UnknownCode))
    }

    /// Marks that the customer moved from the landing page into a booking
    /// flow. Advisory analytics bit, idempotent.
    pub async fn mark_booking_initiated(&self, scan_token: &str) -> EngineResult<()> {
        let scan = self
            .db
            .scans()
            .get_by_scan_token(scan_token)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound {
                scan_token: scan_token.to_string(),
            })?;
        self.db.scans().mark_booking_initiated(&scan.id).await?;
        Ok(())
    }

    /// Records a rejected attempt: a rejected scan row for the audit trail,
    /// the analytics counter on the code, never the usage counter.
    async fn reject(
        &self,
        qr: &QrCode,
        request: &ScanRequest,
        rejection: QrRejection,
        now: DateTime<Utc>,
    ) -> EngineResult<AffiliateContext> {
        warn!(
            qr_id = %qr.id,
            short_code = %qr.short_code,
            reason = rejection.as_str(),
            "Scan rejected"
        );

        let info = device::classify(request.user_agent.as_deref());
        let scan = CustomerScan {
            id: uuid::Uuid::new_v4().to_string(),
            qr_code_id: qr.id.clone(),
            customer_id: request.customer_id.clone(),
            session_token: token::session_token(),
            scan_token: token::scan_token(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            device_type: info.device_type,
            browser: info.browser,
            platform: info.platform,
            detected_latitude: request.latitude,
            detected_longitude: request.longitude,
            detected_accuracy_m: request.accuracy_m,
            matched_location_id: None,
            location_distance_km: None,
            scan_date: now.date_naive(),
            scan_hour: i64::from(now.hour()),
            user_timezone: request
                .user_timezone
                .clone()
                .unwrap_or_else(|| "UTC".to_string()),
            scan_result: ScanResult::Rejected,
            fraud_score: 0,
            is_suspicious: false,
            fraud_flags: serde_json::to_string(&[rejection.as_str()])
                .unwrap_or_else(|_| "[]".to_string()),
            booking_initiated: false,
            booking_completed: false,
            booking_id: None,
            conversion_time_minutes: None,
            scanned_at: now,
        };
        self.db.scans().insert(&scan).await?;
        self.db.qr_codes().record_rejected_scan(&qr.id, now).await?;

        Err(EngineError::InvalidOrExpired)
    }

    /// Walks the session fallback ladder.
    ///
    /// An identified customer keeps their session across a 30-day window;
    /// the anonymous fingerprint rung only looks back over the configured
    /// tracking hours.
    async fn resolve_session(
        &self,
        qr: &QrCode,
        request: &ScanRequest,
        now: DateTime<Utc>,
        since: DateTime<Utc>,
    ) -> EngineResult<String> {
        if let Some(customer_id) = request.customer_id.as_deref() {
            let customer_since = now - Duration::days(CUSTOMER_SESSION_DAYS);
            if let Some(prior) = self
                .db
                .scans()
                .latest_for_customer(&qr.id, customer_id, customer_since)
                .await?
            {
                debug!(session = %prior.session_token, "Session continued via customer");
                return Ok(prior.session_token);
            }
        }

        if let (Some(ip), Some(ua)) = (request.ip_address.as_deref(), request.user_agent.as_deref())
        {
            if let Some(prior) = self
                .db
                .scans()
                .latest_for_fingerprint(&qr.id, ip, ua, since)
                .await?
            {
                debug!(session = %prior.session_token, "Session continued via fingerprint");
                return Ok(prior.session_token);
            }
        }

        Ok(token::session_token())
    }

    /// Additive fraud score plus the named signals that contributed.
    async fn score(
        &self,
        request: &ScanRequest,
        session_token: &str,
        location_match: Option<&geo::LocationMatch>,
        since: DateTime<Utc>,
    ) -> EngineResult<(i64, Vec<&'static str>)> {
        let mut score = 0;
        let mut flags = Vec::new();

        let prior_in_session = self
            .db
            .scans()
            .count_for_session(session_token, since)
            .await?;
        if prior_in_session > REPEAT_SCAN_THRESHOLD {
            score += SCORE_REPEAT_SCANS;
            flags.push("repeat_scans");
        }

        if request
            .user_agent
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            score += SCORE_MISSING_USER_AGENT;
            flags.push("missing_user_agent");
        }

        if let Some(matched) = location_match {
            let anomaly_m = matched.accuracy_radius_m as f64 * DISTANCE_RADIUS_FACTOR;
            if matched.distance_m > anomaly_m {
                score += SCORE_DISTANCE_ANOMALY;
                flags.push("distance_anomaly");
            }
        }

        Ok((score.min(100), flags))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
