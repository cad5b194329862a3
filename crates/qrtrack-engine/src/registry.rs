//! # QR Code Registry
//!
//! Issues QR codes and owns their validity and lifecycle.
//!
//! ## Issue Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         QrCodeRegistry::issue                           │
//! │                                                                         │
//! │  1. Validate request (ids present, limits non-negative)                 │
//! │  2. Load business; it only has to exist — codes are pre-provisioned     │
//! │     before verification, eligibility is enforced at scan time           │
//! │  3. Resolve effective model                                             │
//! │  4. Quota: codes issued this calendar month < max_qr_per_month          │
//! │     (soft-deleted codes still count; deleting never refunds quota)      │
//! │  5. Build TrackingRecord → encode token → record_hash                   │
//! │  6. Snapshot discount terms from the effective model onto the row       │
//! │  7. Validity window: now .. now + qr_validity_days (unless supplied)    │
//! │  8. Insert with a fresh short code; on a short-code collision retry     │
//! │     with a new code, up to SHORT_CODE_MAX_ATTEMPTS                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Validity Layers
//! `QrCode::is_valid_at` is the QR-level check. The registry adds the layer
//! the row alone cannot answer: owning-business eligibility and the
//! daily/monthly scan limits that live in the scan table.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use qrtrack_core::codec::{self, TrackingRecord};
use qrtrack_core::error::CoreError;
use qrtrack_core::validation::validate_qr_request;
use qrtrack_core::{Business, QrCode, QrStatus, SHORT_CODE_MAX_ATTEMPTS};
use qrtrack_db::{Database, UsageRecount};

use crate::error::{EngineError, EngineResult, QrRejection};
use crate::resolver::BusinessModelResolver;
use crate::token;

// =============================================================================
// Issue Request
// =============================================================================

/// Caller-supplied pieces of a QR issue. Everything commercial comes from
/// the resolved model, not from here.
#[derive(Debug, Clone)]
pub struct IssueQrRequest {
    pub business_id: String,
    pub location_id: Option<String>,
    /// Base of the landing URL the short code is appended to.
    pub base_url: String,
    /// Defaults to `now` when unset.
    pub valid_from: Option<DateTime<Utc>>,
    /// Defaults to `now + qr_validity_days` when unset.
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<i64>,
    pub daily_limit: Option<i64>,
    pub monthly_limit: Option<i64>,
}

// =============================================================================
// Registry
// =============================================================================

/// Issues QR codes and answers validity questions about them.
pub struct QrCodeRegistry {
    /// Database connection.
    db: Arc<Database>,

    /// Resolver for effective commercial terms.
    resolver: BusinessModelResolver,
}

impl QrCodeRegistry {
    /// Creates a new registry.
    pub fn new(db: Arc<Database>) -> Self {
        let resolver = BusinessModelResolver::new(db.clone());
        QrCodeRegistry { db, resolver }
    }

    // =========================================================================
    // Issue
    // =========================================================================

    /// Issues a new QR code for a business.
    ///
    /// The business only has to exist: codes are pre-provisioned for
    /// suspended or not-yet-verified businesses (they get printed before
    /// onboarding finishes), and the scan-time validity layer keeps them
    /// unscannable until the business is eligible.
    pub async fn issue(&self, request: &IssueQrRequest, now: DateTime<Utc>) -> EngineResult<QrCode> {
        validate_qr_request(
            &request.business_id,
            request.usage_limit,
            request.daily_limit,
            request.monthly_limit,
        )
        .map_err(CoreError::from)?;

        let business = self
            .db
            .businesses()
            .get_by_id(&request.business_id)
            .await?
            .filter(|b| b.deleted_at.is_none())
            .ok_or_else(|| EngineError::BusinessNotFound {
                business_id: request.business_id.clone(),
            })?;
        let model = self.resolver.effective_model(&business.id, now).await?;

        // Monthly quota on issuance, not scanning.
        let month = now.format("%Y-%m").to_string();
        let issued = self
            .db
            .qr_codes()
            .count_issued_in_month(&business.id, &month)
            .await?;
        if model.max_qr_per_month > 0 && issued >= model.max_qr_per_month {
            return Err(CoreError::QuotaExceeded {
                business_id: business.id,
                quota: model.max_qr_per_month,
            }
            .into());
        }

        let record = TrackingRecord::new(
            business.id.clone(),
            request.location_id.clone(),
            token::scan_nonce(),
            now.timestamp(),
        );
        let qr_value = codec::encode(&record);
        let qr_hash = codec::record_hash(&record);

        let valid_from = request.valid_from.unwrap_or(now);
        let valid_until = request
            .valid_until
            .unwrap_or_else(|| now + Duration::days(model.qr_validity_days));

        let mut qr = QrCode {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: business.id.clone(),
            location_id: request.location_id.clone(),
            qr_value,
            qr_hash,
            short_code: token::short_code(),
            qr_url: String::new(),
            // Discount snapshot: a printed code keeps honoring what it
            // advertised even if the model changes later.
            discount_type: model.discount_type,
            discount_value: model.discount_value,
            min_booking_amount_cents: model.min_booking_amount_cents,
            max_discount_amount_cents: model.max_discount_amount_cents,
            status: QrStatus::Active,
            valid_from: Some(valid_from),
            valid_until: Some(valid_until),
            expires_at: None,
            usage_limit: request.usage_limit,
            daily_limit: request.daily_limit,
            monthly_limit: request.monthly_limit,
            current_usage: 0,
            total_scans: 0,
            unique_scans: 0,
            conversion_count: 0,
            total_revenue_cents: 0,
            last_scanned_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        // Insert-and-retry: uniqueness is enforced by the short_code index,
        // not by a pre-check that could race.
        for attempt in 1..=SHORT_CODE_MAX_ATTEMPTS {
            qr.qr_url = format!(
                "{}/r/{}",
                request.base_url.trim_end_matches('/'),
                qr.short_code
            );
            match self.db.qr_codes().insert(&qr).await {
                Ok(()) => {
                    info!(
                        qr_id = %qr.id,
                        business_id = %qr.business_id,
                        short_code = %qr.short_code,
                        "Issued QR code"
                    );
                    return Ok(qr);
                }
                Err(err) if err.is_unique_violation_on("qr_codes.short_code") => {
                    warn!(attempt, short_code = %qr.short_code, "Short code collision, retrying");
                    qr.short_code = token::short_code();
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::ShortCodeSpaceExhausted {
            attempts: SHORT_CODE_MAX_ATTEMPTS,
        })
    }

    // =========================================================================
    // Lookup & Token Verification
    // =========================================================================

    /// Gets a QR code by id.
    pub async fn get(&self, qr_id: &str) -> EngineResult<QrCode> {
        self.db
            .qr_codes()
            .get_by_id(qr_id)
            .await?
            .ok_or_else(|| EngineError::QrNotFound {
                qr_id: qr_id.to_string(),
            })
    }

    /// Lists a business's codes, newest first.
    pub async fn list_for_business(&self, business_id: &str) -> EngineResult<Vec<QrCode>> {
        Ok(self.db.qr_codes().list_for_business(business_id).await?)
    }

    /// Resolves an opaque tracking token to its QR code.
    ///
    /// Every failure collapses into the one public `InvalidOrExpired`
    /// signal; the distinct reason only reaches the logs.
    pub async fn verify_token(&self, qr_token: &str) -> EngineResult<QrCode> {
        match self.resolve_token(qr_token).await? {
            Ok(qr) => Ok(qr),
            Err(rejection) => {
                warn!(reason = rejection.as_str(), "Tracking token did not resolve");
                Err(EngineError::InvalidOrExpired)
            }
        }
    }

    /// Token resolution ladder, most precise rung first:
    ///
    /// 1. strict decode, exact integrity hash
    /// 2. rebuild the canonical record from whatever fields a near-miss
    ///    token still carries, re-hash
    /// 3. the business's newest active code for the location the token
    ///    names (attribution survives a mangled nonce)
    ///
    /// A token that decoded cleanly but matched no rung is an integrity
    /// mismatch; anything else unresolvable is an unknown code.
    pub(crate) async fn resolve_token(
        &self,
        qr_token: &str,
    ) -> EngineResult<Result<QrCode, QrRejection>> {
        let strict = codec::decode(qr_token).ok();
        if let Some(record) = &strict {
            if let Some(qr) = self
                .db
                .qr_codes()
                .get_by_hash(&codec::record_hash(record))
                .await?
            {
                return Ok(Ok(qr));
            }
        }

        let Ok(partial) = codec::decode_lenient(qr_token) else {
            return Ok(Err(QrRejection::UnknownCode));
        };

        if let (Some(business_id), Some(nonce), Some(issued_at)) = (
            partial.business_id.as_deref(),
            partial.scan_nonce.as_deref(),
            partial.issued_at,
        ) {
            let rebuilt =
                TrackingRecord::new(business_id, partial.location_id.clone(), nonce, issued_at);
            if let Some(qr) = self
                .db
                .qr_codes()
                .get_by_hash(&codec::record_hash(&rebuilt))
                .await?
            {
                return Ok(Ok(qr));
            }
        }

        if let Some(business_id) = partial.business_id.as_deref() {
            if let Some(qr) = self
                .db
                .qr_codes()
                .get_active_for_location(business_id, partial.location_id.as_deref())
                .await?
            {
                debug!(
                    business_id,
                    qr_id = %qr.id,
                    "Token resolved through business/location fallback"
                );
                return Ok(Ok(qr));
            }
        }

        Ok(Err(if strict.is_some() {
            QrRejection::IntegrityMismatch
        } else {
            QrRejection::UnknownCode
        }))
    }

    // =========================================================================
    // Validity
    // =========================================================================

    /// Full validity check for a presented short code: QR-level conditions
    /// plus business eligibility plus day/month scan limits.
    pub async fn is_valid(&self, short_code: &str, now: DateTime<Utc>) -> EngineResult<bool> {
        match self.db.qr_codes().get_by_short_code(short_code).await? {
            Some(qr) => Ok(self.rejection_for(&qr, now).await?.is_none()),
            None => Ok(false),
        }
    }

    /// The reason a scan of this code would be rejected right now, if any.
    ///
    /// Checks run cheapest-first; the first failure wins. `None` means the
    /// code is scannable.
    pub(crate) async fn rejection_for(
        &self,
        qr: &QrCode,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<QrRejection>> {
        if qr.deleted_at.is_some() {
            return Ok(Some(QrRejection::UnknownCode));
        }
        if qr.status != QrStatus::Active {
            return Ok(Some(QrRejection::NotActive));
        }
        if qr.valid_from.map(|t| t > now).unwrap_or(false)
            || qr.is_past_window(now)
        {
            return Ok(Some(QrRejection::OutsideWindow));
        }
        if let Some(limit) = qr.usage_limit {
            if limit > 0 && qr.current_usage >= limit {
                return Ok(Some(QrRejection::UsageLimitReached));
            }
        }

        // Business layer: the row-level check cannot see any of this.
        if self.eligible_business(&qr.business_id, now).await.is_err() {
            return Ok(Some(QrRejection::BusinessNotEligible));
        }

        if let Some(limit) = qr.daily_limit {
            if limit > 0 {
                let today = self.db.scans().count_for_qr_on(&qr.id, now.date_naive()).await?;
                if today >= limit {
                    return Ok(Some(QrRejection::DailyLimitReached));
                }
            }
        }
        if let Some(limit) = qr.monthly_limit {
            if limit > 0 {
                let month = now.format("%Y-%m").to_string();
                let this_month = self.db.scans().count_for_qr_in_month(&qr.id, &month).await?;
                if this_month >= limit {
                    return Ok(Some(QrRejection::MonthlyLimitReached));
                }
            }
        }

        Ok(None)
    }

    /// Loads a business and refuses ineligible ones: missing, soft-deleted,
    /// suspended, or unverified while settings require verification.
    pub(crate) async fn eligible_business(
        &self,
        business_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Business> {
        let business = self
            .db
            .businesses()
            .get_by_id(business_id)
            .await?
            .ok_or_else(|| EngineError::BusinessNotFound {
                business_id: business_id.to_string(),
            })?;

        if !business.is_active() {
            return Err(EngineError::BusinessNotEligible {
                business_id: business.id,
                reason: "not active",
            });
        }

        let settings = self.db.settings().get_or_create(now).await?;
        if settings.require_business_verification && !business.is_verified() {
            return Err(EngineError::BusinessNotEligible {
                business_id: business.id,
                reason: "not verified",
            });
        }

        Ok(business)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Manual lifecycle transition, guarded by the status machine.
    pub async fn set_status(
        &self,
        qr_id: &str,
        to: QrStatus,
        now: DateTime<Utc>,
    ) -> EngineResult<QrCode> {
        let qr = self.get(qr_id).await?;
        if !qr.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                entity: "qr_code",
                id: qr.id,
                from: format!("{:?}", qr.status).to_lowercase(),
                to: format!("{to:?}").to_lowercase(),
            }
            .into());
        }
        self.db.qr_codes().update_status(qr_id, to, now).await?;
        info!(qr_id, ?to, "QR status changed");
        self.get(qr_id).await
    }

    /// Marks every active code whose validity window has lapsed as expired.
    /// Safe to run on any schedule; each run is idempotent.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> EngineResult<u64> {
        let swept = self.db.qr_codes().sweep_expired(now).await?;
        if swept > 0 {
            info!(swept, "Expired lapsed QR codes");
        }
        Ok(swept)
    }

    /// Rebuilds a code's counters from its scan history and returns the
    /// derived figures, so an external job can reconcile drift.
    pub async fn recount_usage(
        &self,
        qr_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<UsageRecount> {
        let recount = self.db.qr_codes().recount_usage(qr_id, now).await?;
        debug!(
            qr_id,
            total = recount.total,
            unique = recount.unique,
            conversions = recount.conversions,
            "Recounted usage"
        );
        Ok(recount)
    }

    /// Soft-deletes a code. Its issuance still counts against the monthly
    /// quota.
    pub async fn soft_delete(&self, qr_id: &str, now: DateTime<Utc>) -> EngineResult<()> {
        self.db.qr_codes().soft_delete(qr_id, now).await?;
        info!(qr_id, "Soft-deleted QR code");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
