//! # Commission Ledger
//!
//! Opens commissions from completed bookings and walks them through their
//! lifecycle.
//!
//! ## Open Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   CommissionLedger::open_for_booking                    │
//! │                                                                         │
//! │  1. Resolve the scan by its SCAN- token                                 │
//! │  2. Write the booking outcome exactly once (guarded: a replay of the    │
//! │     same completion is refused, never double-counted)                   │
//! │  3. Settle: discount terms from the QR snapshot, commission terms       │
//! │     from the live effective model                                       │
//! │  4. Insert the commission row (scan_id UNIQUE backs exactly-once)       │
//! │  5. Count the conversion + revenue on the code                          │
//! │  6. auto_approve_commissions? → immediately approve                     │
//! │                                                                         │
//! │  Lifecycle: pending → approved → paid, with rejected / disputed side    │
//! │  paths. Every transition is checked against the state machine AND       │
//! │  guarded in the UPDATE itself; its audit entry lands atomically with    │
//! │  the state change.                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use qrtrack_core::error::CoreError;
use qrtrack_core::model::EffectiveModel;
use qrtrack_core::{calc, AuditEntry, Commission, CommissionStatus, Money};
use qrtrack_db::{CommissionTotals, Database};

use crate::error::{EngineError, EngineResult};
use crate::resolver::BusinessModelResolver;

// =============================================================================
// Requests / Views
// =============================================================================

/// A completed booking reported by the booking flow.
#[derive(Debug, Clone)]
pub struct BookingReport {
    /// The per-scan token handed out at scan time.
    pub scan_token: String,
    pub booking_id: String,
    pub booking_amount_cents: i64,
}

/// A business's approved balance against its payout threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutStatus {
    pub approved_cents: i64,
    pub threshold_cents: i64,
    /// True when the approved balance has reached the threshold.
    pub payable: bool,
}

// =============================================================================
// Ledger
// =============================================================================

/// Owns the commission lifecycle.
pub struct CommissionLedger {
    /// Database connection.
    db: Arc<Database>,

    /// Resolver for commission terms at settlement time.
    resolver: BusinessModelResolver,
}

impl CommissionLedger {
    /// Creates a new ledger.
    pub fn new(db: Arc<Database>) -> Self {
        let resolver = BusinessModelResolver::new(db.clone());
        CommissionLedger { db, resolver }
    }

    // =========================================================================
    // Open
    // =========================================================================

    /// Opens a commission for a completed booking.
    ///
    /// Exactly-once per scan, enforced twice: the guarded booking-outcome
    /// write and the UNIQUE scan_id on the commission row.
    pub async fn open_for_booking(
        &self,
        report: &BookingReport,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        let scan = self
            .db
            .scans()
            .get_by_scan_token(&report.scan_token)
            .await?
            .ok_or_else(|| EngineError::ScanNotFound {
                scan_token: report.scan_token.clone(),
            })?;

        let qr = self
            .db
            .qr_codes()
            .get_by_id(&scan.qr_code_id)
            .await?
            .ok_or_else(|| EngineError::QrNotFound {
                qr_id: scan.qr_code_id.clone(),
            })?;

        let conversion_minutes = (now - scan.scanned_at).num_minutes().max(0);
        let recorded = self
            .db
            .scans()
            .complete_booking(&scan.id, &report.booking_id, Some(conversion_minutes))
            .await?;
        if !recorded {
            // Re-read for the booking that won.
            let existing = self
                .db
                .scans()
                .get_by_id(&scan.id)
                .await?
                .and_then(|s| s.booking_id)
                .unwrap_or_default();
            return Err(EngineError::BookingAlreadyRecorded {
                scan_id: scan.id,
                booking_id: existing,
            });
        }

        // Discount terms come from the QR snapshot (what the code
        // advertised); commission terms come from the model as configured
        // NOW (settlement follows current agreements).
        let live = self.resolver.effective_model(&qr.business_id, now).await?;
        let model = EffectiveModel {
            discount_type: qr.discount_type,
            discount_value: qr.discount_value,
            min_booking_amount_cents: qr.min_booking_amount_cents,
            max_discount_amount_cents: qr.max_discount_amount_cents,
            ..live
        };

        let settlement = calc::settle(&model, Money::from_cents(report.booking_amount_cents));

        let commission = Commission {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: qr.business_id.clone(),
            location_id: scan.matched_location_id.clone().or(qr.location_id.clone()),
            scan_id: scan.id.clone(),
            booking_id: report.booking_id.clone(),
            customer_id: scan.customer_id.clone(),
            booking_amount_cents: settlement.booking_amount.cents(),
            discount_amount_cents: settlement.discount_amount.cents(),
            commissionable_amount_cents: settlement.commissionable_amount.cents(),
            commission_rate: model.commission_rate,
            commission_type: model.commission_type,
            commission_amount_cents: settlement.commission_amount.cents(),
            tax_amount_cents: 0,
            net_commission_cents: settlement.commission_amount.cents(),
            status: CommissionStatus::Pending,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            payment_method: None,
            transaction_reference: None,
            dispute_reason: None,
            dispute_resolution: None,
            dispute_resolved_at: None,
            audit_log: format!(
                "[{}]",
                audit_entry("created", None, now, serde_json::json!({}))
            ),
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.db.commissions().insert(&commission).await {
            if err.is_unique_violation_on("commissions.scan_id") {
                return Err(CoreError::DuplicateCommission { scan_id: scan.id }.into());
            }
            return Err(err.into());
        }

        self.db
            .qr_codes()
            .record_conversion(&qr.id, report.booking_amount_cents, now)
            .await?;

        info!(
            commission_id = %commission.id,
            scan_id = %commission.scan_id,
            booking_id = %commission.booking_id,
            commission_cents = commission.commission_amount_cents,
            "Opened commission"
        );

        let settings = self.db.settings().get_or_create(now).await?;
        if settings.auto_approve_commissions {
            return self.approve(&commission.id, "system:auto_approve", now).await;
        }

        Ok(commission)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Approves a pending commission.
    pub async fn approve(
        &self,
        commission_id: &str,
        approver: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        let commission = self.get(commission_id).await?;
        self.check_transition(&commission, CommissionStatus::Approved)?;

        let entry = audit_entry(
            "approved",
            Some(approver),
            now,
            serde_json::json!({}),
        );
        let moved = self
            .db
            .commissions()
            .approve(commission_id, approver, now, &entry)
            .await?;
        self.finish(commission_id, moved, &commission, CommissionStatus::Approved)
            .await
    }

    /// Marks an approved commission paid, recording the payment details.
    pub async fn mark_paid(
        &self,
        commission_id: &str,
        payment_method: &str,
        transaction_reference: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        let commission = self.get(commission_id).await?;
        self.check_transition(&commission, CommissionStatus::Paid)?;

        let entry = audit_entry(
            "paid",
            None,
            now,
            serde_json::json!({
                "payment_method": payment_method,
                "transaction_reference": transaction_reference,
            }),
        );
        let moved = self
            .db
            .commissions()
            .mark_paid(commission_id, payment_method, transaction_reference, now, &entry)
            .await?;
        self.finish(commission_id, moved, &commission, CommissionStatus::Paid)
            .await
    }

    /// Rejects a commission from any non-terminal state.
    pub async fn reject(
        &self,
        commission_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        let commission = self.get(commission_id).await?;
        self.check_transition(&commission, CommissionStatus::Rejected)?;

        let entry = audit_entry(
            "rejected",
            None,
            now,
            serde_json::json!({ "reason": reason }),
        );
        let moved = self.db.commissions().reject(commission_id, now, &entry).await?;
        self.finish(commission_id, moved, &commission, CommissionStatus::Rejected)
            .await
    }

    /// Opens a dispute on a pending or approved commission.
    pub async fn open_dispute(
        &self,
        commission_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        let commission = self.get(commission_id).await?;
        self.check_transition(&commission, CommissionStatus::Disputed)?;

        let entry = audit_entry(
            "dispute_created",
            None,
            now,
            serde_json::json!({ "reason": reason }),
        );
        let moved = self
            .db
            .commissions()
            .open_dispute(commission_id, reason, now, &entry)
            .await?;
        self.finish(commission_id, moved, &commission, CommissionStatus::Disputed)
            .await
    }

    /// Resolves a dispute to `approved` or `rejected`, optionally adjusting
    /// the net amount. The originally computed commission amount is kept for
    /// the record.
    pub async fn resolve_dispute(
        &self,
        commission_id: &str,
        outcome: CommissionStatus,
        resolution: &str,
        adjusted_net_cents: Option<i64>,
        now: DateTime<Utc>,
    ) -> EngineResult<Commission> {
        if !matches!(
            outcome,
            CommissionStatus::Approved | CommissionStatus::Rejected
        ) {
            return Err(CoreError::InvalidTransition {
                entity: "commission",
                id: commission_id.to_string(),
                from: "disputed".to_string(),
                to: status_label(outcome).to_string(),
            }
            .into());
        }

        let commission = self.get(commission_id).await?;
        self.check_transition(&commission, outcome)?;

        let entry = audit_entry(
            "dispute_resolved",
            None,
            now,
            serde_json::json!({
                "outcome": status_label(outcome),
                "resolution": resolution,
                "adjusted_net_cents": adjusted_net_cents,
            }),
        );
        let moved = self
            .db
            .commissions()
            .resolve_dispute(commission_id, outcome, resolution, adjusted_net_cents, now, &entry)
            .await?;
        self.finish(commission_id, moved, &commission, outcome).await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Gets a commission by id.
    pub async fn get(&self, commission_id: &str) -> EngineResult<Commission> {
        self.db
            .commissions()
            .get_by_id(commission_id)
            .await?
            .ok_or_else(|| {
                qrtrack_db::DbError::not_found("Commission", commission_id).into()
            })
    }

    /// The commission opened for a scan, if any. At most one exists per scan.
    pub async fn for_scan(&self, scan_id: &str) -> EngineResult<Option<Commission>> {
        Ok(self.db.commissions().get_by_scan_id(scan_id).await?)
    }

    /// Lists a business's commissions, optionally filtered by status.
    pub async fn list_for_business(
        &self,
        business_id: &str,
        status: Option<CommissionStatus>,
        limit: u32,
    ) -> EngineResult<Vec<Commission>> {
        Ok(self
            .db
            .commissions()
            .list_for_business(business_id, status, limit)
            .await?)
    }

    /// Per-status commission sums for a business.
    pub async fn totals_for_business(&self, business_id: &str) -> EngineResult<CommissionTotals> {
        Ok(self.db.commissions().totals_for_business(business_id).await?)
    }

    /// Whether the business's approved balance has reached its payout
    /// threshold.
    pub async fn payout_status(
        &self,
        business_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<PayoutStatus> {
        let totals = self.db.commissions().totals_for_business(business_id).await?;
        let model = self.resolver.effective_model(business_id, now).await?;
        Ok(PayoutStatus {
            approved_cents: totals.approved_cents,
            threshold_cents: model.payout_threshold_cents,
            payable: totals.approved_cents >= model.payout_threshold_cents,
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_transition(
        &self,
        commission: &Commission,
        to: CommissionStatus,
    ) -> EngineResult<()> {
        if !commission.status.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                entity: "commission",
                id: commission.id.clone(),
                from: status_label(commission.status).to_string(),
                to: status_label(to).to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Settles the outcome of a guarded write: a refused write means the row
    /// moved under us between the read and the UPDATE.
    async fn finish(
        &self,
        commission_id: &str,
        moved: bool,
        before: &Commission,
        to: CommissionStatus,
    ) -> EngineResult<Commission> {
        if !moved {
            warn!(commission_id, ?to, "Commission transition lost a race");
            return Err(CoreError::InvalidTransition {
                entity: "commission",
                id: commission_id.to_string(),
                from: status_label(before.status).to_string(),
                to: status_label(to).to_string(),
            }
            .into());
        }
        info!(commission_id, ?to, "Commission transitioned");
        self.get(commission_id).await
    }
}

fn status_label(status: CommissionStatus) -> &'static str {
    match status {
        CommissionStatus::Pending => "pending",
        CommissionStatus::Approved => "approved",
        CommissionStatus::Paid => "paid",
        CommissionStatus::Rejected => "rejected",
        CommissionStatus::Disputed => "disputed",
    }
}

/// One serialized [`AuditEntry`].
fn audit_entry(
    action: &str,
    actor: Option<&str>,
    at: DateTime<Utc>,
    data: serde_json::Value,
) -> String {
    let entry = AuditEntry {
        action: action.to_string(),
        actor: actor.map(str::to_string),
        at,
        data,
    };
    // Serializing a fully-typed struct cannot fail.
    serde_json::to_string(&entry).unwrap_or_else(|_| "{}".to_string())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::QrCodeRegistry;
    use crate::scanner::ScanProcessor;
    use crate::testutil::{business_fixture, issue_request, scan_request, test_db};
    use qrtrack_core::CommissionType;

    /// Issues a code, runs one scan through the pipeline, and hands back the
    /// scan token a booking would carry.
    async fn scanned(db: &Arc<Database>) -> String {
        let business = business_fixture("biz-1");
        db.businesses().insert(&business).await.unwrap();

        let now = Utc::now();
        let mut settings = db.settings().get_or_create(now).await.unwrap();
        settings.discount_value = 1_000; // 10%
        settings.commission_rate = 800; // 8%
        db.settings().update(&settings).await.unwrap();

        let qr = QrCodeRegistry::new(db.clone())
            .issue(&issue_request("biz-1"), now)
            .await
            .unwrap();
        let context = ScanProcessor::new(db.clone())
            .process(&scan_request(&qr.short_code), now)
            .await
            .unwrap();
        context.scan_token
    }

    fn report(scan_token: &str, booking_amount_cents: i64) -> BookingReport {
        BookingReport {
            scan_token: scan_token.to_string(),
            booking_id: "BOOK-1".to_string(),
            booking_amount_cents,
        }
    }

    #[tokio::test]
    async fn test_open_settles_and_counts_conversion() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let ledger = CommissionLedger::new(db.clone());
        let now = Utc::now();

        // 200.00 booking, 10% discount, 8% of the remainder.
        let commission = ledger
            .open_for_booking(&report(&scan_token, 20_000), now)
            .await
            .unwrap();
        assert_eq!(commission.booking_amount_cents, 20_000);
        assert_eq!(commission.discount_amount_cents, 2_000);
        assert_eq!(commission.commissionable_amount_cents, 18_000);
        assert_eq!(commission.commission_amount(), Money::from_cents(1_440));
        assert_eq!(commission.net_commission(), Money::from_cents(1_440));
        assert_eq!(commission.status, CommissionStatus::Pending);

        let entries = commission.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "created");

        // Scan carries the outcome, code carries the conversion.
        let scan = db.scans().get_by_scan_token(&scan_token).await.unwrap().unwrap();
        assert!(scan.has_booking());
        assert_eq!(scan.booking_id.as_deref(), Some("BOOK-1"));

        let qr = db.qr_codes().get_by_id(&scan.qr_code_id).await.unwrap().unwrap();
        assert_eq!(qr.conversion_count, 1);
        assert_eq!(qr.total_revenue_cents, 20_000);
        assert!((qr.conversion_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_duplicate_booking_is_refused() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let ledger = CommissionLedger::new(db.clone());
        let now = Utc::now();

        ledger.open_for_booking(&report(&scan_token, 20_000), now).await.unwrap();

        let mut replay = report(&scan_token, 99_000);
        replay.booking_id = "BOOK-2".to_string();
        let err = ledger.open_for_booking(&replay, now).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::BookingAlreadyRecorded { ref booking_id, .. } if booking_id == "BOOK-1"
        ));

        // The original commission survives the replay untouched.
        let scan = db.scans().get_by_scan_token(&scan_token).await.unwrap().unwrap();
        let kept = ledger.for_scan(&scan.id).await.unwrap().unwrap();
        assert_eq!(kept.booking_id, "BOOK-1");
        assert_eq!(kept.booking_amount_cents, 20_000);

        let err = ledger
            .open_for_booking(&report("SCAN-missing", 1_000), now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ScanNotFound { .. }));
    }

    #[tokio::test]
    async fn test_auto_approve_setting() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let now = Utc::now();

        let mut settings = db.settings().get_or_create(now).await.unwrap();
        settings.auto_approve_commissions = true;
        db.settings().update(&settings).await.unwrap();

        let ledger = CommissionLedger::new(db);
        let commission = ledger
            .open_for_booking(&report(&scan_token, 20_000), now)
            .await
            .unwrap();
        assert_eq!(commission.status, CommissionStatus::Approved);
        assert_eq!(commission.approved_by.as_deref(), Some("system:auto_approve"));

        let entries = commission.audit_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, "approved");
    }

    #[tokio::test]
    async fn test_lifecycle_to_paid_with_audit_trail() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let ledger = CommissionLedger::new(db);
        let now = Utc::now();

        let commission = ledger
            .open_for_booking(&report(&scan_token, 20_000), now)
            .await
            .unwrap();

        // paid before approved: state machine refuses
        let err = ledger
            .mark_paid(&commission.id, "bank_transfer", "TX-9", now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidTransition { .. })));

        let approved = ledger.approve(&commission.id, "ops@test", now).await.unwrap();
        assert_eq!(approved.status, CommissionStatus::Approved);
        assert_eq!(approved.approved_by.as_deref(), Some("ops@test"));

        let paid = ledger
            .mark_paid(&commission.id, "bank_transfer", "TX-9", now)
            .await
            .unwrap();
        assert_eq!(paid.status, CommissionStatus::Paid);
        assert_eq!(paid.transaction_reference.as_deref(), Some("TX-9"));

        let actions: Vec<String> = paid
            .audit_entries()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["created", "approved", "paid"]);

        // terminal
        let err = ledger.reject(&commission.id, "too late", now).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_dispute_resolution_adjusts_net_only() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let ledger = CommissionLedger::new(db);
        let now = Utc::now();

        let commission = ledger
            .open_for_booking(&report(&scan_token, 20_000), now)
            .await
            .unwrap();

        ledger
            .open_dispute(&commission.id, "guest disputes the rate", now)
            .await
            .unwrap();

        // disputed → paid is not a resolution outcome
        let err = ledger
            .resolve_dispute(&commission.id, CommissionStatus::Paid, "n/a", None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidTransition { .. })));

        let resolved = ledger
            .resolve_dispute(
                &commission.id,
                CommissionStatus::Approved,
                "split the difference",
                Some(1_000),
                now,
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, CommissionStatus::Approved);
        assert_eq!(resolved.net_commission_cents, 1_000);
        // the computed amount survives for the record
        assert_eq!(resolved.commission_amount_cents, 1_440);
        assert_eq!(
            resolved.audit_entries().last().map(|e| e.action.clone()),
            Some("dispute_resolved".to_string())
        );
    }

    #[tokio::test]
    async fn test_tiered_commission_band() {
        let db = test_db().await;
        let business = business_fixture("biz-1");
        db.businesses().insert(&business).await.unwrap();
        let now = Utc::now();

        // No discount, tiered commission.
        let mut settings = db.settings().get_or_create(now).await.unwrap();
        settings.commission_type = CommissionType::Tiered;
        db.settings().update(&settings).await.unwrap();

        let qr = QrCodeRegistry::new(db.clone())
            .issue(&issue_request("biz-1"), now)
            .await
            .unwrap();
        let context = ScanProcessor::new(db.clone())
            .process(&scan_request(&qr.short_code), now)
            .await
            .unwrap();

        let ledger = CommissionLedger::new(db);
        // 450.00 lands in the 7% band, applied to the whole amount.
        let commission = ledger
            .open_for_booking(&report(&context.scan_token, 45_000), now)
            .await
            .unwrap();
        assert_eq!(commission.commission_type, CommissionType::Tiered);
        assert_eq!(commission.discount_amount_cents, 0);
        assert_eq!(commission.commission_amount_cents, 3_150);
    }

    #[tokio::test]
    async fn test_payout_threshold() {
        let db = test_db().await;
        let scan_token = scanned(&db).await;
        let ledger = CommissionLedger::new(db.clone());
        let now = Utc::now();

        // Default threshold is 100.00; a 14.40 approved balance is not payable.
        let commission = ledger
            .open_for_booking(&report(&scan_token, 20_000), now)
            .await
            .unwrap();
        ledger.approve(&commission.id, "ops@test", now).await.unwrap();

        let status = ledger.payout_status("biz-1", now).await.unwrap();
        assert_eq!(status.approved_cents, 1_440);
        assert_eq!(status.threshold_cents, 10_000);
        assert!(!status.payable);

        let mut settings = db.settings().get_or_create(now).await.unwrap();
        settings.payout_threshold_cents = 1_000;
        db.settings().update(&settings).await.unwrap();

        let status = ledger.payout_status("biz-1", now).await.unwrap();
        assert!(status.payable);
    }
}
