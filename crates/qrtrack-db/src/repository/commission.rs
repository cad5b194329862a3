//! # Commission Repository
//!
//! Database operations for commission ledger rows.
//!
//! ## State Changes Are Guarded Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every lifecycle write carries its precondition in the WHERE clause:   │
//! │                                                                         │
//! │    UPDATE commissions SET status = 'approved', ...                      │
//! │    WHERE id = ? AND status = 'pending'                                  │
//! │                                                                         │
//! │  rows_affected = 0 → the row was not in the expected state (raced or   │
//! │  illegal transition); the engine maps that to InvalidTransition.        │
//! │                                                                         │
//! │  The audit entry is appended in the SAME statement via json_insert,    │
//! │  so a state change and its audit record are atomic, and concurrent     │
//! │  appenders merge instead of clobbering the array.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::{Commission, CommissionStatus};

/// Sums of commission amounts per lifecycle bucket, in cents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommissionTotals {
    pub pending_cents: i64,
    pub approved_cents: i64,
    pub paid_cents: i64,
}

/// Repository for commission database operations.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    /// Creates a new CommissionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    /// Inserts a commission row.
    ///
    /// `scan_id` is UNIQUE: a second commission for the same scan fails with
    /// `DbError::UniqueViolation`, which the ledger maps to a duplicate error.
    pub async fn insert(&self, commission: &Commission) -> DbResult<()> {
        debug!(
            commission_id = %commission.id,
            scan_id = %commission.scan_id,
            amount_cents = commission.commission_amount_cents,
            "Inserting commission"
        );

        sqlx::query(
            r#"
            INSERT INTO commissions (
                id, business_id, location_id, scan_id, booking_id, customer_id,
                booking_amount_cents, discount_amount_cents,
                commissionable_amount_cents, commission_rate, commission_type,
                commission_amount_cents, tax_amount_cents, net_commission_cents,
                status, approved_by, approved_at, paid_at,
                payment_method, transaction_reference,
                dispute_reason, dispute_resolution, dispute_resolved_at,
                audit_log,
                created_at, updated_at
            )
            VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
            )
            "#,
        )
        .bind(&commission.id)
        .bind(&commission.business_id)
        .bind(&commission.location_id)
        .bind(&commission.scan_id)
        .bind(&commission.booking_id)
        .bind(&commission.customer_id)
        .bind(commission.booking_amount_cents)
        .bind(commission.discount_amount_cents)
        .bind(commission.commissionable_amount_cents)
        .bind(commission.commission_rate)
        .bind(commission.commission_type)
        .bind(commission.commission_amount_cents)
        .bind(commission.tax_amount_cents)
        .bind(commission.net_commission_cents)
        .bind(commission.status)
        .bind(&commission.approved_by)
        .bind(commission.approved_at)
        .bind(commission.paid_at)
        .bind(&commission.payment_method)
        .bind(&commission.transaction_reference)
        .bind(&commission.dispute_reason)
        .bind(&commission.dispute_resolution)
        .bind(commission.dispute_resolved_at)
        .bind(&commission.audit_log)
        .bind(commission.created_at)
        .bind(commission.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a commission by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Commission>> {
        let commission =
            sqlx::query_as::<_, Commission>("SELECT * FROM commissions WHERE id = ?1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(commission)
    }

    /// Gets the commission attributed to a scan, if one was opened.
    pub async fn get_by_scan_id(&self, scan_id: &str) -> DbResult<Option<Commission>> {
        let commission =
            sqlx::query_as::<_, Commission>("SELECT * FROM commissions WHERE scan_id = ?1")
                .bind(scan_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(commission)
    }

    /// Lists commissions for a business, newest first, optionally filtered
    /// by status.
    pub async fn list_for_business(
        &self,
        business_id: &str,
        status: Option<CommissionStatus>,
        limit: u32,
    ) -> DbResult<Vec<Commission>> {
        let commissions = match status {
            Some(status) => {
                sqlx::query_as::<_, Commission>(
                    r#"
                    SELECT * FROM commissions
                    WHERE business_id = ?1 AND status = ?2
                    ORDER BY created_at DESC
                    LIMIT ?3
                    "#,
                )
                .bind(business_id)
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Commission>(
                    r#"
                    SELECT * FROM commissions
                    WHERE business_id = ?1
                    ORDER BY created_at DESC
                    LIMIT ?2
                    "#,
                )
                .bind(business_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(commissions)
    }

    /// Per-status commission sums for a business.
    pub async fn totals_for_business(&self, business_id: &str) -> DbResult<CommissionTotals> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COALESCE(SUM(net_commission_cents), 0)
            FROM commissions
            WHERE business_id = ?1
            GROUP BY status
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = CommissionTotals::default();
        for (status, cents) in rows {
            match status.as_str() {
                "pending" => totals.pending_cents = cents,
                "approved" => totals.approved_cents = cents,
                "paid" => totals.paid_cents = cents,
                _ => {}
            }
        }
        Ok(totals)
    }

    /// Guarded transition to `approved`, audit entry appended atomically.
    ///
    /// ## Returns
    /// `false` when the row was not `pending` (illegal transition or race).
    pub async fn approve(
        &self,
        id: &str,
        approver: &str,
        now: DateTime<Utc>,
        audit_json: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE commissions SET
                status = 'approved',
                approved_by = ?1,
                approved_at = ?2,
                updated_at = ?2,
                audit_log = json_insert(audit_log, '$[#]', json(?3))
            WHERE id = ?4 AND status = 'pending'
            "#,
        )
        .bind(approver)
        .bind(now)
        .bind(audit_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Guarded transition from `approved` to `paid` with payment details.
    pub async fn mark_paid(
        &self,
        id: &str,
        payment_method: &str,
        transaction_reference: &str,
        now: DateTime<Utc>,
        audit_json: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE commissions SET
                status = 'paid',
                paid_at = ?1,
                payment_method = ?2,
                transaction_reference = ?3,
                updated_at = ?1,
                audit_log = json_insert(audit_log, '$[#]', json(?4))
            WHERE id = ?5 AND status = 'approved'
            "#,
        )
        .bind(now)
        .bind(payment_method)
        .bind(transaction_reference)
        .bind(audit_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Guarded transition to `rejected` from any non-terminal state.
    pub async fn reject(&self, id: &str, now: DateTime<Utc>, audit_json: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE commissions SET
                status = 'rejected',
                updated_at = ?1,
                audit_log = json_insert(audit_log, '$[#]', json(?2))
            WHERE id = ?3 AND status IN ('pending', 'approved', 'disputed')
            "#,
        )
        .bind(now)
        .bind(audit_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Guarded transition to `disputed` from `pending` or `approved`.
    pub async fn open_dispute(
        &self,
        id: &str,
        reason: &str,
        now: DateTime<Utc>,
        audit_json: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE commissions SET
                status = 'disputed',
                dispute_reason = ?1,
                updated_at = ?2,
                audit_log = json_insert(audit_log, '$[#]', json(?3))
            WHERE id = ?4 AND status IN ('pending', 'approved')
            "#,
        )
        .bind(reason)
        .bind(now)
        .bind(audit_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Resolves a dispute to `approved` or `rejected`, recording the
    /// resolution text and an optional adjusted net amount.
    pub async fn resolve_dispute(
        &self,
        id: &str,
        outcome: CommissionStatus,
        resolution: &str,
        adjusted_net_cents: Option<i64>,
        now: DateTime<Utc>,
        audit_json: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE commissions SET
                status = ?1,
                dispute_resolution = ?2,
                dispute_resolved_at = ?3,
                net_commission_cents = COALESCE(?4, net_commission_cents),
                updated_at = ?3,
                audit_log = json_insert(audit_log, '$[#]', json(?5))
            WHERE id = ?6 AND status = 'disputed'
            "#,
        )
        .bind(outcome)
        .bind(resolution)
        .bind(now)
        .bind(adjusted_net_cents)
        .bind(audit_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testutil::{business_fixture, qr_fixture, scan_fixture, test_db};
    use qrtrack_core::CommissionType;
    use uuid::Uuid;

    fn commission_fixture(business_id: &str, scan_id: &str) -> Commission {
        let now = Utc::now();
        Commission {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            location_id: None,
            scan_id: scan_id.to_string(),
            booking_id: "BOOK-1".to_string(),
            customer_id: None,
            booking_amount_cents: 20_000,
            discount_amount_cents: 2_000,
            commissionable_amount_cents: 18_000,
            commission_rate: 800,
            commission_type: CommissionType::Percentage,
            commission_amount_cents: 1_440,
            tax_amount_cents: 0,
            net_commission_cents: 1_440,
            status: CommissionStatus::Pending,
            approved_by: None,
            approved_at: None,
            paid_at: None,
            payment_method: None,
            transaction_reference: None,
            dispute_reason: None,
            dispute_resolution: None,
            dispute_resolved_at: None,
            audit_log: r#"[{"action":"created","actor":null,"at":"2026-08-29T00:00:00Z","data":{}}]"#
                .to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded() -> (crate::pool::Database, String, String) {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();
        let qr = qr_fixture(&business.id);
        db.qr_codes().insert(&qr).await.unwrap();
        let scan = scan_fixture(&qr.id, "sess-1");
        db.scans().insert(&scan).await.unwrap();
        (db, business.id, scan.id)
    }

    fn audit(action: &str) -> String {
        serde_json::json!({
            "action": action,
            "actor": "ops@test",
            "at": Utc::now(),
            "data": {}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_one_commission_per_scan() {
        let (db, business_id, scan_id) = seeded().await;

        db.commissions()
            .insert(&commission_fixture(&business_id, &scan_id))
            .await
            .unwrap();

        let err = db
            .commissions()
            .insert(&commission_fixture(&business_id, &scan_id))
            .await
            .unwrap_err();
        assert!(
            err.is_unique_violation_on("commissions.scan_id"),
            "got {err:?}"
        );
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_lifecycle_guards_and_audit_appends() {
        let (db, business_id, scan_id) = seeded().await;
        let commission = commission_fixture(&business_id, &scan_id);
        db.commissions().insert(&commission).await.unwrap();

        let now = Utc::now();

        // paid before approved: guard refuses
        assert!(!db
            .commissions()
            .mark_paid(&commission.id, "bank", "TX-1", now, &audit("paid"))
            .await
            .unwrap());

        assert!(db
            .commissions()
            .approve(&commission.id, "ops@test", now, &audit("approved"))
            .await
            .unwrap());
        // double approve refuses
        assert!(!db
            .commissions()
            .approve(&commission.id, "ops@test", now, &audit("approved"))
            .await
            .unwrap());

        assert!(db
            .commissions()
            .mark_paid(&commission.id, "bank", "TX-1", now, &audit("paid"))
            .await
            .unwrap());

        let loaded = db.commissions().get_by_id(&commission.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CommissionStatus::Paid);
        assert_eq!(loaded.transaction_reference.as_deref(), Some("TX-1"));

        // created + approved + paid, oldest first
        let entries = loaded.audit_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].action, "created");
        assert_eq!(entries[1].action, "approved");
        assert_eq!(entries[2].action, "paid");

        // terminal: reject after paid refuses
        assert!(!db
            .commissions()
            .reject(&commission.id, now, &audit("rejected"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_dispute_round_trip_with_adjustment() {
        let (db, business_id, scan_id) = seeded().await;
        let commission = commission_fixture(&business_id, &scan_id);
        db.commissions().insert(&commission).await.unwrap();

        let now = Utc::now();
        assert!(db
            .commissions()
            .open_dispute(&commission.id, "amount off", now, &audit("dispute_created"))
            .await
            .unwrap());

        assert!(db
            .commissions()
            .resolve_dispute(
                &commission.id,
                CommissionStatus::Approved,
                "partial adjustment",
                Some(1_000),
                now,
                &audit("dispute_resolved"),
            )
            .await
            .unwrap());

        let loaded = db.commissions().get_by_id(&commission.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, CommissionStatus::Approved);
        assert_eq!(loaded.net_commission_cents, 1_000);
        // original computed amount stays for the record
        assert_eq!(loaded.commission_amount_cents, 1_440);
        assert_eq!(loaded.dispute_resolution.as_deref(), Some("partial adjustment"));
    }

    #[tokio::test]
    async fn test_totals_group_by_status() {
        let (db, business_id, scan_id) = seeded().await;
        let commission = commission_fixture(&business_id, &scan_id);
        db.commissions().insert(&commission).await.unwrap();

        let totals = db.commissions().totals_for_business(&business_id).await.unwrap();
        assert_eq!(totals.pending_cents, 1_440);
        assert_eq!(totals.approved_cents, 0);

        db.commissions()
            .approve(&commission.id, "ops@test", Utc::now(), &audit("approved"))
            .await
            .unwrap();

        let totals = db.commissions().totals_for_business(&business_id).await.unwrap();
        assert_eq!(totals.pending_cents, 0);
        assert_eq!(totals.approved_cents, 1_440);
    }

    #[tokio::test]
    async fn test_list_filter_by_status() {
        let (db, business_id, scan_id) = seeded().await;
        db.commissions()
            .insert(&commission_fixture(&business_id, &scan_id))
            .await
            .unwrap();

        let pending = db
            .commissions()
            .list_for_business(&business_id, Some(CommissionStatus::Pending), 50)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let paid = db
            .commissions()
            .list_for_business(&business_id, Some(CommissionStatus::Paid), 50)
            .await
            .unwrap();
        assert!(paid.is_empty());
    }
}
