//! # QR Code Repository
//!
//! Database operations for issued QR codes.
//!
//! ## Counter Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Why counters are updated storage-side                      │
//! │                                                                         │
//! │  WRONG (read-modify-write, lost updates under concurrency):            │
//! │    let qr = get(id);                                                    │
//! │    qr.current_usage += 1;                                               │
//! │    save(qr);                                                            │
//! │                                                                         │
//! │  RIGHT (single atomic statement, the limit check travels with it):     │
//! │    UPDATE qr_codes                                                      │
//! │    SET current_usage = current_usage + 1, ...                           │
//! │    WHERE id = ? AND (usage_limit IS NULL OR usage_limit = 0             │
//! │                      OR current_usage < usage_limit)                    │
//! │                                                                         │
//! │  rows_affected = 0 means the limit was reached by a concurrent scan.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::{QrCode, QrStatus};

/// Usage figures rederived from the scan table, for external
/// reconciliation of counter drift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageRecount {
    /// Every scan row, rejected attempts included.
    pub total: i64,
    /// Distinct session tokens among successful scans.
    pub unique: i64,
    /// Successful scans that completed a booking.
    pub conversions: i64,
}

/// Repository for QR code database operations.
#[derive(Debug, Clone)]
pub struct QrCodeRepository {
    pool: SqlitePool,
}

impl QrCodeRepository {
    /// Creates a new QrCodeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        QrCodeRepository { pool }
    }

    /// Inserts a QR code row.
    ///
    /// Fails with `DbError::UniqueViolation` on a short-code, hash, or value
    /// collision; the registry retries short-code collisions with a fresh code.
    pub async fn insert(&self, qr: &QrCode) -> DbResult<()> {
        debug!(qr_id = %qr.id, short_code = %qr.short_code, "Inserting QR code");

        sqlx::query(
            r#"
            INSERT INTO qr_codes (
                id, business_id, location_id,
                qr_value, qr_hash, short_code, qr_url,
                discount_type, discount_value,
                min_booking_amount_cents, max_discount_amount_cents,
                status, valid_from, valid_until, expires_at,
                usage_limit, daily_limit, monthly_limit,
                current_usage, total_scans, unique_scans,
                conversion_count, total_revenue_cents, last_scanned_at,
                created_at, updated_at, deleted_at
            )
            VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
            )
            "#,
        )
        .bind(&qr.id)
        .bind(&qr.business_id)
        .bind(&qr.location_id)
        .bind(&qr.qr_value)
        .bind(&qr.qr_hash)
        .bind(&qr.short_code)
        .bind(&qr.qr_url)
        .bind(qr.discount_type)
        .bind(qr.discount_value)
        .bind(qr.min_booking_amount_cents)
        .bind(qr.max_discount_amount_cents)
        .bind(qr.status)
        .bind(qr.valid_from)
        .bind(qr.valid_until)
        .bind(qr.expires_at)
        .bind(qr.usage_limit)
        .bind(qr.daily_limit)
        .bind(qr.monthly_limit)
        .bind(qr.current_usage)
        .bind(qr.total_scans)
        .bind(qr.unique_scans)
        .bind(qr.conversion_count)
        .bind(qr.total_revenue_cents)
        .bind(qr.last_scanned_at)
        .bind(qr.created_at)
        .bind(qr.updated_at)
        .bind(qr.deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a QR code by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qr)
    }

    /// Gets a QR code by its public short code.
    pub async fn get_by_short_code(&self, short_code: &str) -> DbResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE short_code = ?1")
            .bind(short_code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qr)
    }

    /// Gets a QR code by its integrity hash.
    pub async fn get_by_hash(&self, qr_hash: &str) -> DbResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE qr_hash = ?1")
            .bind(qr_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qr)
    }

    /// Gets a QR code by its opaque value.
    pub async fn get_by_value(&self, qr_value: &str) -> DbResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>("SELECT * FROM qr_codes WHERE qr_value = ?1")
            .bind(qr_value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(qr)
    }

    /// Gets a business's newest active code for a location.
    ///
    /// Last rung of tracking-token resolution: a token that cannot be
    /// matched by hash still attributes to the business's active code for
    /// the location it names. `location_id = None` matches codes bound to
    /// no location (`IS` compares NULLs as equal).
    pub async fn get_active_for_location(
        &self,
        business_id: &str,
        location_id: Option<&str>,
    ) -> DbResult<Option<QrCode>> {
        let qr = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT * FROM qr_codes
            WHERE business_id = ?1 AND location_id IS ?2
              AND status = 'active' AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(business_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(qr)
    }

    /// Lists codes for a business, newest first. Soft-deleted codes excluded.
    pub async fn list_for_business(&self, business_id: &str) -> DbResult<Vec<QrCode>> {
        let codes = sqlx::query_as::<_, QrCode>(
            r#"
            SELECT * FROM qr_codes
            WHERE business_id = ?1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// How many codes a business issued in the given calendar month
    /// (`month` formatted `YYYY-MM`). Counts soft-deleted codes too: deleting
    /// a code does not refund quota.
    pub async fn count_issued_in_month(&self, business_id: &str, month: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM qr_codes
            WHERE business_id = ?1 AND strftime('%Y-%m', created_at) = ?2
            "#,
        )
        .bind(business_id)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Atomically records one successful scan against the code.
    ///
    /// Increments `current_usage` and `total_scans` (and `unique_scans` when
    /// `unique` is set) in a single statement guarded by the usage limit.
    ///
    /// ## Returns
    /// * `true` - counters advanced
    /// * `false` - the usage limit was already reached (lost the race)
    pub async fn record_scan(
        &self,
        qr_id: &str,
        unique: bool,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE qr_codes SET
                current_usage = current_usage + 1,
                total_scans = total_scans + 1,
                unique_scans = unique_scans + ?1,
                last_scanned_at = ?2,
                updated_at = ?2
            WHERE id = ?3
              AND (usage_limit IS NULL OR usage_limit = 0 OR current_usage < usage_limit)
            "#,
        )
        .bind(if unique { 1_i64 } else { 0 })
        .bind(now)
        .bind(qr_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a rejected scan attempt: analytics counters move, usage does
    /// not.
    pub async fn record_rejected_scan(&self, qr_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE qr_codes SET
                total_scans = total_scans + 1,
                last_scanned_at = ?1,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(qr_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records a completed booking attributed to this code.
    pub async fn record_conversion(
        &self,
        qr_id: &str,
        revenue_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE qr_codes SET
                conversion_count = conversion_count + 1,
                total_revenue_cents = total_revenue_cents + ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(revenue_cents)
        .bind(now)
        .bind(qr_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Sets the lifecycle status. Transition legality is checked by the
    /// registry before calling this.
    pub async fn update_status(
        &self,
        qr_id: &str,
        status: QrStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE qr_codes SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(now)
            .bind(qr_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Marks every active code whose validity window has passed as expired.
    ///
    /// Timestamps are written in one consistent format, so the lexicographic
    /// SQL comparison is chronological.
    ///
    /// ## Returns
    /// Number of codes transitioned.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE qr_codes SET status = 'expired', updated_at = ?1
            WHERE status = 'active'
              AND (
                  (valid_until IS NOT NULL AND valid_until <= ?1)
                  OR (expires_at IS NOT NULL AND expires_at <= ?1)
              )
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Rebuilds every usage counter from the scan table and returns the
    /// recomputed figures.
    ///
    /// Recovery tool for counter drift (e.g. a crash between the usage
    /// increment and the scan insert); normal operation never needs it.
    pub async fn recount_usage(&self, qr_id: &str, now: DateTime<Utc>) -> DbResult<UsageRecount> {
        sqlx::query(
            r#"
            UPDATE qr_codes SET
                current_usage = (
                    SELECT COUNT(*) FROM customer_scans
                    WHERE qr_code_id = ?1 AND scan_result = 'success'
                ),
                total_scans = (
                    SELECT COUNT(*) FROM customer_scans
                    WHERE qr_code_id = ?1
                ),
                unique_scans = (
                    SELECT COUNT(DISTINCT session_token) FROM customer_scans
                    WHERE qr_code_id = ?1 AND scan_result = 'success'
                ),
                conversion_count = (
                    SELECT COUNT(*) FROM customer_scans
                    WHERE qr_code_id = ?1 AND booking_completed = 1
                ),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(qr_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let (total, unique, conversions): (i64, i64, i64) = sqlx::query_as(
            "SELECT total_scans, unique_scans, conversion_count FROM qr_codes WHERE id = ?1",
        )
        .bind(qr_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(UsageRecount {
            total,
            unique,
            conversions,
        })
    }

    /// Soft-deletes a QR code.
    pub async fn soft_delete(&self, qr_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE qr_codes SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(qr_id)
            .execute(&self.pool)
            .await?;
        Ok(())
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
    use qrtrack_core::ScanResult;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_and_lookups() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let qr = qr_fixture(&business.id);
        db.qr_codes().insert(&qr).await.unwrap();

        assert!(db.qr_codes().get_by_id(&qr.id).await.unwrap().is_some());
        assert!(db
            .qr_codes()
            .get_by_short_code(&qr.short_code)
            .await
            .unwrap()
            .is_some());
        assert!(db.qr_codes().get_by_hash(&qr.qr_hash).await.unwrap().is_some());
        assert!(db.qr_codes().get_by_value(&qr.qr_value).await.unwrap().is_some());
        assert!(db.qr_codes().get_by_short_code("MISSING1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_code_collision_reports_unique_violation() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let qr = qr_fixture(&business.id);
        db.qr_codes().insert(&qr).await.unwrap();

        let mut dup = qr_fixture(&business.id);
        dup.short_code = qr.short_code.clone();

        let err = db.qr_codes().insert(&dup).await.unwrap_err();
        assert!(
            err.is_unique_violation_on("qr_codes.short_code"),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_record_scan_respects_usage_limit() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let mut qr = qr_fixture(&business.id);
        qr.usage_limit = Some(1);
        db.qr_codes().insert(&qr).await.unwrap();

        let now = Utc::now();
        assert!(db.qr_codes().record_scan(&qr.id, true, now).await.unwrap());
        // Second consume hits the limit.
        assert!(!db.qr_codes().record_scan(&qr.id, false, now).await.unwrap());

        let loaded = db.qr_codes().get_by_id(&qr.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_usage, 1);
        assert_eq!(loaded.total_scans, 1);
        assert_eq!(loaded.unique_scans, 1);
        assert!(loaded.last_scanned_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_record_scan_never_overshoots() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let mut qr = qr_fixture(&business.id);
        qr.usage_limit = Some(2);
        db.qr_codes().insert(&qr).await.unwrap();

        let now = Utc::now();
        let repo = db.qr_codes();
        let (a, b, c, d) = tokio::join!(
            repo.record_scan(&qr.id, false, now),
            repo.record_scan(&qr.id, false, now),
            repo.record_scan(&qr.id, false, now),
            repo.record_scan(&qr.id, false, now),
        );
        let granted = [a, b, c, d]
            .into_iter()
            .filter(|r| *r.as_ref().unwrap())
            .count();
        assert_eq!(granted, 2);

        let loaded = db.qr_codes().get_by_id(&qr.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_usage, 2);
    }

    #[tokio::test]
    async fn test_zero_usage_limit_is_unlimited() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let mut qr = qr_fixture(&business.id);
        qr.usage_limit = Some(0);
        db.qr_codes().insert(&qr).await.unwrap();

        let now = Utc::now();
        for _ in 0..5 {
            assert!(db.qr_codes().record_scan(&qr.id, false, now).await.unwrap());
        }
        let loaded = db.qr_codes().get_by_id(&qr.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_usage, 5);
    }

    #[tokio::test]
    async fn test_rejected_scan_moves_analytics_not_usage() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let qr = qr_fixture(&business.id);
        db.qr_codes().insert(&qr).await.unwrap();

        db.qr_codes()
            .record_rejected_scan(&qr.id, Utc::now())
            .await
            .unwrap();

        let loaded = db.qr_codes().get_by_id(&qr.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_scans, 1);
        assert_eq!(loaded.current_usage, 0);
    }

    #[tokio::test]
    async fn test_sweep_expired_only_touches_lapsed_active_codes() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let now = Utc::now();

        let mut lapsed = qr_fixture(&business.id);
        lapsed.valid_until = Some(now - chrono::Duration::hours(1));
        db.qr_codes().insert(&lapsed).await.unwrap();

        let mut open = qr_fixture(&business.id);
        open.valid_until = Some(now + chrono::Duration::days(30));
        db.qr_codes().insert(&open).await.unwrap();

        let mut lapsed_inactive = qr_fixture(&business.id);
        lapsed_inactive.status = QrStatus::Inactive;
        lapsed_inactive.valid_until = Some(now - chrono::Duration::hours(1));
        db.qr_codes().insert(&lapsed_inactive).await.unwrap();

        let swept = db.qr_codes().sweep_expired(now).await.unwrap();
        assert_eq!(swept, 1);

        let loaded = db.qr_codes().get_by_id(&lapsed.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, QrStatus::Expired);

        // Paused code keeps its status even though its window passed.
        let paused = db
            .qr_codes()
            .get_by_id(&lapsed_inactive.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paused.status, QrStatus::Inactive);
    }

    #[tokio::test]
    async fn test_recount_usage_rebuilds_from_scans() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let mut qr = qr_fixture(&business.id);
        qr.current_usage = 42; // drifted
        qr.unique_scans = 42;
        qr.conversion_count = 42;
        db.qr_codes().insert(&qr).await.unwrap();

        // Two successes on one session, one of them converted, plus a
        // rejected attempt.
        db.scans()
            .insert(&scan_fixture(&qr.id, "sess-1"))
            .await
            .unwrap();
        let mut converted = scan_fixture(&qr.id, "sess-1");
        converted.booking_completed = true;
        converted.booking_id = Some("BOOK-1".to_string());
        db.scans().insert(&converted).await.unwrap();
        let mut rejected = scan_fixture(&qr.id, "sess-2");
        rejected.scan_result = ScanResult::Rejected;
        db.scans().insert(&rejected).await.unwrap();

        let recount = db.qr_codes().recount_usage(&qr.id, Utc::now()).await.unwrap();
        assert_eq!(
            recount,
            UsageRecount {
                total: 3,
                unique: 1,
                conversions: 1,
            }
        );

        let loaded = db.qr_codes().get_by_id(&qr.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_usage, 2);
        assert_eq!(loaded.total_scans, 3);
        assert_eq!(loaded.unique_scans, 1);
        assert_eq!(loaded.conversion_count, 1);
    }

    #[tokio::test]
    async fn test_monthly_issue_count() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        db.qr_codes().insert(&qr_fixture(&business.id)).await.unwrap();
        db.qr_codes().insert(&qr_fixture(&business.id)).await.unwrap();

        let month = Utc::now().format("%Y-%m").to_string();
        let count = db
            .qr_codes()
            .count_issued_in_month(&business.id, &month)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let none = db
            .qr_codes()
            .count_issued_in_month(&business.id, "1999-01")
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn test_errors_expose_dberror_variants() {
        let db = test_db().await;
        // Orphan insert violates the business_id foreign key.
        let qr = qr_fixture("no-such-business");
        let err = db.qr_codes().insert(&qr).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }), "got {err:?}");
    }
}
