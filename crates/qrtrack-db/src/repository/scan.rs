//! # Scan Repository
//!
//! Database operations for scan events.
//!
//! ## Session Continuity Lookups
//! The scan pipeline reuses an existing session token when a repeat scan can
//! be tied to a prior one. Two lookups back this, a fallback ladder walked in
//! order:
//!
//! 1. Same authenticated customer, same code, inside the tracking window
//! 2. Same IP + user agent fingerprint, same code, inside the tracking window
//!
//! Anything weaker starts a fresh session.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::CustomerScan;

/// Repository for customer scan database operations.
#[derive(Debug, Clone)]
pub struct ScanRepository {
    pool: SqlitePool,
}

impl ScanRepository {
    /// Creates a new ScanRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ScanRepository { pool }
    }

    /// Inserts a scan row.
    pub async fn insert(&self, scan: &CustomerScan) -> DbResult<()> {
        debug!(scan_id = %scan.id, qr_code_id = %scan.qr_code_id, "Inserting scan");

        sqlx::query(
            r#"
            INSERT INTO customer_scans (
                id, qr_code_id, customer_id, session_token, scan_token,
                ip_address, user_agent, device_type, browser, platform,
                detected_latitude, detected_longitude, detected_accuracy_m,
                matched_location_id, location_distance_km,
                scan_date, scan_hour, user_timezone, scan_result,
                fraud_score, is_suspicious, fraud_flags,
                booking_initiated, booking_completed, booking_id,
                conversion_time_minutes,
                scanned_at
            )
            VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27
            )
            "#,
        )
        .bind(&scan.id)
        .bind(&scan.qr_code_id)
        .bind(&scan.customer_id)
        .bind(&scan.session_token)
        .bind(&scan.scan_token)
        .bind(&scan.ip_address)
        .bind(&scan.user_agent)
        .bind(scan.device_type)
        .bind(&scan.browser)
        .bind(&scan.platform)
        .bind(scan.detected_latitude)
        .bind(scan.detected_longitude)
        .bind(scan.detected_accuracy_m)
        .bind(&scan.matched_location_id)
        .bind(scan.location_distance_km)
        .bind(scan.scan_date)
        .bind(scan.scan_hour)
        .bind(&scan.user_timezone)
        .bind(scan.scan_result)
        .bind(scan.fraud_score)
        .bind(scan.is_suspicious)
        .bind(&scan.fraud_flags)
        .bind(scan.booking_initiated)
        .bind(scan.booking_completed)
        .bind(&scan.booking_id)
        .bind(scan.conversion_time_minutes)
        .bind(scan.scanned_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a scan by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CustomerScan>> {
        let scan = sqlx::query_as::<_, CustomerScan>("SELECT * FROM customer_scans WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(scan)
    }

    /// Gets a scan by its unique scan token (handed to the booking flow).
    pub async fn get_by_scan_token(&self, scan_token: &str) -> DbResult<Option<CustomerScan>> {
        let scan = sqlx::query_as::<_, CustomerScan>(
            "SELECT * FROM customer_scans WHERE scan_token = ?1",
        )
        .bind(scan_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scan)
    }

    /// Most recent scan of this code by the given authenticated customer
    /// since `since`. First rung of the session fallback ladder.
    pub async fn latest_for_customer(
        &self,
        qr_code_id: &str,
        customer_id: &str,
        since: DateTime<Utc>,
    ) -> DbResult<Option<CustomerScan>> {
        let scan = sqlx::query_as::<_, CustomerScan>(
            r#"
            SELECT * FROM customer_scans
            WHERE qr_code_id = ?1 AND customer_id = ?2 AND scanned_at > ?3
            ORDER BY scanned_at DESC
            LIMIT 1
            "#,
        )
        .bind(qr_code_id)
        .bind(customer_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scan)
    }

    /// Most recent scan of this code from the same IP + user agent since
    /// `since`. Second rung of the session fallback ladder; only consulted
    /// when both fingerprint parts are present.
    pub async fn latest_for_fingerprint(
        &self,
        qr_code_id: &str,
        ip_address: &str,
        user_agent: &str,
        since: DateTime<Utc>,
    ) -> DbResult<Option<CustomerScan>> {
        let scan = sqlx::query_as::<_, CustomerScan>(
            r#"
            SELECT * FROM customer_scans
            WHERE qr_code_id = ?1 AND ip_address = ?2 AND user_agent = ?3
              AND scanned_at > ?4
            ORDER BY scanned_at DESC
            LIMIT 1
            "#,
        )
        .bind(qr_code_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(scan)
    }

    /// Number of scans sharing a session token since `since`. Feeds the
    /// repeat-scan fraud signal.
    pub async fn count_for_session(
        &self,
        session_token: &str,
        since: DateTime<Utc>,
    ) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customer_scans
            WHERE session_token = ?1 AND scanned_at > ?2
            "#,
        )
        .bind(session_token)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Successful scans of a code on one calendar day (daily limit check).
    pub async fn count_for_qr_on(&self, qr_code_id: &str, date: NaiveDate) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customer_scans
            WHERE qr_code_id = ?1 AND scan_date = ?2 AND scan_result = 'success'
            "#,
        )
        .bind(qr_code_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Successful scans of a code in one calendar month (`month` formatted
    /// `YYYY-MM`; monthly limit check).
    pub async fn count_for_qr_in_month(&self, qr_code_id: &str, month: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customer_scans
            WHERE qr_code_id = ?1
              AND strftime('%Y-%m', scan_date) = ?2
              AND scan_result = 'success'
            "#,
        )
        .bind(qr_code_id)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Whether any earlier scan of this code used the same session token.
    /// Decides the `unique_scans` increment.
    pub async fn session_seen_for_qr(
        &self,
        qr_code_id: &str,
        session_token: &str,
    ) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM customer_scans
            WHERE qr_code_id = ?1 AND session_token = ?2
            "#,
        )
        .bind(qr_code_id)
        .bind(session_token)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Marks that the customer proceeded from the landing page toward a
    /// booking.
    pub async fn mark_booking_initiated(&self, scan_id: &str) -> DbResult<()> {
        sqlx::query("UPDATE customer_scans SET booking_initiated = 1 WHERE id = ?1")
            .bind(scan_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Writes the booking outcome. Exactly-once: the guard on
    /// `booking_completed = 0` makes a duplicate completion a no-op.
    ///
    /// ## Returns
    /// * `true` - outcome recorded now
    /// * `false` - the scan was already completed (or doesn't exist)
    pub async fn complete_booking(
        &self,
        scan_id: &str,
        booking_id: &str,
        conversion_time_minutes: Option<i64>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE customer_scans SET
                booking_initiated = 1,
                booking_completed = 1,
                booking_id = ?1,
                conversion_time_minutes = ?2
            WHERE id = ?3 AND booking_completed = 0
            "#,
        )
        .bind(booking_id)
        .bind(conversion_time_minutes)
        .bind(scan_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Recent scans for a code, newest first.
    pub async fn list_for_qr(&self, qr_code_id: &str, limit: u32) -> DbResult<Vec<CustomerScan>> {
        let scans = sqlx::query_as::<_, CustomerScan>(
            r#"
            SELECT * FROM customer_scans
            WHERE qr_code_id = ?1
            ORDER BY scanned_at DESC
            LIMIT ?2
            "#,
        )
        .bind(qr_code_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(scans)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{business_fixture, qr_fixture, scan_fixture, test_db};
    use chrono::Duration;
    use uuid::Uuid;

    async fn seeded() -> (crate::pool::Database, String) {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();
        let qr = qr_fixture(&business.id);
        db.qr_codes().insert(&qr).await.unwrap();
        (db, qr.id)
    }

    #[tokio::test]
    async fn test_insert_and_token_lookup() {
        let (db, qr_id) = seeded().await;
        let scan = scan_fixture(&qr_id, "sess-1");
        db.scans().insert(&scan).await.unwrap();

        let found = db
            .scans()
            .get_by_scan_token(&scan.scan_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, scan.id);
        assert_eq!(found.session_token, "sess-1");
        assert_eq!(found.fraud_flag_list(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_customer_ladder_lookup_respects_window() {
        let (db, qr_id) = seeded().await;
        let mut scan = scan_fixture(&qr_id, "sess-1");
        scan.customer_id = Some("cust-1".to_string());
        scan.scanned_at = Utc::now() - Duration::hours(2);
        db.scans().insert(&scan).await.unwrap();

        // Inside the window: found.
        let since = Utc::now() - Duration::hours(24);
        let hit = db
            .scans()
            .latest_for_customer(&qr_id, "cust-1", since)
            .await
            .unwrap();
        assert!(hit.is_some());

        // Outside the window: fresh session.
        let since = Utc::now() - Duration::hours(1);
        let miss = db
            .scans()
            .latest_for_customer(&qr_id, "cust-1", since)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_fingerprint_ladder_lookup() {
        let (db, qr_id) = seeded().await;
        let scan = scan_fixture(&qr_id, "sess-1");
        db.scans().insert(&scan).await.unwrap();

        let since = Utc::now() - Duration::hours(24);
        let hit = db
            .scans()
            .latest_for_fingerprint(
                &qr_id,
                scan.ip_address.as_deref().unwrap(),
                scan.user_agent.as_deref().unwrap(),
                since,
            )
            .await
            .unwrap();
        assert_eq!(hit.unwrap().session_token, "sess-1");

        let miss = db
            .scans()
            .latest_for_fingerprint(&qr_id, "198.51.100.1", "other agent", since)
            .await
            .unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_session_and_daily_counters() {
        let (db, qr_id) = seeded().await;
        for _ in 0..3 {
            db.scans().insert(&scan_fixture(&qr_id, "sess-1")).await.unwrap();
        }
        db.scans().insert(&scan_fixture(&qr_id, "sess-2")).await.unwrap();

        let since = Utc::now() - Duration::hours(24);
        assert_eq!(db.scans().count_for_session("sess-1", since).await.unwrap(), 3);
        assert_eq!(db.scans().count_for_session("sess-2", since).await.unwrap(), 1);

        let today = Utc::now().date_naive();
        assert_eq!(db.scans().count_for_qr_on(&qr_id, today).await.unwrap(), 4);

        let month = Utc::now().format("%Y-%m").to_string();
        assert_eq!(
            db.scans().count_for_qr_in_month(&qr_id, &month).await.unwrap(),
            4
        );

        assert!(db.scans().session_seen_for_qr(&qr_id, "sess-1").await.unwrap());
        assert!(!db.scans().session_seen_for_qr(&qr_id, "sess-9").await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_booking_is_exactly_once() {
        let (db, qr_id) = seeded().await;
        let scan = scan_fixture(&qr_id, "sess-1");
        db.scans().insert(&scan).await.unwrap();

        assert!(db
            .scans()
            .complete_booking(&scan.id, "BOOK-1", Some(45))
            .await
            .unwrap());

        // Replay is a no-op and must not overwrite the first outcome.
        assert!(!db
            .scans()
            .complete_booking(&scan.id, "BOOK-2", Some(90))
            .await
            .unwrap());

        let loaded = db.scans().get_by_id(&scan.id).await.unwrap().unwrap();
        assert!(loaded.has_booking());
        assert_eq!(loaded.booking_id.as_deref(), Some("BOOK-1"));
        assert_eq!(loaded.conversion_time_minutes, Some(45));
    }
}
