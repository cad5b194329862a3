//! # Business Repository
//!
//! Database operations for businesses, their physical locations, and their
//! optional commercial-term override row.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::{Business, BusinessLocation, BusinessModelOverrides, BusinessStatus};

/// Repository for business database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = BusinessRepository::new(pool);
///
/// let business = repo.get_by_id("uuid-here").await?;
/// let overrides = repo.model_overrides("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct BusinessRepository {
    pool: SqlitePool,
}

impl BusinessRepository {
    /// Creates a new BusinessRepository.
    pub fn new(pool: SqlitePool) -> Self {
        BusinessRepository { pool }
    }

    // =========================================================================
    // Businesses
    // =========================================================================

    /// Inserts a business row.
    pub async fn insert(&self, business: &Business) -> DbResult<()> {
        debug!(business_id = %business.id, "Inserting business");

        sqlx::query(
            r#"
            INSERT INTO businesses (
                id, name, business_type, contact_email, contact_phone,
                website, city, country, currency,
                verification_status, status, verified_at,
                dashboard_access_token, dashboard_token_expires_at,
                last_dashboard_access,
                created_at, updated_at, deleted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&business.id)
        .bind(&business.name)
        .bind(business.business_type)
        .bind(&business.contact_email)
        .bind(&business.contact_phone)
        .bind(&business.website)
        .bind(&business.city)
        .bind(&business.country)
        .bind(&business.currency)
        .bind(business.verification_status)
        .bind(business.status)
        .bind(business.verified_at)
        .bind(&business.dashboard_access_token)
        .bind(business.dashboard_token_expires_at)
        .bind(business.last_dashboard_access)
        .bind(business.created_at)
        .bind(business.updated_at)
        .bind(business.deleted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a business by ID. Soft-deleted rows are still returned; callers
    /// check `deleted_at` via [`Business::is_active`].
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(business)
    }

    /// Looks up a business by its long-lived dashboard bearer token.
    pub async fn get_by_dashboard_token(&self, token: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>(
            "SELECT * FROM businesses WHERE dashboard_access_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(business)
    }

    /// Installs (or rotates) the dashboard bearer token.
    pub async fn set_dashboard_token(
        &self,
        business_id: &str,
        token: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE businesses SET
                dashboard_access_token = ?1,
                dashboard_token_expires_at = ?2,
                updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(token)
        .bind(expires_at)
        .bind(now)
        .bind(business_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records the most recent dashboard access time.
    pub async fn touch_dashboard_access(
        &self,
        business_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE businesses SET last_dashboard_access = ?1 WHERE id = ?2")
            .bind(now)
            .bind(business_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Updates the business lifecycle status.
    pub async fn update_status(
        &self,
        business_id: &str,
        status: BusinessStatus,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE businesses SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(now)
            .bind(business_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Marks a business verified and activates it.
    pub async fn mark_verified(&self, business_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE businesses SET
                verification_status = 'verified',
                status = 'active',
                verified_at = ?1,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(business_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Soft-deletes a business.
    pub async fn soft_delete(&self, business_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE businesses SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(business_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Locations
    // =========================================================================

    /// Inserts a location row.
    pub async fn insert_location(&self, location: &BusinessLocation) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO business_locations (
                id, business_id, name, address_line, city, country,
                latitude, longitude, accuracy_radius_m, is_active,
                created_at, updated_at, deleted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&location.id)
        .bind(&location.business_id)
        .bind(&location.name)
        .bind(&location.address_line)
        .bind(&location.city)
        .bind(&location.country)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(location.accuracy_radius_m)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .bind(location.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All locations for a business, including inactive ones; geo-matching
    /// filters on its side.
    pub async fn locations_for(&self, business_id: &str) -> DbResult<Vec<BusinessLocation>> {
        let locations = sqlx::query_as::<_, BusinessLocation>(
            "SELECT * FROM business_locations WHERE business_id = ?1 ORDER BY created_at",
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(locations)
    }

    // =========================================================================
    // Model Overrides
    // =========================================================================

    /// The override row for a business, if one was ever configured.
    pub async fn model_overrides(
        &self,
        business_id: &str,
    ) -> DbResult<Option<BusinessModelOverrides>> {
        let overrides = sqlx::query_as::<_, BusinessModelOverrides>(
            "SELECT * FROM business_models WHERE business_id = ?1",
        )
        .bind(business_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(overrides)
    }

    /// Creates or replaces the override row for a business.
    ///
    /// `business_id` is UNIQUE so the upsert keeps the zero-or-one invariant.
    pub async fn upsert_model_overrides(
        &self,
        overrides: &BusinessModelOverrides,
    ) -> DbResult<()> {
        debug!(business_id = %overrides.business_id, "Upserting business model overrides");

        sqlx::query(
            r#"
            INSERT INTO business_models (
                id, business_id,
                discount_type, discount_value,
                min_booking_amount_cents, max_discount_amount_cents,
                commission_rate, commission_type, payout_threshold_cents,
                max_qr_per_month, qr_validity_days,
                configured_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(business_id) DO UPDATE SET
                discount_type = excluded.discount_type,
                discount_value = excluded.discount_value,
                min_booking_amount_cents = excluded.min_booking_amount_cents,
                max_discount_amount_cents = excluded.max_discount_amount_cents,
                commission_rate = excluded.commission_rate,
                commission_type = excluded.commission_type,
                payout_threshold_cents = excluded.payout_threshold_cents,
                max_qr_per_month = excluded.max_qr_per_month,
                qr_validity_days = excluded.qr_validity_days,
                configured_at = excluded.configured_at
            "#,
        )
        .bind(&overrides.id)
        .bind(&overrides.business_id)
        .bind(overrides.discount_type)
        .bind(overrides.discount_value)
        .bind(overrides.min_booking_amount_cents)
        .bind(overrides.max_discount_amount_cents)
        .bind(overrides.commission_rate)
        .bind(overrides.commission_type)
        .bind(overrides.payout_threshold_cents)
        .bind(overrides.max_qr_per_month)
        .bind(overrides.qr_validity_days)
        .bind(overrides.configured_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Removes the override row, reverting the business to global terms.
    pub async fn delete_model_overrides(&self, business_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM business_models WHERE business_id = ?1")
            .bind(business_id)
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
    use crate::testutil::{business_fixture, test_db};
    use qrtrack_core::{CommissionType, DiscountType};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let loaded = db.businesses().get_by_id(&business.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Hotel Sol");
        assert!(loaded.is_verified());
        assert!(loaded.is_active());

        assert!(db.businesses().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dashboard_token_lookup_and_rotation() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let now = Utc::now();
        let expires = now + chrono::Duration::days(30);
        db.businesses()
            .set_dashboard_token(&business.id, "AFF-abc123", expires, now)
            .await
            .unwrap();

        let found = db
            .businesses()
            .get_by_dashboard_token("AFF-abc123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, business.id);
        assert!(found.is_dashboard_token_valid_at(now));

        // Rotation replaces the credential; the old one stops matching.
        db.businesses()
            .set_dashboard_token(&business.id, "AFF-def456", expires, now)
            .await
            .unwrap();
        assert!(db
            .businesses()
            .get_by_dashboard_token("AFF-abc123")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_soft_delete_invalidates_activity() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        db.businesses()
            .soft_delete(&business.id, Utc::now())
            .await
            .unwrap();

        let loaded = db.businesses().get_by_id(&business.id).await.unwrap().unwrap();
        assert!(loaded.deleted_at.is_some());
        assert!(!loaded.is_active());
    }

    #[tokio::test]
    async fn test_model_overrides_upsert_keeps_single_row() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        assert!(db
            .businesses()
            .model_overrides(&business.id)
            .await
            .unwrap()
            .is_none());

        let now = Utc::now();
        let mut overrides = BusinessModelOverrides {
            id: Uuid::new_v4().to_string(),
            business_id: business.id.clone(),
            discount_type: Some(DiscountType::Percentage),
            discount_value: Some(1_000),
            min_booking_amount_cents: None,
            max_discount_amount_cents: None,
            commission_rate: Some(800),
            commission_type: Some(CommissionType::Percentage),
            payout_threshold_cents: None,
            max_qr_per_month: None,
            qr_validity_days: None,
            configured_at: now,
        };
        db.businesses().upsert_model_overrides(&overrides).await.unwrap();

        // Second write for the same business replaces, not duplicates.
        overrides.id = Uuid::new_v4().to_string();
        overrides.commission_rate = Some(900);
        db.businesses().upsert_model_overrides(&overrides).await.unwrap();

        let loaded = db
            .businesses()
            .model_overrides(&business.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.commission_rate, Some(900));
        assert_eq!(loaded.discount_value, Some(1_000));

        assert!(db
            .businesses()
            .delete_model_overrides(&business.id)
            .await
            .unwrap());
        assert!(db
            .businesses()
            .model_overrides(&business.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_locations_round_trip() {
        let db = test_db().await;
        let business = business_fixture(&Uuid::new_v4().to_string());
        db.businesses().insert(&business).await.unwrap();

        let now = Utc::now();
        let location = BusinessLocation {
            id: Uuid::new_v4().to_string(),
            business_id: business.id.clone(),
            name: "Main entrance".to_string(),
            address_line: None,
            city: Some("Lisbon".to_string()),
            country: Some("PT".to_string()),
            latitude: 38.7223,
            longitude: -9.1393,
            accuracy_radius_m: 100,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        db.businesses().insert_location(&location).await.unwrap();

        let locations = db.businesses().locations_for(&business.id).await.unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].accuracy_radius_m, 100);
    }
}
