//! # Global Settings Repository
//!
//! Access to the singleton `global_settings` row.
//!
//! ## Self-Healing Singleton
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  get_or_create()                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT OR IGNORE (id = 1, hard defaults)  ← no-op when row exists      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT ... WHERE id = 1                    ← always finds a row        │
//! │                                                                         │
//! │  Two concurrent callers both succeed: the fixed primary key makes the  │
//! │  insert race resolve to a single row.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::model::defaults;
use qrtrack_core::GlobalSettings;

/// Fixed primary key of the singleton row.
const SETTINGS_ID: i64 = 1;

/// Repository for the global settings singleton.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Returns the settings row, creating it with hard defaults if missing.
    ///
    /// Safe under concurrent first access: the fixed id makes the insert
    /// idempotent.
    pub async fn get_or_create(&self, now: DateTime<Utc>) -> DbResult<GlobalSettings> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO global_settings (
                id,
                discount_type, discount_value,
                min_booking_amount_cents, max_discount_amount_cents,
                commission_rate, commission_type, payout_threshold_cents,
                max_qr_per_month, qr_validity_days, session_tracking_hours,
                allow_business_override, require_business_verification,
                auto_approve_commissions,
                updated_at
            )
            VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?5, ?6, ?7, ?8, ?9, 1, 1, 0, ?10)
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(defaults::DISCOUNT_TYPE)
        .bind(defaults::DISCOUNT_VALUE)
        .bind(defaults::COMMISSION_RATE)
        .bind(defaults::COMMISSION_TYPE)
        .bind(defaults::PAYOUT_THRESHOLD_CENTS)
        .bind(defaults::MAX_QR_PER_MONTH)
        .bind(defaults::QR_VALIDITY_DAYS)
        .bind(defaults::SESSION_TRACKING_HOURS)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let settings =
            sqlx::query_as::<_, GlobalSettings>("SELECT * FROM global_settings WHERE id = ?1")
                .bind(SETTINGS_ID)
                .fetch_one(&self.pool)
                .await?;

        Ok(settings)
    }

    /// Returns the settings row if present, without creating it.
    pub async fn get(&self) -> DbResult<Option<GlobalSettings>> {
        let settings =
            sqlx::query_as::<_, GlobalSettings>("SELECT * FROM global_settings WHERE id = ?1")
                .bind(SETTINGS_ID)
                .fetch_optional(&self.pool)
                .await?;
        Ok(settings)
    }

    /// Overwrites the singleton row with the given values.
    pub async fn update(&self, settings: &GlobalSettings) -> DbResult<()> {
        debug!("Updating global settings");

        sqlx::query(
            r#"
            UPDATE global_settings SET
                discount_type = ?1,
                discount_value = ?2,
                min_booking_amount_cents = ?3,
                max_discount_amount_cents = ?4,
                commission_rate = ?5,
                commission_type = ?6,
                payout_threshold_cents = ?7,
                max_qr_per_month = ?8,
                qr_validity_days = ?9,
                session_tracking_hours = ?10,
                allow_business_override = ?11,
                require_business_verification = ?12,
                auto_approve_commissions = ?13,
                updated_at = ?14
            WHERE id = ?15
            "#,
        )
        .bind(settings.discount_type)
        .bind(settings.discount_value)
        .bind(settings.min_booking_amount_cents)
        .bind(settings.max_discount_amount_cents)
        .bind(settings.commission_rate)
        .bind(settings.commission_type)
        .bind(settings.payout_threshold_cents)
        .bind(settings.max_qr_per_month)
        .bind(settings.qr_validity_days)
        .bind(settings.session_tracking_hours)
        .bind(settings.allow_business_override)
        .bind(settings.require_business_verification)
        .bind(settings.auto_approve_commissions)
        .bind(settings.updated_at)
        .bind(SETTINGS_ID)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
