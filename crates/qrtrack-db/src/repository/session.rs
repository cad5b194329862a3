//! # Dashboard Session Repository
//!
//! Database operations for dashboard sessions.
//!
//! ## Single Active Session
//! Creating a session for a business first revokes every other active one:
//! one live dashboard session per business at a time. Revocation is a status
//! flip, never a delete — revoked rows stay queryable for audit.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use qrtrack_core::DashboardSession;

/// Repository for dashboard session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Inserts a session row.
    pub async fn insert(&self, session: &DashboardSession) -> DbResult<()> {
        debug!(
            session_id = %session.id,
            business_id = %session.business_id,
            "Inserting dashboard session"
        );

        sqlx::query(
            r#"
            INSERT INTO dashboard_sessions (
                id, business_id, session_token, ip_address, user_agent,
                device_type, expires_at, last_accessed_at,
                is_active, revoked_at, revoke_reason,
                created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&session.id)
        .bind(&session.business_id)
        .bind(&session.session_token)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.device_type)
        .bind(session.expires_at)
        .bind(session.last_accessed_at)
        .bind(session.is_active)
        .bind(session.revoked_at)
        .bind(&session.revoke_reason)
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a session by its token.
    pub async fn get_by_token(&self, session_token: &str) -> DbResult<Option<DashboardSession>> {
        let session = sqlx::query_as::<_, DashboardSession>(
            "SELECT * FROM dashboard_sessions WHERE session_token = ?1",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Revokes every active session of a business.
    ///
    /// ## Returns
    /// Number of sessions revoked.
    pub async fn revoke_all_for_business(
        &self,
        business_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE dashboard_sessions SET
                is_active = 0,
                revoked_at = ?1,
                revoke_reason = ?2
            WHERE business_id = ?3 AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(business_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revokes a single session by token.
    pub async fn revoke(
        &self,
        session_token: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dashboard_sessions SET
                is_active = 0,
                revoked_at = ?1,
                revoke_reason = ?2
            WHERE session_token = ?3 AND is_active = 1
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(session_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Pushes the expiry forward on a live session.
    ///
    /// Guarded: refuses on revoked or deactivated rows, so extension can
    /// never resurrect a revoked credential.
    pub async fn extend(
        &self,
        session_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dashboard_sessions SET expires_at = ?1
            WHERE session_token = ?2 AND is_active = 1 AND revoked_at IS NULL
            "#,
        )
        .bind(new_expires_at)
        .bind(session_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Explicitly brings a revoked session back to life with a fresh expiry.
    /// The deliberate counterpart to [`extend`](Self::extend) refusing to.
    pub async fn reactivate(
        &self,
        session_token: &str,
        new_expires_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE dashboard_sessions SET
                is_active = 1,
                revoked_at = NULL,
                revoke_reason = NULL,
                expires_at = ?1
            WHERE session_token = ?2
            "#,
        )
        .bind(new_expires_at)
        .bind(session_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Records session activity.
    pub async fn touch(&self, session_token: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE dashboard_sessions SET last_accessed_at = ?1 WHERE session_token = ?2")
            .bind(now)
            .bind(session_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Active sessions for a business, newest first.
    pub async fn list_active_for_business(
        &self,
        business_id: &str,
    ) -> DbResult<Vec<DashboardSession>> {
        let sessions = sqlx::query_as::<_, DashboardSession>(
            r#"
            SELECT * FROM dashboard_sessions
            WHERE business_id = ?1 AND is_active = 1
            ORDER BY created_at DESC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// Deactivates sessions whose expiry has passed. Housekeeping; a session
    /// past its expiry already fails validation regardless.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE dashboard_sessions SET is_active = 0 WHERE is_active = 1 AND expires_at <= ?1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
