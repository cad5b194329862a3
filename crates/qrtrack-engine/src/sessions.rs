//! # Dashboard Session Manager
//!
//! Issues and polices dashboard credentials for businesses.
//!
//! ## Two Credential Mechanisms
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SESSION- rows (dashboard_sessions table)                               │
//! │    fine-grained: per login, revocable one at a time, touch-tracked      │
//! │    single-session policy: a new login revokes the earlier ones          │
//! │                                                                         │
//! │  AFF- bearer token (column on the business row)                         │
//! │    coarse-grained: one long-lived token per business, rotated whole     │
//! │                                                                         │
//! │  Either one independently grants access; they are validated by          │
//! │  separate paths and never mixed.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation failures deliberately collapse into `InvalidCredential` except
//! for explicit revocation, which callers may surface differently.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use qrtrack_core::{device, Business, DashboardSession};
use qrtrack_db::Database;

use crate::error::{EngineError, EngineResult};
use crate::token;

// =============================================================================
// Constants
// =============================================================================

/// Dashboard sessions and bearer tokens live this long.
const SESSION_TTL_DAYS: i64 = 30;

/// Revoke reason written when a newer login displaces a session.
const REASON_NEW_SESSION: &str = "new_session";

// =============================================================================
// Session Manager
// =============================================================================

/// Manages dashboard sessions and business bearer tokens.
pub struct DashboardSessionManager {
    /// Database connection.
    db: Arc<Database>,
}

impl DashboardSessionManager {
    /// Creates a new session manager.
    pub fn new(db: Arc<Database>) -> Self {
        DashboardSessionManager { db }
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Creates a session for a business login.
    ///
    /// Single-session policy: every other live session of the business is
    /// revoked first.
    pub async fn create(
        &self,
        business_id: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardSession> {
        let business = self.active_business(business_id).await?;

        let displaced = self
            .db
            .sessions()
            .revoke_all_for_business(&business.id, REASON_NEW_SESSION, now)
            .await?;
        if displaced > 0 {
            debug!(business_id, displaced, "Displaced earlier sessions");
        }

        let info = device::classify(user_agent);
        let session = DashboardSession {
            id: uuid::Uuid::new_v4().to_string(),
            business_id: business.id.clone(),
            session_token: token::session_token(),
            ip_address: ip_address.map(str::to_string),
            user_agent: user_agent.map(str::to_string),
            device_type: info.device_type,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            last_accessed_at: None,
            is_active: true,
            revoked_at: None,
            revoke_reason: None,
            created_at: now,
        };
        self.db.sessions().insert(&session).await?;

        info!(business_id, session_id = %session.id, "Dashboard session created");
        Ok(session)
    }

    /// Validates a session token and records the access.
    pub async fn validate(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardSession> {
        let session = self
            .db
            .sessions()
            .get_by_token(session_token)
            .await?
            .ok_or(EngineError::SessionNotFound)?;

        if session.is_revoked() {
            return Err(EngineError::SessionRevoked {
                reason: session
                    .revoke_reason
                    .clone()
                    .unwrap_or_else(|| "revoked".to_string()),
            });
        }
        if !session.is_valid_at(now) {
            return Err(EngineError::InvalidCredential);
        }

        // The business can lapse while its sessions live on.
        self.active_business(&session.business_id)
            .await
            .map_err(|_| EngineError::InvalidCredential)?;

        self.db.sessions().touch(session_token, now).await?;
        Ok(session)
    }

    /// Revokes one session. Idempotent: revoking an already-revoked session
    /// is a no-op.
    pub async fn revoke(
        &self,
        session_token: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let revoked = self.db.sessions().revoke(session_token, reason, now).await?;
        if !revoked
            && self
                .db
                .sessions()
                .get_by_token(session_token)
                .await?
                .is_none()
        {
            return Err(EngineError::SessionNotFound);
        }
        info!(reason, "Dashboard session revoked");
        Ok(())
    }

    /// Revokes every live session of a business (e.g. on suspension).
    pub async fn revoke_all(
        &self,
        business_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<u64> {
        let revoked = self
            .db
            .sessions()
            .revoke_all_for_business(business_id, reason, now)
            .await?;
        info!(business_id, revoked, reason, "Revoked business sessions");
        Ok(revoked)
    }

    /// Pushes a live session's expiry out by the standard TTL.
    ///
    /// A revoked session cannot be extended; that path is refused with the
    /// revocation surfaced, and only [`reactivate`](Self::reactivate) undoes
    /// it.
    pub async fn extend(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardSession> {
        let new_expiry = now + Duration::days(SESSION_TTL_DAYS);
        if self.db.sessions().extend(session_token, new_expiry).await? {
            return self.reload(session_token).await;
        }

        // Diagnose the refusal.
        let session = self
            .db
            .sessions()
            .get_by_token(session_token)
            .await?
            .ok_or(EngineError::SessionNotFound)?;
        if session.is_revoked() {
            return Err(EngineError::SessionRevoked {
                reason: session
                    .revoke_reason
                    .unwrap_or_else(|| "revoked".to_string()),
            });
        }
        Err(EngineError::InvalidCredential)
    }

    /// Deliberately restores a revoked or deactivated session with a fresh
    /// expiry.
    pub async fn reactivate(
        &self,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<DashboardSession> {
        let new_expiry = now + Duration::days(SESSION_TTL_DAYS);
        if !self.db.sessions().reactivate(session_token, new_expiry).await? {
            return Err(EngineError::SessionNotFound);
        }
        info!("Dashboard session reactivated");
        self.reload(session_token).await
    }

    /// Lists a business's active sessions, newest first.
    pub async fn list_active(&self, business_id: &str) -> EngineResult<Vec<DashboardSession>> {
        Ok(self.db.sessions().list_active_for_business(business_id).await?)
    }

    /// Deactivates every session whose expiry has passed. Periodic hygiene;
    /// validation never trusts `is_active` alone.
    pub async fn deactivate_expired(&self, now: DateTime<Utc>) -> EngineResult<u64> {
        let deactivated = self.db.sessions().deactivate_expired(now).await?;
        if deactivated > 0 {
            info!(deactivated, "Deactivated expired sessions");
        }
        Ok(deactivated)
    }

    // =========================================================================
    // Bearer Tokens
    // =========================================================================

    /// Issues (or rotates) the business's long-lived dashboard bearer token.
    /// The previous token stops working immediately.
    pub async fn issue_bearer_token(
        &self,
        business_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<String> {
        let business = self.active_business(business_id).await?;
        let bearer = token::dashboard_token();
        self.db
            .businesses()
            .set_dashboard_token(&business.id, &bearer, now + Duration::days(SESSION_TTL_DAYS), now)
            .await?;
        info!(business_id, "Issued dashboard bearer token");
        Ok(bearer)
    }

    /// Validates a bearer token and records the access.
    pub async fn validate_bearer_token(
        &self,
        bearer: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Business> {
        let business = self
            .db
            .businesses()
            .get_by_dashboard_token(bearer)
            .await?
            .ok_or(EngineError::InvalidCredential)?;

        if !business.is_dashboard_token_valid_at(now) {
            return Err(EngineError::InvalidCredential);
        }

        self.db.businesses().touch_dashboard_access(&business.id, now).await?;
        Ok(business)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn active_business(&self, business_id: &str) -> EngineResult<Business> {
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
        Ok(business)
    }

    async fn reload(&self, session_token: &str) -> EngineResult<DashboardSession> {
        self.db
            .sessions()
            .get_by_token(session_token)
            .await?
            .ok_or(EngineError::SessionNotFound)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
