//! # Business Model Resolver
//!
//! Resolves the commercial terms that apply to one business at one moment.
//!
//! ## Resolution Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    BusinessModelResolver                                │
//! │                                                                         │
//! │  1. Load global settings (lazily created with hard defaults when        │
//! │     the singleton row is missing — self-healing, never an error)        │
//! │                                                                         │
//! │  2. allow_business_override?                                            │
//! │        yes → load the business's override row (zero-or-one)             │
//! │        no  → ignore overrides entirely, even if a row exists            │
//! │                                                                         │
//! │  3. EffectiveModel::merge(overrides, global)                            │
//! │        field-by-field: override → global → hard default                 │
//! │                                                                         │
//! │  Resolution is re-done per call. Terms are NEVER cached across calls:   │
//! │  an admin edit must be visible to the very next scan.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use qrtrack_core::model::EffectiveModel;
use qrtrack_core::validation::validate_overrides;
use qrtrack_core::{BusinessModelOverrides, GlobalSettings};
use qrtrack_db::Database;

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Resolver
// =============================================================================

/// Resolves effective commercial terms and manages the configuration they
/// come from.
pub struct BusinessModelResolver {
    /// Database connection.
    db: Arc<Database>,
}

impl BusinessModelResolver {
    /// Creates a new resolver.
    pub fn new(db: Arc<Database>) -> Self {
        BusinessModelResolver { db }
    }

    /// Returns the fully-resolved terms for a business at `now`.
    ///
    /// The business is not required to exist: a missing override row simply
    /// resolves to global terms. Callers that need existence checks do them
    /// separately.
    pub async fn effective_model(
        &self,
        business_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<EffectiveModel> {
        let global = self.db.settings().get_or_create(now).await?;

        let overrides = if global.allow_business_override {
            self.db.businesses().model_overrides(business_id).await?
        } else {
            // A kill switch: existing override rows are kept but ignored.
            None
        };

        let model = EffectiveModel::merge(overrides.as_ref(), &global);
        debug!(
            business_id,
            discount_value = model.discount_value,
            commission_rate = model.commission_rate,
            overridden = overrides.is_some(),
            "Resolved effective model"
        );
        Ok(model)
    }

    /// Returns the global settings row, creating it when missing.
    pub async fn global_settings(&self, now: DateTime<Utc>) -> EngineResult<GlobalSettings> {
        Ok(self.db.settings().get_or_create(now).await?)
    }

    /// Replaces the global settings row.
    pub async fn update_global_settings(&self, settings: &GlobalSettings) -> EngineResult<()> {
        info!("Updating global settings");
        self.db.settings().update(settings).await?;
        Ok(())
    }

    /// Validates and persists override terms for a business.
    ///
    /// Refused when the business does not exist or when global settings have
    /// disabled per-business overrides.
    pub async fn configure_overrides(
        &self,
        overrides: &BusinessModelOverrides,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        let business = self
            .db
            .businesses()
            .get_by_id(&overrides.business_id)
            .await?
            .ok_or_else(|| EngineError::BusinessNotFound {
                business_id: overrides.business_id.clone(),
            })?;

        let global = self.db.settings().get_or_create(now).await?;
        if !global.allow_business_override {
            return Err(EngineError::OverridesDisabled);
        }

        validate_overrides(overrides).map_err(qrtrack_core::error::CoreError::from)?;

        self.db.businesses().upsert_model_overrides(overrides).await?;
        info!(business_id = %business.id, "Configured business model overrides");
        Ok(())
    }

    /// Removes a business's override row; subsequent resolutions fall back
    /// to global terms.
    ///
    /// ## Returns
    /// `true` when a row existed and was removed.
    pub async fn clear_overrides(&self, business_id: &str) -> EngineResult<bool> {
        let removed = self.db.businesses().delete_model_overrides(business_id).await?;
        if removed {
            info!(business_id, "Cleared business model overrides");
        }
        Ok(removed)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
