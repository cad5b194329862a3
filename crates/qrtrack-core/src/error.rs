//! # Error Types
//!
//! Domain-specific error types for qrtrack-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  qrtrack-core errors (this file)                                        │
//! │  ├── CoreError        - Domain/state-machine guard failures             │
//! │  ├── ValidationError  - Input validation failures                       │
//! │  └── DecodeError      - Tracking token decode failures (codec module)   │
//! │                                                                         │
//! │  qrtrack-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  qrtrack-engine errors (separate crate)                                 │
//! │  └── EngineError      - Wraps all of the above + pipeline rejections    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (id, state names)
//! 3. Errors are enum variants, never String
//! 4. Nothing here is process-fatal; every failure is scoped to one call

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business-rule violations or state-machine guard failures.
/// They are surfaced to the immediate caller and never retried automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A state-machine transition was requested that the current state does
    /// not allow (QR codes, commissions, sessions).
    #[error("Invalid transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    /// A second commission was opened for a scan that already has one.
    #[error("Commission already exists for scan {scan_id}")]
    DuplicateCommission { scan_id: String },

    /// The business has issued its monthly QR quota.
    #[error("Business {business_id} reached its monthly QR quota of {quota}")]
    QuotaExceeded { business_id: String, quota: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation of commercial-term overrides before they reach
/// the storage layer.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },

    /// Invalid format (e.g., malformed email, bad coordinates).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat {
        field: &'static str,
        reason: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
