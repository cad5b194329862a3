//! # qrtrack-core: Pure Business Logic for QR Commission Tracking
//!
//! This crate is the **heart** of qrtrack. It contains all tracking and
//! commission logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         qrtrack Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  qrtrack-engine (Operations)                    │   │
//! │  │   QrCodeRegistry ──► ScanProcessor ──► CommissionLedger         │   │
//! │  │   BusinessModelResolver      DashboardSessionManager            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ qrtrack-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   codec   │  │   calc    │  │   │
//! │  │   │  QrCode   │  │   Money   │  │ Tracking  │  │ discount  │  │   │
//! │  │   │Commission │  │  apply_bps│  │  Record   │  │commission │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                 │   │
//! │  │   │   model   │  │  device   │  │    geo    │                 │   │
//! │  │   │ Effective │  │ UA parse  │  │ haversine │                 │   │
//! │  │   │   merge   │  │           │  │  matching │                 │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                 │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   qrtrack-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Business, QrCode, CustomerScan, Commission, ...)
//! - [`money`] - Money type with integer-cent arithmetic (no floating point!)
//! - [`codec`] - Tracking token encode/decode and integrity hashing
//! - [`model`] - Effective-model resolution (overrides → global → defaults)
//! - [`calc`] - Discount and commission calculation
//! - [`device`] - User-agent classification
//! - [`geo`] - Haversine distance and location matching
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, clock and randomness live in other crates
//! 3. **Integer Money**: All monetary values are cents (i64); rates are basis points
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use qrtrack_core::calc;
//! use qrtrack_core::model::EffectiveModel;
//! use qrtrack_core::money::Money;
//! use qrtrack_core::types::{CommissionType, DiscountType};
//!
//! let mut model = EffectiveModel::default();
//! model.discount_type = DiscountType::Percentage;
//! model.discount_value = 1_000; // 10%
//! model.commission_type = CommissionType::Percentage;
//! model.commission_rate = 800; // 8%
//!
//! let s = calc::settle(&model, Money::from_cents(20_000)); // 200.00 booking
//! assert_eq!(s.discount_amount.cents(), 2_000);   // 20.00 off
//! assert_eq!(s.commission_amount.cents(), 1_440); // 8% of 180.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod calc;
pub mod codec;
pub mod device;
pub mod error;
pub mod geo;
pub mod model;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use qrtrack_core::Money` instead of
// `use qrtrack_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use model::EffectiveModel;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Length of the public-facing QR short code.
///
/// ## Why 8?
/// 8 characters over a 32-symbol alphabet give ~1.1e12 combinations, enough
/// headroom that the issue-time uniqueness retry loop essentially never
/// exhausts its attempts at realistic volumes.
pub const SHORT_CODE_LEN: usize = 8;

/// Customer tracking sessions last 30 days from the first scan.
///
/// ## Business Reason
/// A customer who scans in-store often books days or weeks later; 30 days is
/// the attribution window the commission terms are sold on.
pub const CUSTOMER_SESSION_DAYS: i64 = 30;

/// Upper bound on short-code regeneration attempts when an issue collides
/// with an existing code.
pub const SHORT_CODE_MAX_ATTEMPTS: u32 = 5;
