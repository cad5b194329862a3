//! # qrtrack-db: Database Layer for QR Commission Tracking
//!
//! This crate provides database access for qrtrack.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        qrtrack Data Flow                                │
//! │                                                                         │
//! │  Engine operation (process_scan, approve_commission, ...)               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    qrtrack-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ QrCodeRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ ScanRepo      │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │    │ CommissionRepo│    │ ...          │  │   │
//! │  │   │ Management    │    │ SessionRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qrtrack_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/qrtrack.db");
//! let db = Database::new(config).await?;
//!
//! let qr = db.qr_codes().get_by_short_code("A3F8K2QX").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

#[cfg(test)]
mod testutil;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::business::BusinessRepository;
pub use repository::commission::{CommissionRepository, CommissionTotals};
pub use repository::qr_code::{QrCodeRepository, UsageRecount};
pub use repository::scan::ScanRepository;
pub use repository::session::SessionRepository;
pub use repository::settings::SettingsRepository;
