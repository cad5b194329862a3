//! # qrtrack-engine
//!
//! The operational layer of qrtrack: everything stateful between the pure
//! domain logic (qrtrack-core) and the SQLite repositories (qrtrack-db).
//!
//! ## Component Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          qrtrack-engine                                 │
//! │                                                                         │
//! │   ┌──────────────────┐      ┌──────────────────┐                        │
//! │   │ QrCodeRegistry   │      │ ScanProcessor    │                        │
//! │   │ issue / verify / │◄─────│ validity, session│                        │
//! │   │ validity, status │      │ ladder, device,  │                        │
//! │   └────────┬─────────┘      │ geo, fraud score │                        │
//! │            │                └────────┬─────────┘                        │
//! │            ▼                         │  AffiliateContext (SCAN- token)  │
//! │   ┌──────────────────┐               ▼                                  │
//! │   │ BusinessModel    │      ┌──────────────────┐                        │
//! │   │ Resolver         │◄─────│ CommissionLedger │                        │
//! │   │ override→global→ │      │ open, approve,   │                        │
//! │   │ hard defaults    │      │ pay, disputes    │                        │
//! │   └──────────────────┘      └──────────────────┘                        │
//! │                                                                         │
//! │   ┌──────────────────┐      ┌──────────────────┐                        │
//! │   │ DashboardSession │      │ token            │                        │
//! │   │ Manager          │      │ short codes,     │                        │
//! │   │ SESSION- / AFF-  │      │ SCAN-/SESSION-/  │                        │
//! │   │ credentials      │      │ AFF- generation  │                        │
//! │   └──────────────────┘      └──────────────────┘                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every component holds an `Arc<Database>`; none of them cache resolved
//! commercial terms across calls.
//!
//! ## Usage
//! ```no_run
//! use std::sync::Arc;
//! use qrtrack_db::{Database, DbConfig};
//! use qrtrack_engine::{QrCodeRegistry, IssueQrRequest, ScanProcessor, ScanRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Arc::new(Database::new(DbConfig::new("qrtrack.db")).await?);
//!
//! let registry = QrCodeRegistry::new(db.clone());
//! let qr = registry
//!     .issue(
//!         &IssueQrRequest {
//!             business_id: "biz-1".into(),
//!             location_id: None,
//!             base_url: "https://track.example".into(),
//!             valid_from: None,
//!             valid_until: None,
//!             usage_limit: None,
//!             daily_limit: None,
//!             monthly_limit: None,
//!         },
//!         chrono::Utc::now(),
//!     )
//!     .await?;
//!
//! let scanner = ScanProcessor::new(db);
//! let context = scanner
//!     .process(
//!         &ScanRequest {
//!             short_code: Some(qr.short_code),
//!             ..Default::default()
//!         },
//!         chrono::Utc::now(),
//!     )
//!     .await?;
//! println!("scan token: {}", context.scan_token);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod registry;
pub mod resolver;
pub mod scanner;
pub mod sessions;
pub mod token;

#[cfg(test)]
mod testutil;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{EngineError, EngineResult, QrRejection};
pub use ledger::{BookingReport, CommissionLedger, PayoutStatus};
pub use registry::{IssueQrRequest, QrCodeRegistry};
pub use resolver::BusinessModelResolver;
pub use scanner::{AffiliateContext, ScanProcessor, ScanRequest};
pub use sessions::DashboardSessionManager;
