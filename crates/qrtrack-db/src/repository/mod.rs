//! # Repository Module
//!
//! Database repository implementations for qrtrack.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine component                                                      │
//! │       │                                                                 │
//! │       │  db.qr_codes().get_by_short_code("A3F8K2QX")                   │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  QrCodeRepository                                                      │
//! │  ├── insert(&self, qr)                                                 │
//! │  ├── get_by_short_code(&self, code)                                    │
//! │  ├── record_scan(&self, id, unique, now)   ← atomic counter update     │
//! │  └── sweep_expired(&self, now)                                         │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Counter updates are storage-side, no read-modify-write races        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`settings::SettingsRepository`] - Global settings singleton
//! - [`business::BusinessRepository`] - Businesses, locations, model overrides
//! - [`qr_code::QrCodeRepository`] - QR code CRUD and counters
//! - [`scan::ScanRepository`] - Scan events and session lookups
//! - [`commission::CommissionRepository`] - Commission ledger rows
//! - [`session::SessionRepository`] - Dashboard sessions

pub mod business;
pub mod commission;
pub mod qr_code;
pub mod scan;
pub mod session;
pub mod settings;
