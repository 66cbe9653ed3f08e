//! # milkrecord-db: Local Record Store
//!
//! This crate is the durable half of the offline-first engine. Every write
//! lands here first; the sync engine only reads back what this crate says is
//! still unsynced.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MilkRecord Sync Data Flow                          │
//! │                                                                         │
//! │  RecordWriter::save / SyncWorker::run_pass                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  milkrecord-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ RecordRepo    │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SyncLogRepo   │    │ 001_sync_    │  │   │
//! │  │   │               │    │ DeviceRepo    │    │   core.sql   │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/pos/milkrecord.db                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Records, sync log, device identity
//!
//! ## Usage
//!
//! ```rust,ignore
//! use milkrecord_db::{Database, DbConfig};
//! use milkrecord_core::RecordKind;
//!
//! let db = Database::new(DbConfig::new("milkrecord.db")).await?;
//!
//! let pending = db.records().list_pending(RecordKind::Sales, 100).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig, StoreLocation};

// Repository re-exports for convenience
pub use repository::device::{DeviceRecord, DeviceRepository};
pub use repository::record::RecordRepository;
pub use repository::sync_log::SyncLogRepository;
