//! # Repository Module
//!
//! Database repository implementations for the local record store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Write path / sync worker                                              │
//! │       │                                                                 │
//! │       │  db.records().upsert(kind, id, device_id, &payload)            │
//! │       ▼                                                                 │
//! │  RecordRepository                                                      │
//! │  ├── get / upsert                                                      │
//! │  ├── list_pending                                                      │
//! │  ├── mark_synced / mark_status   (conditioned on version)              │
//! │  └── count_by_status / reset_status                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`RecordRepository`](record::RecordRepository) - Versioned records and sync status
//! - [`SyncLogRepository`](sync_log::SyncLogRepository) - Append-only sync audit log
//! - [`DeviceRepository`](device::DeviceRepository) - Installation identity

pub mod device;
pub mod record;
pub mod sync_log;

use chrono::{DateTime, SecondsFormat, Utc};

/// Canonical timestamp text for every TEXT timestamp column.
///
/// Fixed-width microseconds with a `Z` suffix, so lexical order in SQL is
/// chronological order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
