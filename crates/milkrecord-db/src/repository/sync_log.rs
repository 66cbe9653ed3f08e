//! # Sync Log Repository
//!
//! Append-only audit trail of push attempts. Never synced itself; only
//! pruned by an operator.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::timestamp;
use milkrecord_core::{RecordKind, SyncAttempt, SyncLogEntry};

const LOG_COLUMNS: &str = "id, device_id, table_name, record_id, action, status, \
     error_message, local_version, remote_version, created_at";

/// Repository for sync log operations.
#[derive(Debug, Clone)]
pub struct SyncLogRepository {
    pool: SqlitePool,
}

impl SyncLogRepository {
    /// Creates a new SyncLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncLogRepository { pool }
    }

    /// Appends one attempt.
    ///
    /// ## Returns
    /// The new entry's row id.
    pub async fn append(&self, attempt: &SyncAttempt) -> DbResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_log (
                device_id, table_name, record_id, action, status,
                error_message, local_version, remote_version, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&attempt.device_id)
        .bind(attempt.kind)
        .bind(&attempt.record_id)
        .bind(attempt.action)
        .bind(attempt.status)
        .bind(&attempt.error_message)
        .bind(attempt.local_version)
        .bind(attempt.remote_version)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(
            kind = %attempt.kind,
            record_id = %attempt.record_id,
            action = attempt.action.as_str(),
            status = attempt.status.as_str(),
            "Sync attempt logged"
        );

        Ok(result.last_insert_rowid())
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<SyncLogEntry>> {
        let sql = format!("SELECT {LOG_COLUMNS} FROM sync_log ORDER BY id DESC LIMIT ?1");

        let entries = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Every entry for one record, oldest first.
    pub async fn for_record(&self, kind: RecordKind, record_id: &str) -> DbResult<Vec<SyncLogEntry>> {
        let sql = format!(
            "SELECT {LOG_COLUMNS} FROM sync_log \
             WHERE table_name = ?1 AND record_id = ?2 ORDER BY id ASC"
        );

        let entries = sqlx::query_as(&sql)
            .bind(kind)
            .bind(record_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Total number of entries.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Deletes entries created before `cutoff`.
    ///
    /// ## Returns
    /// Number of deleted entries.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sync_log WHERE created_at < ?1")
            .bind(timestamp(cutoff))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
