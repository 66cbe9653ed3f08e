//! # Record Repository
//!
//! Versioned records with a sync status, one row per `(record_type, id)`.
//!
//! ## Version Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   ONE STATEMENT PER TRANSITION                          │
//! │                                                                         │
//! │  upsert (new id)       INSERT ... version = 1, status = pending        │
//! │  upsert (existing id)  ON CONFLICT DO UPDATE                           │
//! │                          version = version + 1                          │
//! │                          status  = pending                              │
//! │                          created_at, device_id untouched                │
//! │                                                                         │
//! │  mark_synced(v)        UPDATE ... WHERE version = v                    │
//! │  mark_status(v, s)     UPDATE ... WHERE version = v                    │
//! │                                                                         │
//! │  A save that lands between "push v" and "mark v synced" bumps the row  │
//! │  to v+1, so the mark matches zero rows and the record stays pending.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::DbResult;
use crate::repository::timestamp;
use milkrecord_core::{Record, RecordKind, StoredRecord, SyncStatus};

const RECORD_COLUMNS: &str =
    "id, device_id, payload, version, sync_status, created_at, updated_at";

/// Raw `sync_records` row. The payload column is JSON text.
#[derive(Debug, FromRow)]
struct RecordRow {
    id: String,
    device_id: String,
    payload: String,
    version: i64,
    sync_status: SyncStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RecordRow> for StoredRecord {
    type Error = crate::error::DbError;

    fn try_from(row: RecordRow) -> Result<Self, Self::Error> {
        Ok(Record {
            id: row.id,
            device_id: row.device_id,
            payload: serde_json::from_str(&row.payload)?,
            version: row.version,
            sync_status: row.sync_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for versioned record operations.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

impl RecordRepository {
    /// Creates a new RecordRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecordRepository { pool }
    }

    /// Gets a record by kind and id.
    pub async fn get(&self, kind: RecordKind, id: &str) -> DbResult<Option<StoredRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM sync_records WHERE record_type = ?1 AND id = ?2"
        );

        let row: Option<RecordRow> = sqlx::query_as(&sql)
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(StoredRecord::try_from).transpose()
    }

    /// Inserts or updates a record in a single statement.
    ///
    /// ## Behavior
    /// - New id: `version = 1`, `created_at = updated_at = now`
    /// - Existing id: `version + 1`, `updated_at = now`, payload replaced,
    ///   `created_at` and `device_id` preserved
    /// - Either way the record comes back `pending`
    ///
    /// ## Returns
    /// The row as stored, read back through `RETURNING`.
    pub async fn upsert(
        &self,
        kind: RecordKind,
        id: &str,
        device_id: &str,
        payload: &serde_json::Value,
    ) -> DbResult<StoredRecord> {
        let now = timestamp(Utc::now());
        let payload = serde_json::to_string(payload)?;

        let sql = format!(
            r#"
            INSERT INTO sync_records (
                record_type, id, device_id, payload,
                version, sync_status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 1, 'pending', ?5, ?5)
            ON CONFLICT (record_type, id) DO UPDATE SET
                payload = excluded.payload,
                version = sync_records.version + 1,
                sync_status = 'pending',
                updated_at = excluded.updated_at
            RETURNING {RECORD_COLUMNS}
            "#
        );

        let row: RecordRow = sqlx::query_as(&sql)
            .bind(kind)
            .bind(id)
            .bind(device_id)
            .bind(payload)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        debug!(
            kind = %kind,
            record_id = %id,
            version = row.version,
            "Record saved locally"
        );

        StoredRecord::try_from(row)
    }

    /// Gets records the sync loop still has to push.
    ///
    /// ## Returns
    /// Up to `limit` records with status `pending` or `failed`, oldest
    /// `created_at` first, id as tiebreak. `conflict` records are excluded.
    pub async fn list_pending(&self, kind: RecordKind, limit: u32) -> DbResult<Vec<StoredRecord>> {
        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM sync_records
            WHERE record_type = ?1
              AND sync_status IN ('pending', 'failed')
            ORDER BY created_at ASC, id ASC
            LIMIT ?2
            "#
        );

        let rows: Vec<RecordRow> = sqlx::query_as(&sql)
            .bind(kind)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(StoredRecord::try_from).collect()
    }

    /// Marks a record synced, only if it is still at `version`.
    ///
    /// ## Returns
    /// `false` when the record moved on (a newer local save) or is gone.
    pub async fn mark_synced(&self, kind: RecordKind, id: &str, version: i64) -> DbResult<bool> {
        self.mark_status(kind, id, version, SyncStatus::Synced).await
    }

    /// Sets the sync status, only if the record is still at `version`.
    pub async fn mark_status(
        &self,
        kind: RecordKind,
        id: &str,
        version: i64,
        status: SyncStatus,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sync_records SET sync_status = ?4
            WHERE record_type = ?1 AND id = ?2 AND version = ?3
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(version)
        .bind(status)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if !updated {
            debug!(
                kind = %kind,
                record_id = %id,
                version,
                status = %status,
                "Status not updated, record moved past this version"
            );
        }

        Ok(updated)
    }

    /// Counts records in `status`, per kind. Every kind is present.
    pub async fn count_by_status(&self, status: SyncStatus) -> DbResult<BTreeMap<RecordKind, i64>> {
        let rows: Vec<(RecordKind, i64)> = sqlx::query_as(
            r#"
            SELECT record_type, COUNT(*)
            FROM sync_records
            WHERE sync_status = ?1
            GROUP BY record_type
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(with_all_kinds(rows))
    }

    /// Counts records still queued for push (`pending` + `failed`), per kind.
    pub async fn count_unsynced(&self) -> DbResult<BTreeMap<RecordKind, i64>> {
        let rows: Vec<(RecordKind, i64)> = sqlx::query_as(
            r#"
            SELECT record_type, COUNT(*)
            FROM sync_records
            WHERE sync_status IN ('pending', 'failed')
            GROUP BY record_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(with_all_kinds(rows))
    }

    /// Moves records from `from` back to `pending`.
    ///
    /// Version is left alone: if the remote copy is still ahead, the next
    /// pass flags the conflict again.
    ///
    /// ## Arguments
    /// * `kind` - Restrict to one table, or `None` for all
    ///
    /// ## Returns
    /// Number of records reset.
    pub async fn reset_status(&self, kind: Option<RecordKind>, from: SyncStatus) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sync_records SET sync_status = 'pending', updated_at = ?3
            WHERE sync_status = ?1
              AND (?2 IS NULL OR record_type = ?2)
            "#,
        )
        .bind(from)
        .bind(kind)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn with_all_kinds(rows: Vec<(RecordKind, i64)>) -> BTreeMap<RecordKind, i64> {
    let mut counts: BTreeMap<RecordKind, i64> =
        RecordKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
    counts.extend(rows);
    counts
}

// =============================================================================
// Unit Tests
// =============================================================================
