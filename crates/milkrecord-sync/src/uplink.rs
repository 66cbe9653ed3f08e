//! # Uplink
//!
//! The single push routine shared by the write path and the sync loop.
//!
//! ## Push Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  push(kind, record, action)                                             │
//! │                                                                         │
//! │  1. resolver.check_conflict(kind, id, version)                         │
//! │        read error ──────────────────────────────► Failed (logged)      │
//! │        remote ahead ──► mark conflict@version ──► Conflict (logged)    │
//! │                                                                         │
//! │  2. remote.upsert(kind, record)       (bounded by remote timeout)      │
//! │        error ───────────────────────────────────► Failed (logged)      │
//! │                                                                         │
//! │  3. mark synced@version ────────────────────────► Synced (logged)      │
//! │        version moved on meanwhile → row stays pending, next pass       │
//! │        pushes the newer version                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every attempt writes exactly one sync log entry. Status marks and log
//! writes are local best-effort: a failure there is logged and swallowed so
//! it never masks the remote outcome.
//!
//! On `Failed` the uplink leaves the status alone. The sync loop marks a
//! rejected record `failed` and leaves network failures `pending`; the
//! write path always leaves it `pending`.

use milkrecord_core::{RecordKind, StoredRecord, SyncAction, SyncAttempt, SyncStatus};
use milkrecord_db::{Database, RecordRepository, SyncLogRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::agent::SyncEventEmitter;
use crate::error::SyncError;
use crate::remote::{bounded, RemoteStore};
use crate::resolver::ConflictResolver;

/// What happened to one push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Remote accepted the record. `marked` is false when the local row
    /// changed version during the push and therefore stays pending.
    Synced { marked: bool },
    /// Remote copy was ahead; the record is now `conflict`.
    Conflict { local_version: i64, remote_version: i64 },
    /// Conflict check or upsert failed.
    Failed { error: String, retryable: bool },
}

impl PushOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, PushOutcome::Synced { .. })
    }
}

/// Pushes records to the remote store and records the outcome locally.
#[derive(Clone)]
pub struct Uplink {
    records: RecordRepository,
    sync_log: SyncLogRepository,
    remote: Arc<dyn RemoteStore>,
    resolver: ConflictResolver,
    device_id: String,
    remote_timeout: Duration,
    events: Arc<dyn SyncEventEmitter>,
}

impl Uplink {
    pub fn new(
        db: &Database,
        remote: Arc<dyn RemoteStore>,
        device_id: impl Into<String>,
        remote_timeout: Duration,
        events: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        Uplink {
            records: db.records(),
            sync_log: db.sync_log(),
            resolver: ConflictResolver::new(remote.clone(), remote_timeout),
            remote,
            device_id: device_id.into(),
            remote_timeout,
            events,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Pushes one record at its current version.
    pub async fn push(&self, kind: RecordKind, record: &StoredRecord, action: SyncAction) -> PushOutcome {
        let check = self
            .resolver
            .check_conflict(kind, &record.id, record.version)
            .await;

        let conflict = match check {
            Ok(conflict) => conflict,
            Err(e) => return self.failed(kind, record, action, e).await,
        };

        if conflict.has_conflict {
            let remote_version = conflict.remote_version.unwrap_or_default();
            return self.conflicted(kind, record, action, remote_version).await;
        }

        if let Err(e) = bounded(self.remote_timeout, self.remote.upsert(kind, record)).await {
            return self.failed(kind, record, action, e).await;
        }

        let marked = match self.records.mark_synced(kind, &record.id, record.version).await {
            Ok(marked) => marked,
            Err(e) => {
                warn!(kind = %kind, id = %record.id, error = %e, "Failed to mark record synced");
                false
            }
        };

        if !marked {
            debug!(
                kind = %kind,
                id = %record.id,
                version = record.version,
                "Record changed during push, leaving it pending"
            );
        }

        self.log(SyncAttempt::success(
            &self.device_id,
            kind,
            &record.id,
            action,
            record.version,
        ))
        .await;

        PushOutcome::Synced { marked }
    }

    async fn conflicted(
        &self,
        kind: RecordKind,
        record: &StoredRecord,
        action: SyncAction,
        remote_version: i64,
    ) -> PushOutcome {
        info!(
            kind = %kind,
            id = %record.id,
            local_version = record.version,
            remote_version,
            "Remote copy is ahead, parking record as conflict"
        );

        if let Err(e) = self
            .records
            .mark_status(kind, &record.id, record.version, SyncStatus::Conflict)
            .await
        {
            warn!(kind = %kind, id = %record.id, error = %e, "Failed to mark record conflict");
        }

        self.log(SyncAttempt::conflict(
            &self.device_id,
            kind,
            &record.id,
            action,
            record.version,
            remote_version,
        ))
        .await;

        self.events
            .emit_conflict(kind, &record.id, record.version, remote_version);

        PushOutcome::Conflict {
            local_version: record.version,
            remote_version,
        }
    }

    async fn failed(
        &self,
        kind: RecordKind,
        record: &StoredRecord,
        action: SyncAction,
        error: SyncError,
    ) -> PushOutcome {
        let retryable = error.is_retryable();
        let message = error.to_string();

        warn!(kind = %kind, id = %record.id, error = %message, retryable, "Push failed");

        self.log(SyncAttempt::failed(
            &self.device_id,
            kind,
            &record.id,
            action,
            record.version,
            message.clone(),
        ))
        .await;

        self.events.emit_error(Some(kind), Some(&record.id), &message, retryable);

        PushOutcome::Failed {
            error: message,
            retryable,
        }
    }

    async fn log(&self, attempt: SyncAttempt) {
        if let Err(e) = self.sync_log.append(&attempt).await {
            warn!(
                kind = %attempt.kind,
                id = %attempt.record_id,
                error = %e,
                "Failed to write sync log entry"
            );
        }
    }
}

impl std::fmt::Debug for Uplink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uplink")
            .field("device_id", &self.device_id)
            .field("remote", &self.remote.name())
            .field("remote_timeout", &self.remote_timeout)
            .finish()
    }
}
