//! # Record Writer
//!
//! The write path. Local first, network second.
//!
//! ## Save Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          RecordWriter::save                             │
//! │                                                                         │
//! │  1. validate payload ──── invalid ──► SaveResult { success: false }    │
//! │  2. id = given or UUID v7                                              │
//! │  3. local upsert (one statement) ─── error ──► success: false,         │
//! │        │                                      nothing logged           │
//! │        │  ◄── durability boundary: success is decided here             │
//! │        ▼                                                                │
//! │  4. push_on_write && probe online?                                     │
//! │        no  ──► "Saved locally"                                         │
//! │        yes ──► uplink.push (≤ push_timeout)                            │
//! │                  synced   ──► "Saved and synced to cloud"              │
//! │                  failed   ──► "Saved locally", record stays pending    │
//! │                  conflict ──► "Saved locally", record is conflict      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use milkrecord_core::{
    validate_json, Payload, RecordKind, SaveResult, StoredRecord, SyncAction, SyncAttempt,
    Validate,
};
use milkrecord_db::{Database, RecordRepository, SyncLogRepository};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityProbe;
use crate::uplink::{PushOutcome, Uplink};

/// Saves records locally and pushes them when the network allows.
#[derive(Clone)]
pub struct RecordWriter {
    records: RecordRepository,
    sync_log: SyncLogRepository,
    probe: Arc<dyn ConnectivityProbe>,
    uplink: Uplink,
    push_on_write: bool,
    push_timeout: Duration,
}

impl RecordWriter {
    pub fn new(
        db: &Database,
        probe: Arc<dyn ConnectivityProbe>,
        uplink: Uplink,
        push_on_write: bool,
        push_timeout: Duration,
    ) -> Self {
        RecordWriter {
            records: db.records(),
            sync_log: db.sync_log(),
            probe,
            uplink,
            push_on_write,
            push_timeout,
        }
    }

    pub fn device_id(&self) -> &str {
        self.uplink.device_id()
    }

    /// Saves a typed payload.
    ///
    /// `id = None` creates a new record; `Some(id)` creates or mutates the
    /// record with that id. `success` reflects the local write only.
    pub async fn save<P: Payload>(&self, id: Option<String>, payload: P) -> SaveResult<P> {
        if let Err(e) = payload.validate() {
            debug!(kind = %P::KIND, error = %e, "Rejected invalid payload");
            return SaveResult::failed(e);
        }

        let value = match serde_json::to_value(&payload) {
            Ok(value) => value,
            Err(e) => return SaveResult::failed(e),
        };

        match self.persist_and_push(P::KIND, id, &value).await {
            Ok((stored, synced)) => SaveResult::saved(stored.map_payload(|_| payload), synced),
            Err(reason) => SaveResult::failed(reason),
        }
    }

    /// Saves an untyped payload for `kind`.
    ///
    /// An `"id"` field, if present, selects the record; it is not stored as
    /// part of the payload. The rest must decode into the kind's payload type.
    pub async fn save_json(&self, kind: RecordKind, mut payload: Value) -> SaveResult<Value> {
        let id = match payload.as_object_mut().and_then(|fields| fields.remove("id")) {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => return SaveResult::failed(format!("Invalid record id: {}", other)),
        };

        if let Err(e) = validate_json(kind, &payload) {
            debug!(kind = %kind, error = %e, "Rejected invalid payload");
            return SaveResult::failed(e);
        }

        match self.persist_and_push(kind, id, &payload).await {
            Ok((stored, synced)) => SaveResult::saved(stored, synced),
            Err(reason) => SaveResult::failed(reason),
        }
    }

    /// Steps 2-4. `Err` only for a local storage failure.
    async fn persist_and_push(
        &self,
        kind: RecordKind,
        id: Option<String>,
        payload: &Value,
    ) -> Result<(StoredRecord, bool), milkrecord_db::DbError> {
        let id = id.unwrap_or_else(milkrecord_core::new_record_id);

        let stored = match self
            .records
            .upsert(kind, &id, self.uplink.device_id(), payload)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(kind = %kind, record_id = %id, error = %e, "Local save failed");
                return Err(e);
            }
        };

        info!(kind = %kind, record_id = %id, version = stored.version, "Saved locally");

        let synced = self.push_on_write(kind, &stored).await;
        let stored = if synced {
            milkrecord_core::Record {
                sync_status: milkrecord_core::SyncStatus::Synced,
                ..stored
            }
        } else {
            stored
        };

        Ok((stored, synced))
    }

    /// Best-effort push. Never fails the save.
    async fn push_on_write(&self, kind: RecordKind, stored: &StoredRecord) -> bool {
        if !self.push_on_write || !self.probe.internet_available().await {
            return false;
        }

        let action = if stored.version == 1 {
            SyncAction::Insert
        } else {
            SyncAction::Update
        };

        match tokio::time::timeout(self.push_timeout, self.uplink.push(kind, stored, action)).await {
            Ok(PushOutcome::Synced { marked }) => marked,
            Ok(_) => false,
            Err(_) => {
                let message = format!(
                    "Push timed out after {} seconds",
                    self.push_timeout.as_secs()
                );
                warn!(kind = %kind, record_id = %stored.id, "{}", message);

                let attempt = SyncAttempt::failed(
                    self.uplink.device_id(),
                    kind,
                    &stored.id,
                    action,
                    stored.version,
                    message,
                );
                if let Err(e) = self.sync_log.append(&attempt).await {
                    warn!(error = %e, "Failed to write sync log entry");
                }
                false
            }
        }
    }
}

impl std::fmt::Debug for RecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordWriter")
            .field("uplink", &self.uplink)
            .field("push_on_write", &self.push_on_write)
            .field("push_timeout", &self.push_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::NoOpEmitter;
    use crate::connectivity::StaticProbe;
    use crate::remote::MemoryRemoteStore;
    use milkrecord_core::{Money, Product, SyncLogStatus, SyncStatus};
    use milkrecord_db::DbConfig;
    use serde_json::json;

    struct Fixture {
        db: Database,
        remote: Arc<MemoryRemoteStore>,
        probe: Arc<StaticProbe>,
        writer: RecordWriter,
    }

    async fn fixture(online: bool) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(if online {
            StaticProbe::online()
        } else {
            StaticProbe::offline()
        });
        let uplink = Uplink::new(
            &db,
            remote.clone(),
            "device-a",
            Duration::from_secs(1),
            Arc::new(NoOpEmitter),
        );
        let writer = RecordWriter::new(&db, probe.clone(), uplink, true, Duration::from_secs(2));

        Fixture {
            db,
            remote,
            probe,
            writer,
        }
    }

    fn paneer() -> Product {
        Product {
            name: "Paneer".into(),
            category: "dairy".into(),
            unit: "kg".into(),
            price_paise: Money::from_rupees_paise(400, 0).paise(),
            emoji: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_offline_save_is_pending_and_unlogged() {
        let fx = fixture(false).await;

        let result = fx.writer.save(None, paneer()).await;
        assert!(result.success);
        assert!(!result.synced);
        assert_eq!(result.message, "Saved locally");

        let record = result.stored_record.unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.device_id, "device-a");
        assert_eq!(record.payload.name, "Paneer");

        assert_eq!(fx.db.sync_log().count().await.unwrap(), 0);
        assert!(fx.remote.is_empty());
    }

    #[tokio::test]
    async fn test_second_save_bumps_version() {
        let fx = fixture(false).await;

        let first = fx.writer.save(None, paneer()).await;
        let id = first.id().unwrap().to_string();

        let mut updated = paneer();
        updated.price_paise = 42_000;
        let second = fx.writer.save(Some(id.clone()), updated).await;

        let record = second.stored_record.unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.version, 2);
        assert_eq!(record.payload.price_paise, 42_000);
    }

    #[tokio::test]
    async fn test_online_save_pushes_with_insert_action() {
        let fx = fixture(true).await;

        let result = fx.writer.save(None, paneer()).await;
        assert!(result.synced);
        assert_eq!(result.message, "Saved and synced to cloud");
        let id = result.id().unwrap().to_string();

        let local = fx.db.records().get(RecordKind::Products, &id).await.unwrap().unwrap();
        assert_eq!(local.sync_status, SyncStatus::Synced);

        let log = fx.db.sync_log().for_record(RecordKind::Products, &id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, SyncAction::Insert);
        assert_eq!(log[0].status, SyncLogStatus::Success);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_record_pending() {
        let fx = fixture(true).await;
        fx.remote.fail_upserts(true);

        let result = fx.writer.save(None, paneer()).await;
        assert!(result.success);
        assert!(!result.synced);
        let id = result.id().unwrap().to_string();

        let local = fx.db.records().get(RecordKind::Products, &id).await.unwrap().unwrap();
        assert_eq!(local.sync_status, SyncStatus::Pending);

        let log = fx.db.sync_log().recent(5).await.unwrap();
        assert_eq!(log[0].status, SyncLogStatus::Failed);
    }

    #[tokio::test]
    async fn test_invalid_payload_writes_nothing() {
        let fx = fixture(true).await;

        let mut bad = paneer();
        bad.name = "  ".into();
        let result = fx.writer.save(None, bad).await;

        assert!(!result.success);
        assert!(result.message.starts_with("Failed to save locally:"));
        let counts = fx.db.records().count_unsynced().await.unwrap();
        assert_eq!(counts.values().sum::<i64>(), 0);
        assert_eq!(fx.probe.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_push_on_write_disabled_skips_probe() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let probe = Arc::new(StaticProbe::online());
        let uplink = Uplink::new(
            &db,
            Arc::new(MemoryRemoteStore::new()),
            "device-a",
            Duration::from_secs(1),
            Arc::new(NoOpEmitter),
        );
        let writer = RecordWriter::new(&db, probe.clone(), uplink, false, Duration::from_secs(1));

        let result = writer.save(None, paneer()).await;
        assert!(result.success && !result.synced);
        assert_eq!(probe.probe_count(), 0);
    }

    #[tokio::test]
    async fn test_save_json_takes_id_from_payload() {
        let fx = fixture(false).await;

        let result = fx
            .writer
            .save_json(
                RecordKind::Farmers,
                json!({"id": "farmer-1", "name": "Ramesh", "animal_type": "buffalo", "balance_paise": 0}),
            )
            .await;

        assert!(result.success);
        let record = result.stored_record.unwrap();
        assert_eq!(record.id, "farmer-1");
        assert!(record.payload.get("id").is_none());

        let wrong_shape = fx
            .writer
            .save_json(RecordKind::Farmers, json!({"quantity_litres": 3.5}))
            .await;
        assert!(!wrong_shape.success);
    }
}
