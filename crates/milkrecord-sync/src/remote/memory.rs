//! In-process [`RemoteStore`] with failure injection. Backs the test suite.
//! The daemon also uses it, paired with an offline probe, when no Supabase
//! project is configured, so nothing is ever pushed to it there.

use async_trait::async_trait;
use milkrecord_core::{Record, RecordKind, StoredRecord, SyncStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::RemoteStore;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    rows: Mutex<HashMap<(RecordKind, String), StoredRecord>>,
    gets: AtomicUsize,
    upserts: AtomicUsize,
    fail_gets: AtomicBool,
    /// HTTP status every upsert fails with; 0 means upserts succeed.
    upsert_failure: AtomicU16,
    closed: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a remote row directly, as if another device had pushed it.
    pub fn put(&self, kind: RecordKind, record: StoredRecord) {
        self.lock_rows().insert((kind, record.id.clone()), record);
    }

    pub fn record(&self, kind: RecordKind, id: &str) -> Option<StoredRecord> {
        self.lock_rows().get(&(kind, id.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock_rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Makes every `get` fail with a 503.
    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Makes every `upsert` fail with a 503.
    pub fn fail_upserts(&self, fail: bool) {
        self.upsert_failure
            .store(if fail { 503 } else { 0 }, Ordering::SeqCst);
    }

    /// Makes every `upsert` fail with a 400, as PostgREST does for a row it
    /// will not accept.
    pub fn reject_upserts(&self, reject: bool) {
        self.upsert_failure
            .store(if reject { 400 } else { 0 }, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = latency;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock_rows(&self) -> std::sync::MutexGuard<'_, HashMap<(RecordKind, String), StoredRecord>> {
        // A poisoned map is still a valid map.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.latency.lock().ok().and_then(|slot| *slot);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn unavailable() -> SyncError {
        Self::rejected(503)
    }

    fn rejected(status: u16) -> SyncError {
        let message = if status >= 500 {
            "remote store unavailable"
        } else {
            "remote store rejected the row"
        };
        SyncError::RemoteRejected {
            status,
            message: message.into(),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, kind: RecordKind, id: &str) -> SyncResult<Option<StoredRecord>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }

        Ok(self.record(kind, id))
    }

    async fn upsert(&self, kind: RecordKind, record: &StoredRecord) -> SyncResult<StoredRecord> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let failure = self.upsert_failure.load(Ordering::SeqCst);
        if failure != 0 {
            return Err(Self::rejected(failure));
        }

        let stored = Record {
            sync_status: SyncStatus::Synced,
            ..record.clone()
        };
        self.put(kind, stored.clone());
        Ok(stored)
    }

    async fn close(&self) -> SyncResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn record(id: &str, version: i64) -> StoredRecord {
        let now = Utc::now();
        Record {
            id: id.into(),
            device_id: "device-a".into(),
            payload: json!({"name": "Cow Milk"}),
            version,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_and_counts() {
        let store = MemoryRemoteStore::new();

        store.upsert(RecordKind::Products, &record("p1", 1)).await.unwrap();
        store.upsert(RecordKind::Products, &record("p1", 2)).await.unwrap();

        let remote = store.get(RecordKind::Products, "p1").await.unwrap().unwrap();
        assert_eq!(remote.version, 2);
        assert_eq!(remote.sync_status, SyncStatus::Synced);
        assert_eq!(store.len(), 1);
        assert_eq!(store.upsert_count(), 2);
        assert!(store.get(RecordKind::Sales, "p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let store = MemoryRemoteStore::new();
        store.fail_upserts(true);

        let err = store.upsert(RecordKind::Sales, &record("s1", 1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(store.is_empty());

        store.fail_gets(true);
        assert!(store.get(RecordKind::Sales, "s1").await.is_err());
    }

    #[tokio::test]
    async fn test_rejected_upsert_is_not_retryable() {
        let store = MemoryRemoteStore::new();
        store.reject_upserts(true);

        let err = store.upsert(RecordKind::Sales, &record("s1", 1)).await.unwrap_err();
        assert!(!err.is_retryable());

        store.reject_upserts(false);
        assert!(store.upsert(RecordKind::Sales, &record("s1", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_close() {
        let store = MemoryRemoteStore::new();
        assert!(!store.is_closed());
        store.close().await.unwrap();
        assert!(store.is_closed());
    }
}
