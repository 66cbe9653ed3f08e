//! # Sync Agent
//!
//! Wires the engine together and owns the background loop.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sync Agent Lifecycle                           │
//! │                                                                         │
//! │  SyncAgentBuilder::new(config)                                         │
//! │      .with_database(db)                                                │
//! │      .with_remote(remote)      default: Supabase from [remote]         │
//! │      .with_probe(probe)        default: HTTP probe from [connectivity] │
//! │      .with_emitter(emitter)    default: NoOpEmitter                    │
//! │      .build()?                                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  agent.start().await?  ──► DeviceIdentity::load_or_create              │
//! │         │                   spawn SyncWorker::run (tokio task)         │
//! │         ▼                                                               │
//! │  SyncAgentHandle                                                       │
//! │     writer().save(..)       write path                                 │
//! │     status() / force_sync() / reset_conflicts() / recent_logs()        │
//! │     shutdown()              signal, await the task, remote.close()     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `attach()` builds the same handle without spawning the loop, for
//! one-shot operator commands.

use chrono::Utc;
use milkrecord_core::{RecordKind, SyncLogEntry, SyncStatus};
use milkrecord_db::Database;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use ts_rs::TS;

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityProbe, HttpProbe};
use crate::device::DeviceIdentity;
use crate::error::{SyncError, SyncResult};
use crate::remote::{RemoteStore, SupabaseRemoteStore};
use crate::uplink::Uplink;
use crate::worker::{PassReport, SyncWorker};
use crate::writer::RecordWriter;

// =============================================================================
// Status Report
// =============================================================================

/// Snapshot of sync state for the UI and operator commands.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct SyncStatusReport {
    pub device_id: String,

    /// Fresh probe result, not cached.
    pub internet_available: bool,

    /// Records still to push (pending + failed), per table.
    pub pending_counts_by_table: BTreeMap<RecordKind, i64>,

    /// Records parked as conflict, per table.
    pub conflict_counts_by_table: BTreeMap<RecordKind, i64>,

    /// Whether the background loop is alive.
    pub running: bool,

    pub last_pass: Option<PassReport>,
}

impl SyncStatusReport {
    pub fn total_pending(&self) -> i64 {
        self.pending_counts_by_table.values().sum()
    }

    pub fn total_conflicts(&self) -> i64 {
        self.conflict_counts_by_table.values().sum()
    }
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives sync events (UI bridge, logs).
pub trait SyncEventEmitter: Send + Sync {
    /// A pass finished (not emitted for offline passes).
    fn emit_pass(&self, report: &PassReport);

    /// A record was parked because the remote copy is ahead.
    fn emit_conflict(&self, kind: RecordKind, record_id: &str, local_version: i64, remote_version: i64);

    /// A push or table scan failed.
    fn emit_error(&self, kind: Option<RecordKind>, record_id: Option<&str>, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_pass(&self, _report: &PassReport) {}
    fn emit_conflict(&self, _kind: RecordKind, _record_id: &str, _local: i64, _remote: i64) {}
    fn emit_error(&self, _kind: Option<RecordKind>, _record_id: Option<&str>, _message: &str, _retryable: bool) {}
}

/// Writes events to the tracing subscriber.
pub struct TracingEmitter;

impl SyncEventEmitter for TracingEmitter {
    fn emit_pass(&self, report: &PassReport) {
        if report.is_idle() {
            return;
        }
        info!(
            target: "milkrecord::events",
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            conflicts = report.conflicts,
            "sync://pass"
        );
    }

    fn emit_conflict(&self, kind: RecordKind, record_id: &str, local_version: i64, remote_version: i64) {
        warn!(
            target: "milkrecord::events",
            kind = %kind,
            record_id,
            local_version,
            remote_version,
            "sync://conflict"
        );
    }

    fn emit_error(&self, kind: Option<RecordKind>, record_id: Option<&str>, message: &str, retryable: bool) {
        warn!(
            target: "milkrecord::events",
            kind = ?kind,
            record_id = ?record_id,
            retryable,
            "sync://error {}",
            message
        );
    }
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Assembled, not yet started sync engine.
pub struct SyncAgent {
    config: Arc<SyncConfig>,
    db: Arc<Database>,
    remote: Arc<dyn RemoteStore>,
    probe: Arc<dyn ConnectivityProbe>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl SyncAgent {
    /// Starts the background loop.
    ///
    /// Fails only if the device identity cannot be read or created.
    pub async fn start(self) -> SyncResult<SyncAgentHandle> {
        self.assemble(true).await
    }

    /// Builds a handle without the background loop.
    pub async fn attach(self) -> SyncResult<SyncAgentHandle> {
        self.assemble(false).await
    }

    async fn assemble(self, spawn_loop: bool) -> SyncResult<SyncAgentHandle> {
        let identity = DeviceIdentity::load_or_create(&self.db, Some(self.config.device.name.as_str())).await?;

        info!(
            device_id = %identity.device_id,
            remote = self.remote.name(),
            "Starting sync agent"
        );

        let uplink = Uplink::new(
            &self.db,
            self.remote.clone(),
            identity.device_id.clone(),
            self.config.remote_timeout(),
            self.emitter.clone(),
        );

        let writer = RecordWriter::new(
            &self.db,
            self.probe.clone(),
            uplink.clone(),
            self.config.sync.push_on_write,
            self.config.push_timeout(),
        );

        let worker = Arc::new(SyncWorker::new(
            &self.db,
            self.probe.clone(),
            uplink,
            self.config.sync.batch_size,
            self.config.interval(),
            self.emitter.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = if spawn_loop {
            Some(tokio::spawn(worker.clone().run(shutdown_rx)))
        } else {
            None
        };

        Ok(SyncAgentHandle {
            db: self.db,
            identity,
            remote: self.remote,
            probe: self.probe,
            writer,
            worker,
            shutdown_tx,
            task: Mutex::new(task),
        })
    }
}

// =============================================================================
// Sync Agent Handle
// =============================================================================

/// Handle for a running (or attached) sync engine.
pub struct SyncAgentHandle {
    db: Arc<Database>,
    identity: DeviceIdentity,
    remote: Arc<dyn RemoteStore>,
    probe: Arc<dyn ConnectivityProbe>,
    writer: RecordWriter,
    worker: Arc<SyncWorker>,
    shutdown_tx: mpsc::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SyncAgentHandle {
    /// The write path. Cheap to clone.
    pub fn writer(&self) -> &RecordWriter {
        &self.writer
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Current sync state, with a fresh connectivity probe.
    pub async fn status(&self) -> SyncResult<SyncStatusReport> {
        let records = self.db.records();

        Ok(SyncStatusReport {
            device_id: self.identity.device_id.clone(),
            internet_available: self.probe.internet_available().await,
            pending_counts_by_table: records.count_unsynced().await?,
            conflict_counts_by_table: records.count_by_status(SyncStatus::Conflict).await?,
            running: self.is_running().await,
            last_pass: self.worker.last_pass().await,
        })
    }

    /// Runs one pass now and waits for it.
    pub async fn force_sync(&self) -> PassReport {
        info!("Forced sync pass requested");
        self.worker.run_pass().await
    }

    /// Puts `conflict` records back in the queue. The local version is kept,
    /// so the next pass conflicts again unless the remote copy was fixed or
    /// the record is saved locally first.
    pub async fn reset_conflicts(&self, kind: Option<RecordKind>) -> SyncResult<u64> {
        let reset = self.db.records().reset_status(kind, SyncStatus::Conflict).await?;
        info!(kind = ?kind, reset, "Conflicts reset to pending");
        Ok(reset)
    }

    /// Most recent sync log entries, newest first.
    pub async fn recent_logs(&self, limit: u32) -> SyncResult<Vec<SyncLogEntry>> {
        Ok(self.db.sync_log().recent(limit).await?)
    }

    /// Deletes sync log entries older than `days`.
    pub async fn prune_logs(&self, days: u32) -> SyncResult<u64> {
        let cutoff = chrono::TimeDelta::try_days(i64::from(days))
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or_else(|| SyncError::InvalidConfig(format!("Log age of {} days is out of range", days)))?;
        let pruned = self.db.sync_log().prune_older_than(cutoff).await?;
        info!(days, pruned, "Pruned sync log");
        Ok(pruned)
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Stops the loop after any in-flight pass and closes the remote store.
    pub async fn shutdown(&self) -> SyncResult<()> {
        let task = self.task.lock().await.take();

        if let Some(task) = task {
            if self.shutdown_tx.send(()).await.is_err() {
                warn!("Sync worker already stopped");
            }
            task.await.map_err(|e| {
                error!(error = %e, "Sync worker task failed");
                SyncError::Internal(e.to_string())
            })?;
        }

        self.remote.close().await?;
        info!("Sync agent stopped");
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating SyncAgent with options.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    db: Option<Arc<Database>>,
    remote: Option<Arc<dyn RemoteStore>>,
    probe: Option<Arc<dyn ConnectivityProbe>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
}

impl SyncAgentBuilder {
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            db: None,
            remote: None,
            probe: None,
            emitter: None,
        }
    }

    pub fn with_database(mut self, db: Arc<Database>) -> Self {
        self.db = Some(db);
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the SyncAgent, filling unset collaborators from the config.
    pub fn build(self) -> SyncResult<SyncAgent> {
        self.config.validate()?;

        let db = self
            .db
            .ok_or_else(|| SyncError::InvalidConfig("Database required".into()))?;

        let remote = match self.remote {
            Some(remote) => remote,
            None => Arc::new(SupabaseRemoteStore::from_config(&self.config)?),
        };

        let probe = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::from_config(&self.config)?),
        };

        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        Ok(SyncAgent {
            config: Arc::new(self.config),
            db,
            remote,
            probe,
            emitter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticProbe;
    use crate::remote::MemoryRemoteStore;
    use milkrecord_core::{Customer, SyncLogStatus};
    use milkrecord_db::DbConfig;

    async fn agent(remote: Arc<MemoryRemoteStore>, probe: Arc<StaticProbe>) -> SyncAgent {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        SyncAgentBuilder::new(SyncConfig::default())
            .with_database(db)
            .with_remote(remote)
            .with_probe(probe)
            .build()
            .unwrap()
    }

    fn customer(name: &str) -> Customer {
        Customer {
            name: name.into(),
            phone: None,
            email: None,
            address: None,
            balance_paise: 0,
        }
    }

    #[test]
    fn test_build_requires_database() {
        let result = SyncAgentBuilder::new(SyncConfig::default())
            .with_remote(Arc::new(MemoryRemoteStore::new()))
            .build();
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_build_without_remote_config_fails() {
        let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
        let result = SyncAgentBuilder::new(SyncConfig::default())
            .with_database(db)
            .build();
        assert!(matches!(result, Err(SyncError::RemoteNotConfigured)));
    }

    #[tokio::test]
    async fn test_status_counts_per_table() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(StaticProbe::offline());
        let handle = agent(remote, probe).await.attach().await.unwrap();

        handle.writer().save(None, customer("Sita")).await;
        handle.writer().save(None, customer("Gita")).await;

        let status = handle.status().await.unwrap();
        assert!(status.device_id.starts_with("device-"));
        assert!(!status.internet_available);
        assert!(!status.running);
        assert_eq!(status.pending_counts_by_table[&RecordKind::Customers], 2);
        assert_eq!(status.pending_counts_by_table[&RecordKind::Sales], 0);
        assert_eq!(status.total_pending(), 2);
        assert_eq!(status.total_conflicts(), 0);
    }

    #[tokio::test]
    async fn test_force_sync_and_recent_logs() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(StaticProbe::offline());
        let handle = agent(remote.clone(), probe.clone()).await.attach().await.unwrap();

        handle.writer().save(None, customer("Sita")).await;
        probe.set_online(true);

        let report = handle.force_sync().await;
        assert_eq!(report.synced, 1);

        let logs = handle.recent_logs(10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncLogStatus::Success);
        assert_eq!(logs[0].device_id, handle.device().device_id);

        assert_eq!(handle.prune_logs(1).await.unwrap(), 0);
        assert_eq!(handle.status().await.unwrap().last_pass, Some(report));
    }

    #[tokio::test]
    async fn test_prune_logs_rejects_out_of_range_age() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(StaticProbe::offline());
        let handle = agent(remote, probe).await.attach().await.unwrap();

        let err = handle.prune_logs(u32::MAX).await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(handle.prune_logs(36_500).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let remote = Arc::new(MemoryRemoteStore::new());
        let probe = Arc::new(StaticProbe::offline());
        let handle = agent(remote.clone(), probe).await.start().await.unwrap();

        assert!(handle.status().await.unwrap().running);

        handle.shutdown().await.unwrap();
        assert!(!handle.is_running().await);
        assert!(remote.is_closed());
    }
}
