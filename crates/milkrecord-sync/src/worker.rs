//! # Sync Worker
//!
//! Background loop that drains unsynced records to the remote store.
//!
//! ## Pass Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Sync Pass                                     │
//! │                                                                         │
//! │  probe ── offline ──► PassReport { skipped_offline: true }  (no logs)  │
//! │    │                                                                    │
//! │    ▼ online                                                             │
//! │  for kind in farmers, customers, sales, products,                      │
//! │              milk_collections, ledger_entries:                         │
//! │      list_pending(kind, batch_size)   pending + failed, oldest first   │
//! │        └─ list error → log, next table                                 │
//! │      for record:                                                        │
//! │        uplink.push(kind, record, Sync)                                 │
//! │          Synced   → counted                                            │
//! │          Conflict → counted (uplink marked it)                         │
//! │          Failed   → retryable: stays pending, counted                  │
//! │                     rejected:  mark failed@version, counted            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Passes are serialized: a forced pass waits for a scheduled one to finish.
//! The loop only checks for shutdown between passes.

use chrono::{DateTime, Utc};
use milkrecord_core::{RecordKind, SyncAction, SyncStatus};
use milkrecord_db::{Database, RecordRepository};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use ts_rs::TS;

use crate::agent::SyncEventEmitter;
use crate::connectivity::ConnectivityProbe;
use crate::uplink::{PushOutcome, Uplink};

// =============================================================================
// Pass Report
// =============================================================================

/// Outcome counts for one table within a pass.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct TableReport {
    pub kind: RecordKind,
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub conflicts: usize,
    /// Set when the table could not be listed.
    pub error: Option<String>,
}

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export)]
pub struct PassReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    pub conflicts: usize,
    /// The probe said offline; nothing was scanned.
    pub skipped_offline: bool,
    pub tables: Vec<TableReport>,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub finished_at: DateTime<Utc>,
}

impl PassReport {
    fn begin() -> Self {
        let now = Utc::now();
        PassReport {
            attempted: 0,
            synced: 0,
            failed: 0,
            conflicts: 0,
            skipped_offline: false,
            tables: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    fn add(&mut self, table: TableReport) {
        self.attempted += table.attempted;
        self.synced += table.synced;
        self.failed += table.failed;
        self.conflicts += table.conflicts;
        self.tables.push(table);
    }

    /// Nothing was attempted (offline, or nothing to push).
    pub fn is_idle(&self) -> bool {
        self.attempted == 0
    }
}

// =============================================================================
// Sync Worker
// =============================================================================

/// Periodic scanner and pusher of unsynced records.
pub struct SyncWorker {
    records: RecordRepository,
    probe: Arc<dyn ConnectivityProbe>,
    uplink: Uplink,
    batch_size: u32,
    interval: Duration,
    events: Arc<dyn SyncEventEmitter>,
    pass_lock: Mutex<()>,
    last_pass: RwLock<Option<PassReport>>,
}

impl SyncWorker {
    pub fn new(
        db: &Database,
        probe: Arc<dyn ConnectivityProbe>,
        uplink: Uplink,
        batch_size: u32,
        interval: Duration,
        events: Arc<dyn SyncEventEmitter>,
    ) -> Self {
        SyncWorker {
            records: db.records(),
            probe,
            uplink,
            batch_size,
            interval,
            events,
            pass_lock: Mutex::new(()),
            last_pass: RwLock::new(None),
        }
    }

    /// Report of the most recent completed pass.
    pub async fn last_pass(&self) -> Option<PassReport> {
        self.last_pass.read().await.clone()
    }

    /// Runs one full pass over every table.
    pub async fn run_pass(&self) -> PassReport {
        let _guard = self.pass_lock.lock().await;
        let mut report = PassReport::begin();

        if !self.probe.internet_available().await {
            debug!("Offline, skipping sync pass");
            report.skipped_offline = true;
            report.finished_at = Utc::now();
            *self.last_pass.write().await = Some(report.clone());
            return report;
        }

        for kind in RecordKind::ALL {
            let table = self.sync_table(kind).await;
            report.add(table);
        }

        report.finished_at = Utc::now();

        if !report.is_idle() {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                conflicts = report.conflicts,
                "Sync pass complete"
            );
        }

        self.events.emit_pass(&report);
        *self.last_pass.write().await = Some(report.clone());
        report
    }

    async fn sync_table(&self, kind: RecordKind) -> TableReport {
        let mut table = TableReport {
            kind,
            attempted: 0,
            synced: 0,
            failed: 0,
            conflicts: 0,
            error: None,
        };

        let pending = match self.records.list_pending(kind, self.batch_size).await {
            Ok(pending) => pending,
            Err(e) => {
                error!(kind = %kind, error = %e, "Failed to list pending records");
                self.events.emit_error(Some(kind), None, &e.to_string(), false);
                table.error = Some(e.to_string());
                return table;
            }
        };

        if pending.is_empty() {
            return table;
        }

        debug!(kind = %kind, count = pending.len(), "Pushing pending records");

        for record in &pending {
            table.attempted += 1;

            match self.uplink.push(kind, record, SyncAction::Sync).await {
                PushOutcome::Synced { .. } => table.synced += 1,
                PushOutcome::Conflict { .. } => table.conflicts += 1,
                PushOutcome::Failed { retryable, .. } => {
                    table.failed += 1;
                    // Network trouble leaves the record pending; only a
                    // rejection by the remote marks it failed.
                    if retryable {
                        continue;
                    }
                    if let Err(e) = self
                        .records
                        .mark_status(kind, &record.id, record.version, SyncStatus::Failed)
                        .await
                    {
                        warn!(kind = %kind, record_id = %record.id, error = %e, "Failed to mark record failed");
                    }
                }
            }
        }

        table
    }

    /// Runs passes every `interval` until a shutdown signal arrives.
    ///
    /// The first pass runs immediately. A pass in flight always completes.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(interval = ?self.interval, batch_size = self.batch_size, "Sync worker started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Sync worker received shutdown");
                    break;
                }

                _ = interval.tick() => {
                    self.run_pass().await;
                }
            }
        }

        info!("Sync worker stopped");
    }
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("uplink", &self.uplink)
            .field("batch_size", &self.batch_size)
            .field("interval", &self.interval)
            .finish()
    }
}
