//! End-to-end behavior of the write path and the sync loop against an
//! in-memory SQLite store, an in-memory remote and a switchable probe.

use chrono::NaiveDate;
use milkrecord_core::{
    Customer, MilkCollection, Money, PaymentMode, Record, RecordKind, Sale, SaleItem, Shift,
    SyncAction, SyncLogStatus, SyncStatus, WALK_IN_CUSTOMER,
};
use milkrecord_db::{Database, DbConfig};
use milkrecord_sync::{
    MemoryRemoteStore, NoOpEmitter, StaticProbe, SyncAgentBuilder, SyncAgentHandle, SyncConfig,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    db: Arc<Database>,
    remote: Arc<MemoryRemoteStore>,
    probe: Arc<StaticProbe>,
    handle: SyncAgentHandle,
}

async fn harness_with(config: SyncConfig) -> Harness {
    harness_sharing(config, Arc::new(MemoryRemoteStore::new())).await
}

/// A device with its own local store, pushing to `remote`.
async fn harness_sharing(config: SyncConfig, remote: Arc<MemoryRemoteStore>) -> Harness {
    let db = Arc::new(Database::new(DbConfig::in_memory()).await.unwrap());
    let probe = Arc::new(StaticProbe::offline());

    let handle = SyncAgentBuilder::new(config)
        .with_database(db.clone())
        .with_remote(remote.clone())
        .with_probe(probe.clone())
        .with_emitter(Arc::new(NoOpEmitter))
        .build()
        .unwrap()
        .attach()
        .await
        .unwrap();

    Harness {
        db,
        remote,
        probe,
        handle,
    }
}

async fn harness() -> Harness {
    harness_with(SyncConfig::default()).await
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn walk_in_sale() -> Sale {
    let item = SaleItem::priced("Cow Milk", "L", 2.0, Money::from_rupees_paise(64, 0));
    Sale {
        customer_id: None,
        customer_name: WALK_IN_CUSTOMER.into(),
        total_paise: item.amount_paise,
        paid_paise: item.amount_paise,
        items: vec![item],
        payment_mode: PaymentMode::Cash,
        sale_date: date(),
    }
}

fn customer(name: &str) -> Customer {
    Customer {
        name: name.into(),
        phone: Some("98765 43210".into()),
        email: None,
        address: None,
        balance_paise: 0,
    }
}

// =============================================================================
// Scenario A: offline write, later sync
// =============================================================================

#[tokio::test]
async fn offline_sale_syncs_on_first_online_pass() {
    let h = harness().await;

    let saved = h.handle.writer().save(None, walk_in_sale()).await;
    assert!(saved.success);
    assert_eq!(saved.message, "Saved locally");
    let id = saved.id().unwrap().to_string();

    let local = h.db.records().get(RecordKind::Sales, &id).await.unwrap().unwrap();
    assert_eq!(local.version, 1);
    assert_eq!(local.sync_status, SyncStatus::Pending);
    assert_eq!(h.db.sync_log().count().await.unwrap(), 0);

    // Offline pass: nothing scanned, nothing logged.
    let report = h.handle.force_sync().await;
    assert!(report.skipped_offline);
    assert_eq!(h.remote.get_count(), 0);

    h.probe.set_online(true);
    let report = h.handle.force_sync().await;
    assert_eq!(report.synced, 1);

    let local = h.db.records().get(RecordKind::Sales, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Synced);

    let remote = h.remote.record(RecordKind::Sales, &id).unwrap();
    assert_eq!(remote.version, 1);
    assert_eq!(remote.payload["customer_name"], WALK_IN_CUSTOMER);

    let log = h.db.sync_log().for_record(RecordKind::Sales, &id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SyncLogStatus::Success);
    assert_eq!(log[0].action, SyncAction::Sync);

    // Nothing new: a second pass pushes nothing.
    let upserts = h.remote.upsert_count();
    let again = h.handle.force_sync().await;
    assert!(again.is_idle());
    assert_eq!(h.remote.upsert_count(), upserts);
}

#[tokio::test]
async fn mutation_after_sync_redirties_with_next_version() {
    let h = harness().await;
    h.probe.set_online(true);

    let first = h.handle.writer().save(None, customer("Sita")).await;
    assert!(first.synced);
    let id = first.id().unwrap().to_string();

    h.probe.set_online(false);
    let mut updated = customer("Sita");
    updated.balance_paise = 15_000;
    let second = h.handle.writer().save(Some(id.clone()), updated).await;

    let record = second.stored_record.unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.sync_status, SyncStatus::Pending);
    assert_eq!(record.created_at, first.stored_record.unwrap().created_at);

    h.probe.set_online(true);
    h.handle.force_sync().await;

    let remote = h.remote.record(RecordKind::Customers, &id).unwrap();
    assert_eq!(remote.version, 2);
    assert_eq!(remote.payload["balance_paise"], 15_000);
}

// =============================================================================
// Scenario B: remote ahead
// =============================================================================

#[tokio::test]
async fn remote_ahead_becomes_conflict_and_stays_parked() {
    let h = harness().await;

    let saved = h.handle.writer().save(None, customer("Gita")).await;
    let id = saved.id().unwrap().to_string();
    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();

    h.remote.put(
        RecordKind::Customers,
        Record {
            version: 3,
            device_id: "device-other".into(),
            ..local
        },
    );

    h.probe.set_online(true);
    let report = h.handle.force_sync().await;
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.synced, 0);

    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Conflict);
    assert_eq!(h.remote.record(RecordKind::Customers, &id).unwrap().version, 3);

    let log = h.db.sync_log().for_record(RecordKind::Customers, &id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SyncLogStatus::Conflict);
    assert_eq!(log[0].local_version, Some(1));
    assert_eq!(log[0].remote_version, Some(3));

    // Parked: later passes skip it.
    assert!(h.handle.force_sync().await.is_idle());

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.conflict_counts_by_table[&RecordKind::Customers], 1);
    assert_eq!(status.pending_counts_by_table[&RecordKind::Customers], 0);

    // Operator reset puts it back in the queue at the same version.
    assert_eq!(h.handle.reset_conflicts(Some(RecordKind::Customers)).await.unwrap(), 1);
    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Pending);
    assert_eq!(local.version, 1);
}

fn sale_by(cashier: &str) -> Sale {
    Sale {
        customer_name: cashier.into(),
        ..walk_in_sale()
    }
}

#[tokio::test]
async fn second_device_behind_remote_is_parked_as_conflict() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let a = harness_sharing(SyncConfig::default(), remote.clone()).await;
    let b = harness_sharing(SyncConfig::default(), remote.clone()).await;
    assert_ne!(a.handle.device().device_id, b.handle.device().device_id);

    let id = "S1".to_string();

    // Both devices hold S1 at version 2.
    for (h, name) in [(&a, "Device A"), (&b, "Device B")] {
        h.handle.writer().save(Some(id.clone()), sale_by(name)).await;
        let second = h.handle.writer().save(Some(id.clone()), sale_by(name)).await;
        assert_eq!(second.stored_record.unwrap().version, 2);
    }

    // A syncs first, then edits again and syncs version 3.
    a.probe.set_online(true);
    assert_eq!(a.handle.force_sync().await.synced, 1);
    assert_eq!(remote.record(RecordKind::Sales, &id).unwrap().version, 2);

    a.probe.set_online(false);
    let third = a.handle.writer().save(Some(id.clone()), sale_by("Device A")).await;
    assert_eq!(third.stored_record.unwrap().version, 3);
    a.probe.set_online(true);
    assert_eq!(a.handle.force_sync().await.synced, 1);

    // B still holds its own version 2.
    let upserts = remote.upsert_count();
    b.probe.set_online(true);
    let report = b.handle.force_sync().await;
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.synced, 0);
    assert_eq!(remote.upsert_count(), upserts);

    let local_b = b.db.records().get(RecordKind::Sales, &id).await.unwrap().unwrap();
    assert_eq!(local_b.sync_status, SyncStatus::Conflict);
    assert_eq!(local_b.version, 2);
    assert_eq!(local_b.payload["customer_name"], "Device B");

    let shared = remote.record(RecordKind::Sales, &id).unwrap();
    assert_eq!(shared.version, 3);
    assert_eq!(shared.payload["customer_name"], "Device A");
    assert_eq!(shared.device_id, a.handle.device().device_id);

    let log = b.db.sync_log().for_record(RecordKind::Sales, &id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SyncLogStatus::Conflict);
    assert_eq!(log[0].local_version, Some(2));
    assert_eq!(log[0].remote_version, Some(3));
}

#[tokio::test]
async fn equal_versions_overwrite_remote() {
    let h = harness().await;

    let saved = h.handle.writer().save(None, customer("Meena")).await;
    let id = saved.id().unwrap().to_string();
    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();

    h.remote.put(
        RecordKind::Customers,
        Record {
            payload: serde_json::json!({"name": "Someone Else"}),
            ..local
        },
    );

    h.probe.set_online(true);
    assert_eq!(h.handle.force_sync().await.synced, 1);
    assert_eq!(
        h.remote.record(RecordKind::Customers, &id).unwrap().payload["name"],
        "Meena"
    );
}

// =============================================================================
// Scenario C: local storage failure
// =============================================================================

#[tokio::test]
async fn storage_failure_fails_save_without_side_effects() {
    let h = harness().await;
    h.probe.set_online(true);

    sqlx::query(
        "CREATE TRIGGER fail_record_writes BEFORE INSERT ON sync_records \
         BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
    )
    .execute(h.db.pool())
    .await
    .unwrap();

    let result = h.handle.writer().save(None, walk_in_sale()).await;
    assert!(!result.success);
    assert!(!result.synced);
    assert!(result.stored_record.is_none());
    assert!(result.message.starts_with("Failed to save locally:"));
    assert!(result.message.contains("disk I/O error"));

    assert_eq!(h.db.sync_log().count().await.unwrap(), 0);
    assert_eq!(h.handle.status().await.unwrap().total_pending(), 0);
    assert_eq!(h.remote.upsert_count(), 0);
}

// =============================================================================
// Scenario D: remote failure, retried
// =============================================================================

#[tokio::test]
async fn remote_failure_is_retried_until_synced() {
    let h = harness().await;

    let collection = MilkCollection::priced(
        "farmer-1",
        12.5,
        Money::from_rupees_paise(45, 0),
        Shift::Morning,
        date(),
    );
    let saved = h.handle.writer().save(None, collection).await;
    let id = saved.id().unwrap().to_string();

    h.probe.set_online(true);
    h.remote.fail_upserts(true);

    let report = h.handle.force_sync().await;
    assert_eq!(report.failed, 1);
    let local = h.db.records().get(RecordKind::MilkCollections, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Pending);

    // Still failing: retried every pass, no backoff.
    assert_eq!(h.handle.force_sync().await.failed, 1);

    h.remote.fail_upserts(false);
    assert_eq!(h.handle.force_sync().await.synced, 1);

    let local = h.db.records().get(RecordKind::MilkCollections, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Synced);

    let statuses: Vec<_> = h
        .db
        .sync_log()
        .for_record(RecordKind::MilkCollections, &id)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.status)
        .collect();
    assert_eq!(
        statuses,
        vec![
            SyncLogStatus::Failed,
            SyncLogStatus::Failed,
            SyncLogStatus::Success
        ]
    );
}

#[tokio::test]
async fn remote_timeout_leaves_record_pending() {
    let mut config = SyncConfig::default();
    config.remote.timeout_secs = 1;
    let h = harness_with(config).await;

    let saved = h.handle.writer().save(None, customer("Lakshmi")).await;
    let id = saved.id().unwrap().to_string();

    h.remote.set_latency(Some(Duration::from_secs(3)));
    h.probe.set_online(true);

    let report = h.handle.force_sync().await;
    assert_eq!(report.failed, 1);

    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Pending);
    assert!(h.remote.is_empty());

    let log = h.db.sync_log().for_record(RecordKind::Customers, &id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SyncLogStatus::Failed);
    assert!(log[0].error_message.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn rejected_push_is_marked_failed_and_retried() {
    let h = harness().await;

    let saved = h.handle.writer().save(None, customer("Kamala")).await;
    let id = saved.id().unwrap().to_string();

    h.probe.set_online(true);
    h.remote.reject_upserts(true);

    assert_eq!(h.handle.force_sync().await.failed, 1);
    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Failed);
    assert_eq!(h.handle.status().await.unwrap().total_pending(), 1);

    h.remote.reject_upserts(false);
    assert_eq!(h.handle.force_sync().await.synced, 1);
    let local = h.db.records().get(RecordKind::Customers, &id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn push_on_write_failure_leaves_record_pending() {
    let h = harness().await;
    h.probe.set_online(true);
    h.remote.fail_upserts(true);

    let saved = h.handle.writer().save(None, customer("Ravi")).await;
    assert!(saved.success);
    assert!(!saved.synced);
    assert_eq!(saved.message, "Saved locally");

    let id = saved.id().unwrap();
    let local = h.db.records().get(RecordKind::Customers, id).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Pending);

    let log = h.db.sync_log().for_record(RecordKind::Customers, id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].status, SyncLogStatus::Failed);
    assert_eq!(log[0].action, SyncAction::Insert);
}

// =============================================================================
// Ordering
// =============================================================================

#[tokio::test]
async fn batches_drain_oldest_first() {
    let mut config = SyncConfig::default();
    config.sync.batch_size = 2;
    let h = harness_with(config).await;

    for i in 0..5 {
        let saved = h
            .handle
            .writer()
            .save(Some(format!("sale-{}", i)), walk_in_sale())
            .await;
        assert!(saved.success);
    }

    h.probe.set_online(true);
    assert_eq!(h.handle.force_sync().await.synced, 2);
    assert!(h.remote.record(RecordKind::Sales, "sale-0").is_some());
    assert!(h.remote.record(RecordKind::Sales, "sale-1").is_some());
    assert!(h.remote.record(RecordKind::Sales, "sale-2").is_none());

    assert_eq!(h.handle.force_sync().await.synced, 2);
    assert_eq!(h.handle.force_sync().await.synced, 1);

    let mut pushed: Vec<String> = h
        .handle
        .recent_logs(10)
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.record_id)
        .collect();
    pushed.reverse();
    assert_eq!(pushed, vec!["sale-0", "sale-1", "sale-2", "sale-3", "sale-4"]);
}
