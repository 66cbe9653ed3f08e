//! # Sync Types
//!
//! The record envelope and everything the sync machinery says about a record.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Types                                      │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────┐   ┌─────────────────┐   │
//! │  │     Record<P>       │   │   RecordKind    │   │   SyncStatus    │   │
//! │  │  ─────────────────  │   │  ─────────────  │   │  ─────────────  │   │
//! │  │  id (UUID v7)       │   │  farmers        │   │  pending        │   │
//! │  │  device_id          │   │  customers      │   │  synced         │   │
//! │  │  payload: P         │   │  sales          │   │  conflict       │   │
//! │  │  version            │   │  products       │   │  failed         │   │
//! │  │  sync_status        │   │  milk_collect.. │   └─────────────────┘   │
//! │  │  created/updated_at │   │  ledger_entries │                         │
//! │  └─────────────────────┘   └─────────────────┘                         │
//! │                                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────┐   ┌─────────────────┐   │
//! │  │   SyncLogEntry      │   │ ConflictResult  │   │  SaveResult<P>  │   │
//! │  │  (append-only       │   │  has_conflict   │   │  success        │   │
//! │  │   audit trail)      │   │  remote_version │   │  stored_record  │   │
//! │  └─────────────────────┘   └─────────────────┘   │  message        │   │
//! │                                                  └─────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Lifecycle
//! ```text
//!   save ──► pending ──push ok──► synced ──local save──► pending (version+1)
//!               │  ▲
//!   remote err  │  │ next pass
//!               ▼  │
//!             failed
//!
//!   pending/failed ──remote ahead──► conflict ──operator reset──► pending
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::payload::Payload;

// =============================================================================
// Record Kind
// =============================================================================

/// One synced domain table.
///
/// The string form is the table name on both the local and the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Farmers,
    Customers,
    Sales,
    Products,
    MilkCollections,
    LedgerEntries,
}

impl RecordKind {
    /// Every kind, in the order the sync loop visits them.
    pub const ALL: [RecordKind; 6] = [
        RecordKind::Farmers,
        RecordKind::Customers,
        RecordKind::Sales,
        RecordKind::Products,
        RecordKind::MilkCollections,
        RecordKind::LedgerEntries,
    ];

    /// Table name, local and remote.
    pub const fn table_name(&self) -> &'static str {
        match self {
            RecordKind::Farmers => "farmers",
            RecordKind::Customers => "customers",
            RecordKind::Sales => "sales",
            RecordKind::Products => "products",
            RecordKind::MilkCollections => "milk_collections",
            RecordKind::LedgerEntries => "ledger_entries",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.table_name() == s)
            .ok_or_else(|| CoreError::UnknownRecordKind(s.to_string()))
    }
}

// =============================================================================
// Sync Status
// =============================================================================

/// Where a record stands relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Written locally, not yet confirmed by the remote store.
    Pending,
    /// Remote upsert confirmed at the current version.
    Synced,
    /// Remote copy was ahead at push time. Skipped until reset.
    Conflict,
    /// Last push attempt errored. Retried on every pass.
    Failed,
}

impl SyncStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Failed => "failed",
        }
    }

    /// Whether the sync loop should pick this record up.
    #[inline]
    pub const fn needs_push(&self) -> bool {
        matches!(self, SyncStatus::Pending | SyncStatus::Failed)
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Pending
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "conflict" => Ok(SyncStatus::Conflict),
            "failed" => Ok(SyncStatus::Failed),
            other => Err(CoreError::UnknownSyncStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Record Envelope
// =============================================================================

/// Generates a new time-ordered record id (UUID v7).
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// The sync envelope around a domain payload.
///
/// The sync machinery only ever sees [`StoredRecord`]; typed callers work
/// with `Record<Farmer>`, `Record<Sale>` and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<P> {
    /// Client-generated UUID v7.
    pub id: String,

    /// Installation that created the record. Never changes after creation.
    pub device_id: String,

    /// Domain fields.
    pub payload: P,

    /// Starts at 1, +1 on every local mutation.
    pub version: i64,

    pub sync_status: SyncStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// A record with an untyped JSON payload, as stored and pushed.
pub type StoredRecord = Record<serde_json::Value>;

impl<P> Record<P> {
    /// Whether the sync loop still has work to do for this record.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.sync_status.needs_push()
    }

    /// Swaps the payload, keeping the envelope.
    pub fn map_payload<Q>(self, f: impl FnOnce(P) -> Q) -> Record<Q> {
        Record {
            id: self.id,
            device_id: self.device_id,
            payload: f(self.payload),
            version: self.version,
            sync_status: self.sync_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl<P: Serialize> Record<P> {
    /// Converts to the JSON-payload form.
    pub fn encode(&self) -> CoreResult<StoredRecord> {
        let payload =
            serde_json::to_value(&self.payload).map_err(|e| CoreError::InvalidPayload {
                kind: std::any::type_name::<P>().to_string(),
                reason: e.to_string(),
            })?;

        Ok(Record {
            id: self.id.clone(),
            device_id: self.device_id.clone(),
            payload,
            version: self.version,
            sync_status: self.sync_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StoredRecord {
    /// Decodes the JSON payload into a typed payload.
    pub fn decode<P: Payload + DeserializeOwned>(self) -> CoreResult<Record<P>> {
        let Record {
            id,
            device_id,
            payload,
            version,
            sync_status,
            created_at,
            updated_at,
        } = self;

        Ok(Record {
            id,
            device_id,
            payload: decode_payload(payload)?,
            version,
            sync_status,
            created_at,
            updated_at,
        })
    }
}

/// Deserializes a JSON payload, reporting failures against the payload's kind.
pub fn decode_payload<P: Payload + DeserializeOwned>(value: serde_json::Value) -> CoreResult<P> {
    serde_json::from_value(value).map_err(|e| CoreError::InvalidPayload {
        kind: P::KIND.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Sync Log
// =============================================================================

/// What triggered a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    /// Push-on-write after creating a record.
    Insert,
    /// Push-on-write after mutating an existing record.
    Update,
    /// Push from the background sync loop.
    Sync,
}

impl SyncAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Insert => "insert",
            SyncAction::Update => "update",
            SyncAction::Sync => "sync",
        }
    }
}

/// Outcome of one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Success,
    Failed,
    Conflict,
}

impl SyncLogStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Success => "success",
            SyncLogStatus::Failed => "failed",
            SyncLogStatus::Conflict => "conflict",
        }
    }
}

/// One row of the append-only sync audit log.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SyncLogEntry {
    pub id: i64,
    pub device_id: String,
    pub table_name: RecordKind,
    pub record_id: String,
    pub action: SyncAction,
    pub status: SyncLogStatus,
    pub error_message: Option<String>,
    pub local_version: Option<i64>,
    pub remote_version: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sync log entry about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncAttempt {
    pub device_id: String,
    pub kind: RecordKind,
    pub record_id: String,
    pub action: SyncAction,
    pub status: SyncLogStatus,
    pub error_message: Option<String>,
    pub local_version: Option<i64>,
    pub remote_version: Option<i64>,
}

impl SyncAttempt {
    pub fn success(
        device_id: impl Into<String>,
        kind: RecordKind,
        record_id: impl Into<String>,
        action: SyncAction,
        version: i64,
    ) -> Self {
        SyncAttempt {
            device_id: device_id.into(),
            kind,
            record_id: record_id.into(),
            action,
            status: SyncLogStatus::Success,
            error_message: None,
            local_version: Some(version),
            remote_version: None,
        }
    }

    pub fn failed(
        device_id: impl Into<String>,
        kind: RecordKind,
        record_id: impl Into<String>,
        action: SyncAction,
        version: i64,
        error: impl Into<String>,
    ) -> Self {
        SyncAttempt {
            device_id: device_id.into(),
            kind,
            record_id: record_id.into(),
            action,
            status: SyncLogStatus::Failed,
            error_message: Some(error.into()),
            local_version: Some(version),
            remote_version: None,
        }
    }

    /// A conflict carries both versions so an operator can see who was ahead.
    pub fn conflict(
        device_id: impl Into<String>,
        kind: RecordKind,
        record_id: impl Into<String>,
        action: SyncAction,
        local_version: i64,
        remote_version: i64,
    ) -> Self {
        SyncAttempt {
            device_id: device_id.into(),
            kind,
            record_id: record_id.into(),
            action,
            status: SyncLogStatus::Conflict,
            error_message: Some(format!(
                "Remote version {} is ahead of local version {}",
                remote_version, local_version
            )),
            local_version: Some(local_version),
            remote_version: Some(remote_version),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// Result of comparing a local version against the remote copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResult {
    pub has_conflict: bool,
    /// `None` when the remote store has no row for the id.
    pub remote_version: Option<i64>,
    pub remote_payload: Option<serde_json::Value>,
}

impl ConflictResult {
    /// No remote row: first sync of this id.
    pub fn absent() -> Self {
        ConflictResult {
            has_conflict: false,
            remote_version: None,
            remote_payload: None,
        }
    }

    /// Compares versions. Only a strictly greater remote version conflicts.
    pub fn compare(local_version: i64, remote: &StoredRecord) -> Self {
        ConflictResult {
            has_conflict: remote.version > local_version,
            remote_version: Some(remote.version),
            remote_payload: Some(remote.payload.clone()),
        }
    }
}

/// Result of a write-path save.
///
/// `success` reflects the local write only; a failed push never turns a
/// durable save into a failure.
#[derive(Debug, Clone)]
pub struct SaveResult<P> {
    pub success: bool,
    pub stored_record: Option<Record<P>>,
    /// True when the push-on-write reached the remote store.
    pub synced: bool,
    pub message: String,
}

impl<P> SaveResult<P> {
    pub const SAVED_LOCALLY: &'static str = "Saved locally";
    pub const SAVED_AND_SYNCED: &'static str = "Saved and synced to cloud";

    pub fn saved(record: Record<P>, synced: bool) -> Self {
        let message = if synced {
            Self::SAVED_AND_SYNCED
        } else {
            Self::SAVED_LOCALLY
        };

        SaveResult {
            success: true,
            stored_record: Some(record),
            synced,
            message: message.to_string(),
        }
    }

    pub fn failed(reason: impl fmt::Display) -> Self {
        SaveResult {
            success: false,
            stored_record: None,
            synced: false,
            message: format!("Failed to save locally: {}", reason),
        }
    }

    /// The saved record's id, if the save succeeded.
    pub fn id(&self) -> Option<&str> {
        self.stored_record.as_ref().map(|r| r.id.as_str())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Farmer;
    use serde_json::json;

    fn stored(version: i64, payload: serde_json::Value) -> StoredRecord {
        let now = Utc::now();
        Record {
            id: new_record_id(),
            device_id: "device-test".to_string(),
            payload,
            version,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_kind_round_trips_table_names() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.table_name().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("payments".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_record_kind_serializes_as_table_name() {
        let json = serde_json::to_string(&RecordKind::MilkCollections).unwrap();
        assert_eq!(json, "\"milk_collections\"");
    }

    #[test]
    fn test_sync_status_needs_push() {
        assert!(SyncStatus::Pending.needs_push());
        assert!(SyncStatus::Failed.needs_push());
        assert!(!SyncStatus::Synced.needs_push());
        assert!(!SyncStatus::Conflict.needs_push());
        assert_eq!(SyncStatus::default(), SyncStatus::Pending);
    }

    #[test]
    fn test_new_record_ids_are_v7() {
        let a = new_record_id();
        let b = new_record_id();
        assert_ne!(a, b);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_decode_typed_payload() {
        let record = stored(
            2,
            json!({"name": "Ramesh", "phone": null, "animal_type": "buffalo", "balance_paise": 0}),
        );
        let farmer: Record<Farmer> = record.decode().unwrap();
        assert_eq!(farmer.payload.name, "Ramesh");
        assert_eq!(farmer.version, 2);
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        let record = stored(1, json!({"quantity_litres": 4.0}));
        let err = record.decode::<Farmer>().unwrap_err();
        assert!(err.to_string().contains("farmers"));
    }

    #[test]
    fn test_conflict_only_when_remote_strictly_ahead() {
        let remote = stored(3, json!({}));
        assert!(ConflictResult::compare(2, &remote).has_conflict);
        assert!(!ConflictResult::compare(3, &remote).has_conflict);
        assert!(!ConflictResult::compare(4, &remote).has_conflict);
        assert_eq!(ConflictResult::compare(4, &remote).remote_version, Some(3));
        assert!(!ConflictResult::absent().has_conflict);
    }

    #[test]
    fn test_save_result_messages() {
        let record = stored(1, json!({}));
        assert_eq!(SaveResult::saved(record.clone(), false).message, "Saved locally");
        assert_eq!(
            SaveResult::saved(record, true).message,
            "Saved and synced to cloud"
        );

        let failed = SaveResult::<serde_json::Value>::failed("disk I/O error");
        assert!(!failed.success);
        assert_eq!(failed.message, "Failed to save locally: disk I/O error");
        assert!(failed.id().is_none());
    }

    #[test]
    fn test_conflict_attempt_records_both_versions() {
        let attempt =
            SyncAttempt::conflict("device-a", RecordKind::Sales, "r1", SyncAction::Sync, 2, 5);
        assert_eq!(attempt.status, SyncLogStatus::Conflict);
        assert_eq!(attempt.local_version, Some(2));
        assert_eq!(attempt.remote_version, Some(5));
    }
}
