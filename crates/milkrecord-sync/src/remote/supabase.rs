//! # Supabase Remote Store
//!
//! PostgREST adapter. One remote table per [`RecordKind`], one row per
//! record, payload fields flattened next to the envelope columns.
//!
//! ## Wire Shape
//! ```text
//!   local StoredRecord                      remote row (JSON)
//!   ──────────────────                      ─────────────────
//!   id, device_id, version,      ──────►    { "id": ..., "device_id": ...,
//!   created_at, updated_at                    "version": 3,
//!   payload { name, phone, ... }              "sync_status": "synced",
//!                                             "name": ..., "phone": ... }
//! ```
//!
//! - `GET  /rest/v1/{table}?id=eq.{id}&select=*`
//! - `POST /rest/v1/{table}` with `Prefer: resolution=merge-duplicates`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use milkrecord_core::{Record, RecordKind, StoredRecord, SyncStatus};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Map, Value};
use tracing::debug;

use super::RemoteStore;
use crate::config::{parse_http_url, SyncConfig};
use crate::error::{SyncError, SyncResult};

/// Envelope columns. Everything else in a remote row is payload.
const ENVELOPE_COLUMNS: [&str; 6] = [
    "id",
    "device_id",
    "version",
    "sync_status",
    "created_at",
    "updated_at",
];

/// Supabase (PostgREST) implementation of [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct SupabaseRemoteStore {
    client: Client,
    rest_url: String,
    api_key: String,
}

impl SupabaseRemoteStore {
    /// Creates a store for the project at `url`.
    pub fn new(url: &str, api_key: impl Into<String>) -> SyncResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SyncError::InvalidConfig("Supabase key must not be empty".into()));
        }

        Ok(SupabaseRemoteStore {
            client: Client::builder().build()?,
            rest_url: normalize_rest_url(url)?,
            api_key,
        })
    }

    /// Builds the store from `[remote]`.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        match (&config.remote.url, &config.remote.api_key) {
            (Some(url), Some(key)) => Self::new(url, key.clone()),
            _ => Err(SyncError::RemoteNotConfigured),
        }
    }

    fn table_url(&self, kind: RecordKind) -> String {
        format!("{}/{}", self.rest_url, kind.table_name())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    async fn checked(response: Response) -> SyncResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(SyncError::RemoteRejected {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        })
    }
}

#[async_trait]
impl RemoteStore for SupabaseRemoteStore {
    async fn get(&self, kind: RecordKind, id: &str) -> SyncResult<Option<StoredRecord>> {
        let filter = format!("eq.{}", id);
        let request = self.authorized(
            self.client
                .get(self.table_url(kind))
                .query(&[("id", filter.as_str()), ("select", "*")]),
        );

        let response = Self::checked(request.send().await?).await?;
        let rows: Vec<Value> = response.json().await?;

        rows.into_iter().next().map(row_to_record).transpose()
    }

    async fn upsert(&self, kind: RecordKind, record: &StoredRecord) -> SyncResult<StoredRecord> {
        let row = record_to_row(record)?;
        let request = self.authorized(
            self.client
                .post(self.table_url(kind))
                .header("Prefer", "resolution=merge-duplicates,return=representation")
                .json(&[row]),
        );

        let response = Self::checked(request.send().await?).await?;
        let rows: Vec<Value> = response.json().await?;

        debug!(kind = %kind, id = %record.id, version = record.version, "Remote upsert accepted");

        match rows.into_iter().next() {
            Some(row) => row_to_record(row),
            None => Ok(Record {
                sync_status: SyncStatus::Synced,
                ..record.clone()
            }),
        }
    }

    fn name(&self) -> &'static str {
        "supabase"
    }
}

/// `https://x.supabase.co/` → `https://x.supabase.co/rest/v1`
fn normalize_rest_url(url: &str) -> SyncResult<String> {
    let parsed = parse_http_url(url)?;
    let trimmed = parsed.as_str().trim_end_matches('/');

    if trimmed.ends_with("/rest/v1") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{trimmed}/rest/v1"))
    }
}

/// Flattens a record into a remote row. The remote copy is always `synced`.
pub(crate) fn record_to_row(record: &StoredRecord) -> SyncResult<Value> {
    let mut row = match &record.payload {
        Value::Object(fields) => fields.clone(),
        other => {
            return Err(SyncError::InvalidPayload(format!(
                "Payload for {} must be a JSON object, got {}",
                record.id, other
            )))
        }
    };

    for column in ENVELOPE_COLUMNS {
        row.remove(column);
    }

    row.insert("id".into(), Value::String(record.id.clone()));
    row.insert("device_id".into(), Value::String(record.device_id.clone()));
    row.insert("version".into(), Value::from(record.version));
    row.insert(
        "sync_status".into(),
        Value::String(SyncStatus::Synced.as_str().into()),
    );
    row.insert("created_at".into(), Value::String(record.created_at.to_rfc3339()));
    row.insert("updated_at".into(), Value::String(record.updated_at.to_rfc3339()));

    Ok(Value::Object(row))
}

/// Splits a remote row back into envelope and payload.
///
/// A row without `version` reads as version 0 so any local copy wins.
pub(crate) fn row_to_record(row: Value) -> SyncResult<StoredRecord> {
    let Value::Object(mut fields) = row else {
        return Err(SyncError::InvalidRemoteRow("row is not a JSON object".into()));
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) => id,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(SyncError::InvalidRemoteRow("row has no id".into())),
    };

    let device_id = match fields.remove("device_id") {
        Some(Value::String(device)) => device,
        _ => String::new(),
    };

    let version = fields
        .remove("version")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);

    let sync_status = fields
        .remove("sync_status")
        .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(SyncStatus::Synced);

    let created_at = take_timestamp(&mut fields, "created_at")?;
    let updated_at = take_timestamp(&mut fields, "updated_at")?.or(created_at);
    let now = Utc::now();

    Ok(Record {
        id,
        device_id,
        payload: Value::Object(fields),
        version,
        sync_status,
        created_at: created_at.unwrap_or(now),
        updated_at: updated_at.unwrap_or(now),
    })
}

fn take_timestamp(fields: &mut Map<String, Value>, key: &str) -> SyncResult<Option<DateTime<Utc>>> {
    match fields.remove(key) {
        Some(Value::String(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| SyncError::InvalidRemoteRow(format!("{key}: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> StoredRecord {
        let now = Utc::now();
        Record {
            id: "0190f0d2-0000-7000-8000-000000000001".into(),
            device_id: "device-a".into(),
            payload: json!({"name": "Ramesh", "animal_type": "cow", "balance_paise": 0}),
            version: 3,
            sync_status: SyncStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rest_url_normalization() {
        assert_eq!(
            normalize_rest_url("https://project.supabase.co/").unwrap(),
            "https://project.supabase.co/rest/v1"
        );
        assert_eq!(
            normalize_rest_url("https://project.supabase.co/rest/v1").unwrap(),
            "https://project.supabase.co/rest/v1"
        );
        assert!(normalize_rest_url("project.supabase.co").is_err());
    }

    #[test]
    fn test_row_is_flattened_and_marked_synced() {
        let row = record_to_row(&sample()).unwrap();
        assert_eq!(row["name"], "Ramesh");
        assert_eq!(row["version"], 3);
        assert_eq!(row["sync_status"], "synced");
        assert_eq!(row["device_id"], "device-a");
    }

    #[test]
    fn test_payload_cannot_spoof_envelope() {
        let mut record = sample();
        record.payload = json!({"name": "x", "version": 99, "id": "other"});

        let row = record_to_row(&record).unwrap();
        assert_eq!(row["version"], 3);
        assert_eq!(row["id"], record.id.as_str());
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let mut record = sample();
        record.payload = json!([1, 2]);
        assert!(matches!(record_to_row(&record), Err(SyncError::InvalidPayload(_))));
    }

    #[test]
    fn test_remote_row_splits_back() {
        let record = sample();
        let back = row_to_record(record_to_row(&record).unwrap()).unwrap();

        assert_eq!(back.id, record.id);
        assert_eq!(back.version, 3);
        assert_eq!(back.sync_status, SyncStatus::Synced);
        assert_eq!(back.payload, record.payload);
    }

    #[test]
    fn test_row_without_version_reads_as_zero() {
        let record = row_to_record(json!({"id": "r1", "name": "Legacy"})).unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.payload, json!({"name": "Legacy"}));

        assert!(row_to_record(json!({"name": "no id"})).is_err());
    }

    #[test]
    fn test_from_config_requires_remote() {
        let config = SyncConfig::default();
        assert!(matches!(
            SupabaseRemoteStore::from_config(&config),
            Err(SyncError::RemoteNotConfigured)
        ));
    }
}
