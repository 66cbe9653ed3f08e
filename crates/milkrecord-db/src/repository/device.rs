//! # Device Repository
//!
//! The `device_identity` singleton row. Written once per database file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::DbResult;
use crate::repository::timestamp;

/// This installation's stored identity.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DeviceRecord {
    pub device_id: String,
    pub device_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Repository for the device identity row.
#[derive(Debug, Clone)]
pub struct DeviceRepository {
    pool: SqlitePool,
}

impl DeviceRepository {
    /// Creates a new DeviceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeviceRepository { pool }
    }

    /// Reads the stored identity, if any.
    pub async fn get(&self) -> DbResult<Option<DeviceRecord>> {
        let record = sqlx::query_as(
            "SELECT device_id, device_name, created_at FROM device_identity WHERE singleton = 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Stores `device_id` unless an identity already exists, then returns
    /// whichever identity won.
    ///
    /// `INSERT OR IGNORE` on the singleton key makes concurrent first calls
    /// converge on one value.
    pub async fn insert_if_absent(
        &self,
        device_id: &str,
        device_name: Option<&str>,
    ) -> DbResult<DeviceRecord> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO device_identity (singleton, device_id, device_name, created_at)
            VALUES (1, ?1, ?2, ?3)
            "#,
        )
        .bind(device_id)
        .bind(device_name)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as(
            "SELECT device_id, device_name, created_at FROM device_identity WHERE singleton = 1",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
