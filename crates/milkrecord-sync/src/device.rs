//! # Device Identity
//!
//! Every installation gets one id, generated on first start and stored in
//! the local database. Every record created here carries it.

use milkrecord_db::Database;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::SyncResult;

/// Prefix for generated device ids.
const DEVICE_ID_PREFIX: &str = "device-";

/// This installation's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub device_name: Option<String>,
}

impl DeviceIdentity {
    /// Returns the stored identity, creating it on first call.
    ///
    /// The id is never regenerated while the database file exists; a
    /// different `name` on later calls does not overwrite the stored one.
    pub async fn load_or_create(db: &Database, name: Option<&str>) -> SyncResult<Self> {
        let repo = db.device();

        if let Some(existing) = repo.get().await? {
            return Ok(DeviceIdentity {
                device_id: existing.device_id,
                device_name: existing.device_name,
            });
        }

        let candidate = generate_device_id();
        let stored = repo.insert_if_absent(&candidate, name).await?;

        if stored.device_id == candidate {
            info!(device_id = %stored.device_id, "Generated new device identity");
        }

        Ok(DeviceIdentity {
            device_id: stored.device_id,
            device_name: stored.device_name,
        })
    }
}

fn generate_device_id() -> String {
    format!("{}{}", DEVICE_ID_PREFIX, Uuid::new_v4())
}
