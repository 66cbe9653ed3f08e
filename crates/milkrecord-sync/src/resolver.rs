//! # Conflict Resolver
//!
//! Version comparison against the remote copy before every push.
//!
//! ```text
//!   remote row?   remote.version vs local   result
//!   ──────────    ──────────────────────    ─────────────────
//!   absent        -                         no conflict
//!   present       remote >  local           CONFLICT (skip push)
//!   present       remote <= local           no conflict (overwrite)
//! ```
//!
//! Equal versions do not conflict: the local copy overwrites. There is no
//! merge; a conflict parks the record until an operator resets it.

use milkrecord_core::{ConflictResult, RecordKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::SyncResult;
use crate::remote::{bounded, RemoteStore};

#[derive(Clone)]
pub struct ConflictResolver {
    remote: Arc<dyn RemoteStore>,
    timeout: Duration,
}

impl ConflictResolver {
    pub fn new(remote: Arc<dyn RemoteStore>, timeout: Duration) -> Self {
        ConflictResolver { remote, timeout }
    }

    /// Reads the remote copy and compares versions.
    ///
    /// A failed read is an error, never "no conflict": the caller must not
    /// push over a row it could not see.
    pub async fn check_conflict(
        &self,
        kind: RecordKind,
        id: &str,
        local_version: i64,
    ) -> SyncResult<ConflictResult> {
        let remote = bounded(self.timeout, self.remote.get(kind, id)).await?;

        let result = match remote {
            Some(remote) => ConflictResult::compare(local_version, &remote),
            None => ConflictResult::absent(),
        };

        debug!(
            kind = %kind,
            id,
            local_version,
            remote_version = ?result.remote_version,
            has_conflict = result.has_conflict,
            "Conflict check"
        );

        Ok(result)
    }
}

impl std::fmt::Debug for ConflictResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("remote", &self.remote.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemoteStore;
    use chrono::Utc;
    use milkrecord_core::{Record, SyncStatus};
    use serde_json::json;

    fn seeded(version: i64) -> Arc<MemoryRemoteStore> {
        let remote = Arc::new(MemoryRemoteStore::new());
        let now = Utc::now();
        remote.put(
            RecordKind::Customers,
            Record {
                id: "c1".into(),
                device_id: "device-b".into(),
                payload: json!({"name": "Sita"}),
                version,
                sync_status: SyncStatus::Synced,
                created_at: now,
                updated_at: now,
            },
        );
        remote
    }

    #[tokio::test]
    async fn test_remote_ahead_conflicts() {
        let resolver = ConflictResolver::new(seeded(5), Duration::from_secs(1));

        let result = resolver.check_conflict(RecordKind::Customers, "c1", 2).await.unwrap();
        assert!(result.has_conflict);
        assert_eq!(result.remote_version, Some(5));
        assert_eq!(result.remote_payload, Some(json!({"name": "Sita"})));
    }

    #[tokio::test]
    async fn test_equal_versions_do_not_conflict() {
        let resolver = ConflictResolver::new(seeded(3), Duration::from_secs(1));
        let result = resolver.check_conflict(RecordKind::Customers, "c1", 3).await.unwrap();
        assert!(!result.has_conflict);
    }

    #[tokio::test]
    async fn test_absent_row_does_not_conflict() {
        let resolver = ConflictResolver::new(seeded(3), Duration::from_secs(1));
        let result = resolver.check_conflict(RecordKind::Sales, "c1", 1).await.unwrap();
        assert_eq!(result, ConflictResult::absent());
    }

    #[tokio::test]
    async fn test_read_failure_is_an_error() {
        let remote = seeded(1);
        remote.fail_gets(true);
        let resolver = ConflictResolver::new(remote, Duration::from_secs(1));

        assert!(resolver.check_conflict(RecordKind::Customers, "c1", 1).await.is_err());
    }
}
