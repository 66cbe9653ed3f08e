//! # Remote Store
//!
//! The cloud side of sync, reduced to the two calls the engine needs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         RemoteStore trait                               │
//! │                                                                         │
//! │   get(kind, id)      → Option<StoredRecord>   (conflict check)         │
//! │   upsert(kind, rec)  → StoredRecord           (merge on id)            │
//! │                                                                         │
//! │   ┌──────────────────────────┐      ┌──────────────────────────┐       │
//! │   │ SupabaseRemoteStore      │      │ MemoryRemoteStore        │       │
//! │   │ PostgREST over reqwest   │      │ HashMap, failure toggles │       │
//! │   └──────────────────────────┘      └──────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every call made by the engine goes through [`bounded`], so a hung remote
//! can never stall a pass indefinitely.

mod memory;
mod supabase;

pub use memory::MemoryRemoteStore;
pub use supabase::SupabaseRemoteStore;

use async_trait::async_trait;
use milkrecord_core::{RecordKind, StoredRecord};
use std::future::Future;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// A remote copy of the six synced tables.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches the remote copy of one record.
    async fn get(&self, kind: RecordKind, id: &str) -> SyncResult<Option<StoredRecord>>;

    /// Inserts or replaces one record, keyed on id. Returns the stored row.
    async fn upsert(&self, kind: RecordKind, record: &StoredRecord) -> SyncResult<StoredRecord>;

    /// Releases held resources.
    async fn close(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Runs a remote call under a deadline.
pub async fn bounded<T, F>(timeout: Duration, call: F) -> SyncResult<T>
where
    F: Future<Output = SyncResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bounded_times_out() {
        let result: SyncResult<()> = bounded(Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(SyncError::Timeout(d)) if d == Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
