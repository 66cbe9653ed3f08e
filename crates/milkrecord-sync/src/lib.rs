//! # milkrecord-sync: Offline-First Sync Engine for MilkRecord
//!
//! Every write lands in the local SQLite store first and is pushed to the
//! shared Supabase store when the internet is reachable. Anything that
//! could not be pushed is picked up by a background loop.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Engine Architecture                         │
//! │                                                                         │
//! │   caller                                                                │
//! │     │ save(payload)                                                     │
//! │     ▼                                                                   │
//! │  ┌────────────────┐   local upsert    ┌──────────────────────────────┐ │
//! │  │ RecordWriter   │──────────────────►│ milkrecord-db                │ │
//! │  │ (writer.rs)    │                   │ sync_records / sync_log /    │ │
//! │  └───────┬────────┘                   │ device_identity              │ │
//! │          │ online?                    └──────────────▲───────────────┘ │
//! │          ▼                                           │ list_pending    │
//! │  ┌────────────────┐                   ┌──────────────┴───────────────┐ │
//! │  │ Uplink         │◄──────────────────│ SyncWorker (worker.rs)       │ │
//! │  │ (uplink.rs)    │   every pass      │ tokio interval + shutdown    │ │
//! │  └───────┬────────┘                   └──────────────────────────────┘ │
//! │          │ check_conflict, upsert                                       │
//! │          ▼                                                              │
//! │  ┌────────────────┐   ┌────────────────┐   ┌────────────────────────┐  │
//! │  │ Conflict       │   │ RemoteStore    │   │ ConnectivityProbe      │  │
//! │  │ Resolver       │──►│ Supabase /     │   │ HTTP (≤3s) / static    │  │
//! │  │ (versions)     │   │ in-memory      │   │                        │  │
//! │  └────────────────┘   └────────────────┘   └────────────────────────┘  │
//! │                                                                         │
//! │  SyncAgent (agent.rs) assembles all of the above and hands out a       │
//! │  SyncAgentHandle: writer, status, force_sync, reset_conflicts, logs.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent`, handle, builder, event emitters
//! - [`config`] - TOML + environment configuration
//! - [`connectivity`] - Internet reachability probe
//! - [`device`] - Per-installation device identity
//! - [`error`] - Sync error types
//! - [`remote`] - Remote store trait, Supabase and in-memory adapters
//! - [`resolver`] - Version-based conflict detection
//! - [`uplink`] - The push routine shared by writer and worker
//! - [`worker`] - Background sync loop
//! - [`writer`] - Local-first write path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use milkrecord_sync::{SyncAgentBuilder, SyncConfig};
//! use milkrecord_core::Customer;
//!
//! let config = SyncConfig::load_or_default(None);
//! let handle = SyncAgentBuilder::new(config)
//!     .with_database(database)
//!     .build()?
//!     .start()
//!     .await?;
//!
//! let result = handle.writer().save(None, customer).await;
//! println!("{}", result.message); // "Saved locally"
//!
//! let status = handle.status().await?;
//! println!("Pending: {}", status.total_pending());
//!
//! handle.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod device;
pub mod error;
pub mod remote;
pub mod resolver;
pub mod uplink;
pub mod worker;
pub mod writer;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{
    NoOpEmitter, SyncAgent, SyncAgentBuilder, SyncAgentHandle, SyncEventEmitter,
    SyncStatusReport, TracingEmitter,
};
pub use config::SyncConfig;
pub use connectivity::{ConnectivityProbe, HttpProbe, StaticProbe};
pub use device::DeviceIdentity;
pub use error::{SyncError, SyncResult};
pub use remote::{MemoryRemoteStore, RemoteStore, SupabaseRemoteStore};
pub use resolver::ConflictResolver;
pub use uplink::{PushOutcome, Uplink};
pub use worker::{PassReport, SyncWorker, TableReport};
pub use writer::RecordWriter;
