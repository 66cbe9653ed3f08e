//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Remote        │  │     Local               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  DatabaseError          │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  InvalidPayload         │ │
//! │  │  ConfigLoad/Save│  │  RemoteRejected │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Taxonomy at the edges:                                                │
//! │  • Local storage failure  → surfaced by save()                         │
//! │  • Connectivity failure   → routine, never surfaced by save()          │
//! │  • Remote rejection       → record marked failed, retried every pass   │
//! │  • Version conflict       → not an error: a PushOutcome                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote or probe URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Remote store URL / key not configured.
    #[error("Remote store not configured. Set SUPABASE_URL and SUPABASE_KEY.")]
    RemoteNotConfigured,

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// Could not reach the remote store.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Remote call exceeded its deadline.
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// Remote store answered with an error status.
    #[error("Remote store rejected request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// Remote row could not be read back as a record.
    #[error("Invalid remote row: {0}")]
    InvalidRemoteRow(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local store operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Payload failed validation or does not match its kind.
    #[error("{0}")]
    InvalidPayload(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync agent error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<milkrecord_db::DbError> for SyncError {
    fn from(err: milkrecord_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<milkrecord_core::CoreError> for SyncError {
    fn from(err: milkrecord_core::CoreError) -> Self {
        SyncError::InvalidPayload(err.to_string())
    }
}

impl From<milkrecord_core::ValidationError> for SyncError {
    fn from(err: milkrecord_core::ValidationError) -> Self {
        SyncError::InvalidPayload(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            SyncError::RemoteRejected {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the next pass has a reasonable chance of succeeding.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - HTTP 408, 429 and 5xx from the remote store
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Remote 4xx (bad row shape, permission denied)
    /// - Invalid payloads
    ///
    /// Every `failed` record is retried each pass regardless; this only
    /// decides how loudly the failure is reported.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::RemoteRejected { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::RemoteNotConfigured
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
