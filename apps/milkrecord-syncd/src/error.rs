//! Error type for daemon commands.

use milkrecord_db::DbError;
use milkrecord_sync::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error("Could not create data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error("Seeding failed for {name}: {message}")]
    SeedFailed { name: String, message: String },
}

pub type CliResult<T> = Result<T, CliError>;
