//! # Error Types
//!
//! Domain-specific error types for milkrecord-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  milkrecord-core errors (this file)                                    │
//! │  ├── CoreError        - Envelope / payload decoding failures           │
//! │  └── ValidationError  - Payload rule violations                        │
//! │                                                                         │
//! │  milkrecord-db errors (separate crate)                                 │
//! │  └── DbError          - Local store failures                           │
//! │                                                                         │
//! │  milkrecord-sync errors (separate crate)                               │
//! │  └── SyncError        - Config, remote, timeout failures               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → SaveResult.message    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown record type / table name.
    ///
    /// ## When This Occurs
    /// - A route passes a table name that is not one of the synced kinds
    /// - A corrupted row carries an unexpected `record_type`
    #[error("Unknown record type: {0}")]
    UnknownRecordKind(String),

    /// Unknown sync status string.
    #[error("Unknown sync status: {0}")]
    UnknownSyncStatus(String),

    /// Payload JSON does not match the typed payload for its kind.
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a payload doesn't meet business requirements.
/// The write path checks them before anything touches the local store.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., phone number with letters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Too many entries in a collection field.
    #[error("{field} cannot have more than {max} entries")]
    TooMany { field: String, max: usize },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
