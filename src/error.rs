use thiserror::Error;

/// Errors raised by the submission store and its collaborators.
///
/// Guard violations and validation failures are not errors: lifecycle calls
/// report them through their return values.
#[derive(Debug, Error)]
pub enum FormStoreError {
    #[error("Unknown submission status code: {code}")]
    UnknownStatus { code: i64 },

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Unknown record kind '{kind}'")]
    UnknownRecordKind { kind: String },

    #[error("Invalid filter: {reason}")]
    InvalidFilter { reason: String },

    #[error("Invalid field rule '{rule}': {reason}")]
    InvalidRule { rule: String, reason: String },

    #[error("Submission #{id} is {status} and can no longer be changed")]
    Locked { id: i64, status: String },

    #[error("Submission #{id} already has a data record attached")]
    DataAttached { id: i64 },

    #[error("Storage error: {reason}")]
    Storage { reason: String },

    #[error("Invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[cfg(feature = "database")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl FormStoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        FormStoreError::NotFound { entity, id }
    }

    pub fn storage(reason: impl Into<String>) -> Self {
        FormStoreError::Storage {
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = FormStoreError> = std::result::Result<T, E>;
