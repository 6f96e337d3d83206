//! Error types for the logging core and its storage

use thiserror::Error;

/// Persistence failure
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A stored row could not be decoded. Not recoverable by retrying.
    #[error("corrupt data in store: {reason}")]
    Corrupt { reason: String },

    #[error("{0} has not been saved yet")]
    Unsaved(&'static str),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The write disagrees with what is already stored; reload and retry
    #[error("stale write rejected: {reason}")]
    Conflict { reason: String },
}

impl StorageError {
    /// Only corruption should take the application down
    pub fn is_fatal(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::FromSqlConversionFailure(col, ty, cause) => StorageError::Corrupt {
                reason: format!("column {col} ({ty}): {cause}"),
            },
            other => StorageError::Sqlite(other),
        }
    }
}

/// Failure of a set-logging transition
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a positive start weight is required for the first set")]
    StartWeightRequired,

    #[error("exercise is already complete")]
    AlreadyComplete,

    #[error("rest interval is still running")]
    RestInProgress,

    #[error("invalid weight: {0}")]
    InvalidWeight(f64),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Rejected template input
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("workout needs at least one exercise")]
    NoExercises,

    #[error("exercise '{name}' appears more than once")]
    DuplicateExercise { name: String },

    #[error("exercise needs at least one set")]
    NoSets,

    #[error("set {set} has zero target reps")]
    ZeroReps { set: usize },

    #[error("invalid exercise spec: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
