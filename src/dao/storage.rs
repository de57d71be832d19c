use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend could not be reached or rejected the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable summary of the failure.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A conditional write found a different revision than the one it read.
    #[error("game `{game_id}` changed concurrently (expected revision {expected})")]
    RevisionConflict {
        /// Game whose write was refused.
        game_id: Uuid,
        /// Revision the writer based its changes on.
        expected: u64,
    },
    /// An insert collided with an existing record.
    #[error("{kind} `{key}` already exists")]
    Duplicate {
        /// Kind of record (e.g. "game", "session").
        kind: &'static str,
        /// Key that collided.
        key: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
