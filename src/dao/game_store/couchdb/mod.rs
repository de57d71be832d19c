mod config;
mod error;
mod models;
mod store;

pub use config::CouchConfig;
pub use error::CouchDaoError;
pub use store::CouchGameStore;

use crate::dao::storage::StorageError;

impl From<CouchDaoError> for StorageError {
    fn from(err: CouchDaoError) -> Self {
        match err {
            CouchDaoError::RevisionConflict { game_id, expected } => {
                StorageError::RevisionConflict { game_id, expected }
            }
            CouchDaoError::Duplicate { kind, key } => StorageError::Duplicate { kind, key },
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
