use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

/// Result alias of the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures of the MongoDB backend, folded into the storage error at the
/// module boundary.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required variable is unset.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The driver rejected the connection string.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client construction failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings tried.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Creating a token index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Inserting a game failed.
    #[error("failed to insert game `{id}`")]
    InsertGame {
        /// Game id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Replacing a game failed.
    #[error("failed to replace game `{id}`")]
    ReplaceGame {
        /// Game id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The stored game moved past the expected revision.
    #[error("game `{id}` changed concurrently (expected revision {expected})")]
    RevisionConflict {
        /// Game written.
        id: Uuid,
        /// Revision the writer read.
        expected: u64,
    },
    /// A unique index rejected the write.
    #[error("{kind} `{key}` already exists")]
    Duplicate {
        /// What the key identifies.
        kind: &'static str,
        /// Offending value.
        key: String,
    },
    /// Reading a game failed.
    #[error("failed to load game `{id}`")]
    LoadGame {
        /// Game id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing games failed.
    #[error("failed to list games")]
    ListGames {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Token lookup failed.
    #[error("failed to look up game by join token")]
    FindByToken {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Inserting a session failed.
    #[error("failed to insert player session")]
    InsertSession {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a session failed.
    #[error("failed to load player session")]
    LoadSession {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A stored document does not decode.
    #[error("stored document `{id}` is malformed: {reason}")]
    MalformedDocument {
        /// Document id as stored.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Whether `err` is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}
