use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

/// Result alias of the CouchDB backend.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Everything the CouchDB backend can fail with, before it is folded into
/// the backend-agnostic storage error.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required variable is unset.
    #[error("environment variable `{var}` is required for the couch backend")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// `reqwest` rejected the client configuration.
    #[error("could not build the HTTP client for CouchDB")]
    ClientBuilder {
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// `HEAD` on the database failed.
    #[error("probing database `{database}` failed")]
    DatabaseQuery {
        /// Database name.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// `PUT` on the database failed.
    #[error("creating database `{database}` failed")]
    DatabaseCreate {
        /// Database name.
        database: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// The database probe or creation got an unexpected status.
    #[error("database `{database}` answered {status}")]
    DatabaseStatus {
        /// Database name.
        database: String,
        /// Status CouchDB answered.
        status: StatusCode,
    },
    /// A document request never reached the server.
    #[error("request to `{path}` could not be sent")]
    RequestSend {
        /// Request path below the server root.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// A document request got an unexpected status.
    #[error("`{path}` answered {status}")]
    RequestStatus {
        /// Request path below the server root.
        path: String,
        /// Status CouchDB answered.
        status: StatusCode,
    },
    /// The body is not JSON.
    #[error("body returned by `{path}` is not valid JSON")]
    DecodeResponse {
        /// Request path below the server root.
        path: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },
    /// The JSON does not match the document type.
    #[error("document from `{path}` does not match the expected shape")]
    DeserializeValue {
        /// Request path below the server root.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// CouchDB answered 409 on a write.
    #[error("stale `_rev` for `{path}`")]
    Conflict {
        /// Document path.
        path: String,
    },
    /// The stored game moved past the expected revision.
    #[error("game `{game_id}` is no longer at revision {expected}")]
    RevisionConflict {
        /// Game written.
        game_id: Uuid,
        /// Revision the writer read.
        expected: u64,
    },
    /// A unique key is already taken.
    #[error("{kind} `{key}` already exists")]
    Duplicate {
        /// What the key identifies.
        kind: &'static str,
        /// Offending value.
        key: String,
    },
    /// A `_id` does not follow the `<prefix>::<uuid>` shape.
    #[error("document id `{doc_id}` is malformed: {kind}")]
    InvalidDocId {
        /// The offending `_id`.
        doc_id: String,
        /// What is wrong with it.
        kind: &'static str,
    },
}
