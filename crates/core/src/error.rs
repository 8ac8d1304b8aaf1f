//! Unified error types for legisync.
//!
//! Callers match on the variant to tell a rejected payload apart from a
//! store failure or a cache misconfiguration.

use std::path::PathBuf;

use tokio_rusqlite::rusqlite;

/// Unified error type for the store, caches and reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Payload carried a status other than `OK`.
    #[error("STATUS_ERROR: payload status = \"{0}\"")]
    Status(String),

    /// Payload could not be decoded into a known record.
    #[error("INVALID_PAYLOAD: {0}")]
    InvalidPayload(String),

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Cache root is missing or not a writable directory.
    #[error("CACHE_ERROR: {path}: {reason}")]
    CacheDir { path: PathBuf, reason: String },

    /// Writing a cache entry failed.
    #[error("CACHE_ERROR: write {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Binary document could not be decoded or attached.
    #[error("DOCUMENT_ERROR: {0}")]
    Document(String),

    /// Dataset archive could not be read.
    #[error("ARCHIVE_ERROR: {0}")]
    Archive(String),

    /// Dataset archive hash differs from the expected value.
    #[error("HASH_MISMATCH: expected {expected}, archive has {actual}")]
    HashMismatch { expected: String, actual: String },
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidPayload(err.to_string())
    }
}

impl Error {
    /// Whether the error came from a rejected payload rather than local state.
    pub fn is_payload(&self) -> bool {
        matches!(self, Error::Status(_) | Error::InvalidPayload(_))
    }
}
