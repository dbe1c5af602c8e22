use std::error::Error;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend unreachable or failing.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable failure description.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A vote already exists for this `(session, photo, voter)` tuple.
    #[error("duplicate vote for photo {photo} by `{voter_id}`")]
    DuplicateVote {
        /// Photo index of the offending insert.
        photo: u16,
        /// Identity that already voted.
        voter_id: String,
    },
    /// A vote insert referenced a generation the session has moved past.
    #[error("stale vote: session is at generation {expected}, vote carries {got}")]
    StaleGeneration {
        /// Generation currently stored on the session.
        expected: u32,
        /// Generation carried by the rejected vote.
        got: u32,
    },
    /// A conditional session update lost the optimistic-concurrency race.
    #[error("session version conflict (expected {expected}, actual {actual})")]
    VersionConflict {
        /// Version the caller based its update on.
        expected: u64,
        /// Version actually stored.
        actual: u64,
    },
    /// The referenced session does not exist in storage.
    #[error("session `{0}` not found in storage")]
    SessionMissing(Uuid),
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
