/// In-memory store used as the default backend.
pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{SessionEntity, SessionListItemEntity, VoteEntity};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for sessions and vote records.
///
/// The core needs exactly two non-trivial guarantees from a backend:
/// atomic conditional read-modify-write of the session row
/// ([`SessionStore::update_session`]) and append-only vote inserts that
/// enforce `(session, photo, voter)` uniqueness at the write boundary
/// ([`SessionStore::insert_vote`]).
pub trait SessionStore: Send + Sync {
    /// Persist a freshly created session.
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Conditionally replace a session; fails with a version conflict when
    /// the stored version no longer matches `expected_version`.
    fn update_session(
        &self,
        expected_version: u64,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Look up a session by id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;
    /// List all known sessions.
    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>>;
    /// Delete a session together with all its vote records.
    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Insert a vote, rejecting duplicates and stale generations.
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete-then-insert path reserved for an administrator changing their
    /// own vote on the current photo.
    fn replace_admin_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// All votes recorded for one `(session, photo)` pair.
    fn votes_for_photo(
        &self,
        session_id: Uuid,
        photo: u16,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// All votes recorded for a session, across photos.
    fn votes_for_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// Remove every vote for one photo (restart-photo); returns the count.
    fn delete_votes_for_photo(
        &self,
        session_id: Uuid,
        photo: u16,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Remove every vote for a session (back-to-start); returns the count.
    fn delete_votes_for_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Cheap liveness probe used by the health endpoint.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
