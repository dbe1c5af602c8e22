use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{SessionEntity, SessionListItemEntity, VoteEntity};
use crate::dao::session_store::SessionStore;
use crate::dao::storage::{StorageError, StorageResult};

/// Process-local [`SessionStore`] keeping sessions and votes in dashmaps.
///
/// Vote vectors are mutated only while holding the owning map entry, which
/// gives the same write-boundary atomicity a database unique index would.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<DashMap<Uuid, SessionEntity>>,
    votes: Arc<DashMap<Uuid, Vec<VoteEntity>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn session_generation(&self, id: Uuid) -> StorageResult<u32> {
        self.sessions
            .get(&id)
            .map(|entry| entry.generation)
            .ok_or(StorageError::SessionMissing(id))
    }
}

impl SessionStore for MemorySessionStore {
    fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            sessions.insert(session.id, session);
            Ok(())
        })
    }

    fn update_session(
        &self,
        expected_version: u64,
        session: SessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            let mut entry = sessions
                .get_mut(&session.id)
                .ok_or(StorageError::SessionMissing(session.id))?;
            if entry.version != expected_version {
                return Err(StorageError::VersionConflict {
                    expected: expected_version,
                    actual: entry.version,
                });
            }
            *entry = session;
            Ok(())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let sessions = self.sessions.clone();
        Box::pin(async move { Ok(sessions.get(&id).map(|entry| entry.clone())) })
    }

    fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
        let sessions = self.sessions.clone();
        Box::pin(async move {
            let mut items: Vec<SessionListItemEntity> = sessions
                .iter()
                .map(|entry| entry.value().clone().into())
                .collect();
            items.sort_by_key(|item| item.created_at);
            Ok(items)
        })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let sessions = self.sessions.clone();
        let votes = self.votes.clone();
        Box::pin(async move {
            votes.remove(&id);
            Ok(sessions.remove(&id).is_some())
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let generation = store.session_generation(vote.session_id)?;
            if vote.generation != generation {
                return Err(StorageError::StaleGeneration {
                    expected: generation,
                    got: vote.generation,
                });
            }

            let mut entry = store.votes.entry(vote.session_id).or_default();
            if entry
                .iter()
                .any(|existing| existing.photo == vote.photo && existing.voter_id == vote.voter_id)
            {
                return Err(StorageError::DuplicateVote {
                    photo: vote.photo,
                    voter_id: vote.voter_id,
                });
            }
            entry.push(vote);
            Ok(())
        })
    }

    fn replace_admin_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let generation = store.session_generation(vote.session_id)?;
            if vote.generation != generation {
                return Err(StorageError::StaleGeneration {
                    expected: generation,
                    got: vote.generation,
                });
            }

            let mut entry = store.votes.entry(vote.session_id).or_default();
            entry.retain(|existing| {
                !(existing.photo == vote.photo && existing.voter_id == vote.voter_id)
            });
            entry.push(vote);
            Ok(())
        })
    }

    fn votes_for_photo(
        &self,
        session_id: Uuid,
        photo: u16,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let votes = self.votes.clone();
        Box::pin(async move {
            Ok(votes
                .get(&session_id)
                .map(|entry| {
                    entry
                        .iter()
                        .filter(|vote| vote.photo == photo)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn votes_for_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let votes = self.votes.clone();
        Box::pin(async move {
            Ok(votes
                .get(&session_id)
                .map(|entry| entry.clone())
                .unwrap_or_default())
        })
    }

    fn delete_votes_for_photo(
        &self,
        session_id: Uuid,
        photo: u16,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let votes = self.votes.clone();
        Box::pin(async move {
            let Some(mut entry) = votes.get_mut(&session_id) else {
                return Ok(0);
            };
            let before = entry.len();
            entry.retain(|vote| vote.photo != photo);
            Ok((before - entry.len()) as u64)
        })
    }

    fn delete_votes_for_session(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let votes = self.votes.clone();
        Box::pin(async move {
            Ok(votes
                .remove(&session_id)
                .map(|(_, removed)| removed.len() as u64)
                .unwrap_or(0))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::models::{DemographicsEntity, SessionPhaseEntity, VoteResponseEntity};

    fn session(id: Uuid) -> SessionEntity {
        let now = SystemTime::now();
        SessionEntity {
            id,
            name: "turma piloto".into(),
            scheduled_for: None,
            created_at: now,
            updated_at: now,
            phase: SessionPhaseEntity::Active,
            current_photo: 1,
            photo_count: 30,
            photo_started_at: Some(now),
            photo_duration_secs: 30,
            generation: 0,
            version: 0,
        }
    }

    fn vote(session_id: Uuid, photo: u16, voter: &str, generation: u32) -> VoteEntity {
        VoteEntity {
            id: Uuid::new_v4(),
            session_id,
            photo,
            voter_id: voter.into(),
            response: VoteResponseEntity::Deferido,
            elapsed_ms: 1200,
            demographics: DemographicsEntity::default(),
            is_admin_vote: false,
            generation,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_vote_is_rejected() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        store.save_session(session(id)).await.unwrap();

        store.insert_vote(vote(id, 1, "p1", 0)).await.unwrap();
        let err = store.insert_vote(vote(id, 1, "p1", 0)).await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateVote { photo: 1, .. }));

        // Same voter on a different photo is fine.
        store.insert_vote(vote(id, 2, "p1", 0)).await.unwrap();
    }

    #[tokio::test]
    async fn stale_generation_vote_is_rejected() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        let mut entity = session(id);
        entity.generation = 2;
        store.save_session(entity).await.unwrap();

        let err = store.insert_vote(vote(id, 1, "p1", 1)).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::StaleGeneration {
                expected: 2,
                got: 1
            }
        ));
    }

    #[tokio::test]
    async fn replace_admin_vote_swaps_in_place() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        store.save_session(session(id)).await.unwrap();

        let mut first = vote(id, 1, "admin", 0);
        first.is_admin_vote = true;
        store.replace_admin_vote(first).await.unwrap();

        let mut second = vote(id, 1, "admin", 0);
        second.is_admin_vote = true;
        second.response = VoteResponseEntity::Indeferido;
        store.replace_admin_vote(second).await.unwrap();

        let recorded = store.votes_for_photo(id, 1).await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].response, VoteResponseEntity::Indeferido);
    }

    #[tokio::test]
    async fn deleting_photo_votes_leaves_other_photos_alone() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        store.save_session(session(id)).await.unwrap();

        store.insert_vote(vote(id, 1, "p1", 0)).await.unwrap();
        store.insert_vote(vote(id, 1, "p2", 0)).await.unwrap();
        store.insert_vote(vote(id, 2, "p1", 0)).await.unwrap();

        assert_eq!(store.delete_votes_for_photo(id, 1).await.unwrap(), 2);
        assert!(store.votes_for_photo(id, 1).await.unwrap().is_empty());
        assert_eq!(store.votes_for_photo(id, 2).await.unwrap().len(), 1);

        assert_eq!(store.delete_votes_for_session(id).await.unwrap(), 1);
        assert!(store.votes_for_session(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditional_update_detects_lost_race() {
        let store = MemorySessionStore::new();
        let id = Uuid::new_v4();
        store.save_session(session(id)).await.unwrap();

        let mut updated = session(id);
        updated.version = 1;
        store.update_session(0, updated.clone()).await.unwrap();

        // A second writer still holding version 0 must lose.
        let err = store.update_session(0, updated).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict {
                expected: 0,
                actual: 1
            }
        ));
    }
}
