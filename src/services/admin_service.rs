//! Administrator-driven session lifecycle: start, freeze, advance, restart,
//! reset and the admin's own vote.

use std::{sync::Arc, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::common::{PhotoTallySnapshot, SessionPhaseSnapshot, VoteValue},
    error::ServiceError,
    services::{session_service, sse_events, timer},
    state::{
        SessionRuntime, SharedState,
        state_machine::{SessionEvent, SessionPhase},
        transitions::run_transition_with_broadcast,
    },
};

/// Reserved voter identity for the administrator's own verdicts.
pub const ADMIN_VOTER_ID: &str = "admin";

/// Open the first photo window of a waiting session.
pub async fn start_session(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionPhaseSnapshot, ServiceError> {
    let session = state.require_session(id)?;
    let now = SystemTime::now();

    let store = state.store();
    let session_for_work = session.clone();
    run_transition_with_broadcast(state, &session, SessionEvent::Start, |plan| async move {
        let entity = session_for_work.entity_for_plan(&plan, Some(now)).await;
        store
            .update_session(plan.version_next - 1, entity)
            .await
            .map_err(ServiceError::from)
    })
    .await?;

    session
        .with_meta_mut(|meta| {
            meta.photo_started_at = Some(now);
            meta.updated_at = now;
        })
        .await;

    info!(session_id = %id, "session started");
    timer::spawn_photo_timer(state.clone(), session.clone());
    Ok(session_service::phase_snapshot(state, &session, None).await)
}

/// Freeze the current photo's votes and show its results.
///
/// Calling this while results are already shown is a no-op so that a manual
/// freeze racing the timer never surfaces an error.
pub async fn show_results(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionPhaseSnapshot, ServiceError> {
    let session = state.require_session(id)?;
    freeze_current_photo(state, &session, None).await?;
    Ok(session_service::phase_snapshot(state, &session, None).await)
}

/// Advance from results to the next photo, or complete the session after
/// the last one.
pub async fn next_photo(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionPhaseSnapshot, ServiceError> {
    let session = state.require_session(id)?;
    let now = SystemTime::now();

    let store = state.store();
    let session_for_work = session.clone();
    let (_, plan) = run_transition_with_broadcast(
        state,
        &session,
        SessionEvent::NextPhoto,
        |plan| async move {
            let started_at = (plan.to == SessionPhase::Active).then_some(now);
            let entity = session_for_work.entity_for_plan(&plan, started_at).await;
            store
                .update_session(plan.version_next - 1, entity)
                .await
                .map_err(ServiceError::from)
        },
    )
    .await?;

    session
        .with_meta_mut(|meta| {
            meta.photo_started_at = (plan.to == SessionPhase::Active).then_some(now);
            meta.updated_at = now;
        })
        .await;

    if plan.to == SessionPhase::Active {
        info!(session_id = %id, photo = plan.photo_to, "advanced to next photo");
        timer::spawn_photo_timer(state.clone(), session.clone());
    } else {
        info!(session_id = %id, "session completed");
    }
    Ok(session_service::phase_snapshot(state, &session, None).await)
}

/// Reopen the current photo with a fresh window, voiding its votes.
pub async fn restart_current_photo(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionPhaseSnapshot, ServiceError> {
    let session = state.require_session(id)?;
    let now = SystemTime::now();
    let photo = session.current_photo().await;

    let store = state.store();
    let session_for_work = session.clone();
    run_transition_with_broadcast(
        state,
        &session,
        SessionEvent::RestartPhoto,
        |plan| async move {
            // Votes go first: if the conditional update then fails, the
            // machine and the store stay on the same version, and the
            // deleted votes were about to be voided anyway.
            store
                .delete_votes_for_photo(session_for_work.id, photo)
                .await?;
            let entity = session_for_work.entity_for_plan(&plan, Some(now)).await;
            store.update_session(plan.version_next - 1, entity).await?;
            Ok::<_, ServiceError>(())
        },
    )
    .await?;

    // A vote can slip in between the delete and the generation bump; sweep
    // it now that stale inserts are rejected.
    if let Err(err) = state.store().delete_votes_for_photo(id, photo).await {
        warn!(session_id = %id, photo, error = %err, "failed to sweep votes that raced the restart");
    }

    session
        .with_meta_mut(|meta| {
            meta.photo_started_at = Some(now);
            meta.updated_at = now;
        })
        .await;

    let generation = session.generation().await;
    info!(session_id = %id, photo, generation, "photo restarted");
    sse_events::broadcast_session_reset(state, id, generation);
    timer::spawn_photo_timer(state.clone(), session.clone());
    Ok(session_service::phase_snapshot(state, &session, None).await)
}

/// Abort the walkthrough and return the session to the waiting room,
/// voiding every recorded vote. Valid from any phase, including completed.
pub async fn back_to_start(
    state: &SharedState,
    id: Uuid,
) -> Result<SessionPhaseSnapshot, ServiceError> {
    let session = state.require_session(id)?;
    let now = SystemTime::now();

    let store = state.store();
    let session_for_work = session.clone();
    run_transition_with_broadcast(
        state,
        &session,
        SessionEvent::BackToStart,
        |plan| async move {
            store.delete_votes_for_session(session_for_work.id).await?;
            let entity = session_for_work.entity_for_plan(&plan, None).await;
            store.update_session(plan.version_next - 1, entity).await?;
            Ok::<_, ServiceError>(())
        },
    )
    .await?;

    if let Err(err) = state.store().delete_votes_for_session(id).await {
        warn!(session_id = %id, error = %err, "failed to sweep votes that raced the reset");
    }

    session
        .with_meta_mut(|meta| {
            meta.photo_started_at = None;
            meta.updated_at = now;
        })
        .await;

    let generation = session.generation().await;
    info!(session_id = %id, generation, "session returned to waiting room");
    sse_events::broadcast_session_reset(state, id, generation);
    Ok(session_service::phase_snapshot(state, &session, None).await)
}

/// Record or replace the administrator's verdict on the current photo.
pub async fn admin_vote(
    state: &SharedState,
    id: Uuid,
    response: VoteValue,
) -> Result<PhotoTallySnapshot, ServiceError> {
    let session = state.require_session(id)?;
    let machine = session.state().await;
    if machine.phase != SessionPhase::Active {
        return Err(ServiceError::InvalidState(format!(
            "the admin verdict is only accepted while a photo is active (phase is {:?})",
            machine.phase
        )));
    }

    let vote = crate::dao::models::VoteEntity {
        id: Uuid::new_v4(),
        session_id: id,
        photo: machine.current_photo,
        voter_id: ADMIN_VOTER_ID.to_string(),
        response: response.into(),
        elapsed_ms: 0,
        demographics: Default::default(),
        is_admin_vote: true,
        generation: machine.generation,
        created_at: SystemTime::now(),
    };
    state.store().replace_admin_vote(vote).await?;

    let tally = session_service::live_tally(state, &session).await?;
    sse_events::broadcast_vote_recorded(state, id, machine.current_photo, tally.clone());
    Ok(tally)
}

/// Timer-driven freeze of an expired photo window.
///
/// The caller passes the photo and generation it armed the timer for; when
/// either moved on in the meantime the expiry is stale and nothing happens.
pub async fn finish_photo_after_timeout(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    photo: u16,
    generation: u32,
) -> Result<(), ServiceError> {
    let machine = session.state().await;
    if machine.phase != SessionPhase::Active
        || machine.current_photo != photo
        || machine.generation != generation
    {
        return Ok(());
    }
    match freeze_current_photo(state, session, Some((photo, generation))).await {
        // Lost the race against an admin action or a restart; nothing to do.
        Err(ServiceError::InvalidState(_)) => Ok(()),
        other => other,
    }
}

/// Run the `ShowResults` transition, tolerating a lost race against another
/// freeze, then broadcast the frozen tally.
///
/// `armed` carries the `(photo, generation)` a timer expiry was set up for;
/// it is re-verified under the transition gate so an expiry that interleaves
/// with a restart can never close the reopened window.
async fn freeze_current_photo(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    armed: Option<(u16, u32)>,
) -> Result<(), ServiceError> {
    let store = state.store();
    let session_for_work = session.clone();
    let meta = session.read_meta().await;
    let outcome = run_transition_with_broadcast(
        state,
        session,
        SessionEvent::ShowResults,
        |plan| async move {
            if let Some((photo, generation)) = armed {
                let machine = session_for_work.state().await;
                if machine.current_photo != photo || machine.generation != generation {
                    return Err(ServiceError::InvalidState(
                        "the photo window was reopened after this expiry was armed".into(),
                    ));
                }
            }
            let entity = session_for_work
                .entity_for_plan(&plan, meta.photo_started_at)
                .await;
            store
                .update_session(plan.version_next - 1, entity)
                .await
                .map_err(ServiceError::from)
        },
    )
    .await;

    match outcome {
        Ok((_, plan)) => {
            let tally = session_service::live_tally(state, session).await?;
            info!(
                session_id = %session.id,
                photo = plan.photo_to,
                consensus_pct = tally.consensus_pct,
                "photo results frozen"
            );
            sse_events::broadcast_photo_finalized(state, session.id, plan.photo_to, tally);
            Ok(())
        }
        Err(ServiceError::InvalidState(_))
            if session.phase().await == SessionPhase::ShowingResults =>
        {
            // Another freeze won the race; results are already up.
            Ok(())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{SessionEntity, SessionListItemEntity, VoteEntity},
            session_store::{SessionStore, memory::MemorySessionStore},
            storage::{StorageError, StorageResult},
        },
        dto::{
            phase::VisibleSessionPhase,
            session::CreateSessionRequest,
        },
        state::{AppState, session::DemographicProfile},
    };

    /// Store double whose vote deletions can be made to fail on demand.
    struct FailingDeleteStore {
        inner: MemorySessionStore,
        fail_deletes: AtomicBool,
    }

    impl FailingDeleteStore {
        fn new() -> Self {
            Self {
                inner: MemorySessionStore::default(),
                fail_deletes: AtomicBool::new(false),
            }
        }

        fn delete_failure(&self) -> StorageError {
            StorageError::unavailable(
                "vote delete failed".into(),
                std::io::Error::other("connection dropped"),
            )
        }
    }

    impl SessionStore for FailingDeleteStore {
        fn save_session(&self, session: SessionEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_session(session)
        }

        fn update_session(
            &self,
            expected_version: u64,
            session: SessionEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.update_session(expected_version, session)
        }

        fn find_session(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
            self.inner.find_session(id)
        }

        fn list_sessions(&self) -> BoxFuture<'static, StorageResult<Vec<SessionListItemEntity>>> {
            self.inner.list_sessions()
        }

        fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_session(id)
        }

        fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.insert_vote(vote)
        }

        fn replace_admin_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.replace_admin_vote(vote)
        }

        fn votes_for_photo(
            &self,
            session_id: Uuid,
            photo: u16,
        ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
            self.inner.votes_for_photo(session_id, photo)
        }

        fn votes_for_session(
            &self,
            session_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
            self.inner.votes_for_session(session_id)
        }

        fn delete_votes_for_photo(
            &self,
            session_id: Uuid,
            photo: u16,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                let err = self.delete_failure();
                return Box::pin(async move { Err(err) });
            }
            self.inner.delete_votes_for_photo(session_id, photo)
        }

        fn delete_votes_for_session(
            &self,
            session_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                let err = self.delete_failure();
                return Box::pin(async move { Err(err) });
            }
            self.inner.delete_votes_for_session(session_id)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    async fn state_with_session() -> (SharedState, Uuid) {
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(MemorySessionStore::default()),
        );
        let detail = session_service::create_session(
            &state,
            CreateSessionRequest {
                name: "turma piloto".into(),
                scheduled_for: None,
                photo_duration_secs: Some(30),
            },
        )
        .await
        .unwrap();
        (state, detail.id)
    }

    #[tokio::test]
    async fn full_walkthrough_ends_completed() {
        let (state, id) = state_with_session().await;
        let snapshot = start_session(&state, id).await.unwrap();
        assert_eq!(snapshot.phase, VisibleSessionPhase::Active);
        assert_eq!(snapshot.current_photo, 1);

        for photo in 1..=snapshot.photo_count {
            let frozen = show_results(&state, id).await.unwrap();
            assert_eq!(frozen.phase, VisibleSessionPhase::ShowingResults);
            assert_eq!(frozen.current_photo, photo);
            let advanced = next_photo(&state, id).await.unwrap();
            if photo < snapshot.photo_count {
                assert_eq!(advanced.phase, VisibleSessionPhase::Active);
                assert_eq!(advanced.current_photo, photo + 1);
            } else {
                assert_eq!(advanced.phase, VisibleSessionPhase::Completed);
            }
        }

        // Completed only yields to a reset.
        assert!(next_photo(&state, id).await.is_err());
        let reset = back_to_start(&state, id).await.unwrap();
        assert_eq!(reset.phase, VisibleSessionPhase::Waiting);
        assert_eq!(reset.current_photo, 1);
    }

    #[tokio::test]
    async fn show_results_is_idempotent() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();

        let first = show_results(&state, id).await.unwrap();
        let second = show_results(&state, id).await.unwrap();
        assert_eq!(first.phase, VisibleSessionPhase::ShowingResults);
        assert_eq!(second.phase, VisibleSessionPhase::ShowingResults);
        assert_eq!(first.generation, second.generation);
    }

    #[tokio::test]
    async fn restart_voids_votes_and_bumps_generation() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();
        let session = state.require_session(id).unwrap();

        session_service::submit_vote(
            &state,
            &session,
            "p1",
            DemographicProfile::default(),
            VoteValue::Deferido,
            2_000,
        )
        .await
        .unwrap();

        let before = session.generation().await;
        let snapshot = restart_current_photo(&state, id).await.unwrap();
        assert_eq!(snapshot.generation, before + 1);
        assert_eq!(snapshot.phase, VisibleSessionPhase::Active);
        assert!(
            state
                .store()
                .votes_for_photo(id, 1)
                .await
                .unwrap()
                .is_empty()
        );

        // Same voter may vote again on the reopened photo.
        session_service::submit_vote(
            &state,
            &session,
            "p1",
            DemographicProfile::default(),
            VoteValue::Indeferido,
            500,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn admin_vote_replaces_and_never_counts() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();

        admin_vote(&state, id, VoteValue::Deferido).await.unwrap();
        let tally = admin_vote(&state, id, VoteValue::Indeferido)
            .await
            .unwrap();

        assert_eq!(tally.counts.recorded(), 0);
        assert_eq!(tally.admin_response, Some(VoteValue::Indeferido));
    }

    #[tokio::test]
    async fn stale_timer_expiry_is_ignored() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();
        let session = state.require_session(id).unwrap();

        // Expiry armed for a generation that a restart invalidated.
        let old_generation = session.generation().await;
        restart_current_photo(&state, id).await.unwrap();
        finish_photo_after_timeout(&state, &session, 1, old_generation)
            .await
            .unwrap();
        assert_eq!(session.phase().await, SessionPhase::Active);
    }

    #[tokio::test]
    async fn start_requires_waiting_phase() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();
        let err = start_session(&state, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn expiry_armed_for_a_reopened_window_never_freezes_it() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();
        let session = state.require_session(id).unwrap();

        // The guard runs under the transition gate, so an expiry armed for a
        // window that was since reopened is refused even when the pre-check
        // outside the gate has already passed.
        let err = freeze_current_photo(&state, &session, Some((1, 99)))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(session.phase().await, SessionPhase::Active);
    }

    #[tokio::test]
    async fn failed_restart_leaves_the_session_usable() {
        let store = Arc::new(FailingDeleteStore::new());
        let state = AppState::new(AppConfig::default(), store.clone());
        let detail = session_service::create_session(
            &state,
            CreateSessionRequest {
                name: "turma piloto".into(),
                scheduled_for: None,
                photo_duration_secs: Some(30),
            },
        )
        .await
        .unwrap();
        let id = detail.id;
        start_session(&state, id).await.unwrap();
        let session = state.require_session(id).unwrap();

        session_service::submit_vote(
            &state,
            &session,
            "p1",
            DemographicProfile::default(),
            VoteValue::Deferido,
            1_000,
        )
        .await
        .unwrap();

        store.fail_deletes.store(true, Ordering::SeqCst);
        let err = restart_current_photo(&state, id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        store.fail_deletes.store(false, Ordering::SeqCst);

        // The aborted transition left nothing behind: the generation is
        // unchanged, the vote survives, and the next transition still finds
        // the store and the machine on the same version.
        assert_eq!(session.generation().await, 0);
        assert_eq!(store.votes_for_photo(id, 1).await.unwrap().len(), 1);
        let frozen = show_results(&state, id).await.unwrap();
        assert_eq!(frozen.phase, VisibleSessionPhase::ShowingResults);
    }

    #[tokio::test]
    async fn concurrent_show_results_apply_exactly_one_transition() {
        let (state, id) = state_with_session().await;
        start_session(&state, id).await.unwrap();
        let session = state.require_session(id).unwrap();
        let version_before = session.state().await.version;

        let (first, second) = tokio::join!(show_results(&state, id), show_results(&state, id));
        assert!(first.is_ok());
        assert!(second.is_ok());

        let machine = session.state().await;
        assert_eq!(machine.phase, SessionPhase::ShowingResults);
        assert_eq!(machine.version, version_before + 1);
    }
}
