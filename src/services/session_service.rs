//! Session CRUD, vote intake and reporting on top of the storage layer.

use std::{
    sync::Arc,
    time::SystemTime,
};

use axum::extract::ws::Message;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{SessionEntity, SessionPhaseEntity, VoteEntity},
    dto::{
        common::{PhotoTallySnapshot, SessionPhaseSnapshot, VoteValue},
        format_system_time, parse_rfc3339,
        session::{CreateSessionRequest, SessionDetail, SessionReport, SessionSummary},
    },
    error::ServiceError,
    services::{presence, sse_events, tally},
    state::{SessionRuntime, SharedState, session::DemographicProfile, state_machine::SessionPhase},
};

/// Seconds remaining on the photo window, `None` when no window is open.
pub fn remaining_secs(meta: &crate::state::session::SessionMeta) -> Option<u32> {
    let started = meta.photo_started_at?;
    let elapsed = SystemTime::now().duration_since(started).ok()?;
    Some(
        u64::from(meta.photo_duration_secs)
            .saturating_sub(elapsed.as_secs())
            .try_into()
            .unwrap_or(u32::MAX),
    )
}

/// Build the shared phase snapshot for one session.
///
/// Storage failures while fetching votes degrade to a snapshot without a
/// tally rather than failing the caller; broadcasts must not be lost to a
/// flaky backend.
pub async fn phase_snapshot(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    phase_override: Option<SessionPhase>,
) -> SessionPhaseSnapshot {
    let machine = session.state().await;
    let phase = phase_override.unwrap_or(machine.phase);
    let meta = session.read_meta().await;
    let present_count = presence::present_count(session);

    let remaining = match phase {
        SessionPhase::Active => remaining_secs(&meta),
        _ => None,
    };

    let tally = match phase {
        SessionPhase::ShowingResults | SessionPhase::Completed => {
            match state
                .store()
                .votes_for_photo(session.id, machine.current_photo)
                .await
            {
                Ok(votes) => Some(tally::compute_photo_tally(
                    machine.current_photo,
                    Some(machine.generation),
                    &votes,
                    present_count,
                )),
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "failed to load votes for snapshot");
                    None
                }
            }
        }
        _ => None,
    };

    SessionPhaseSnapshot {
        session_id: session.id,
        phase: phase.into(),
        current_photo: machine.current_photo,
        photo_count: machine.photo_count,
        generation: machine.generation,
        present_count,
        remaining_secs: remaining,
        tally,
    }
}

/// Create and persist a new session in the waiting phase.
pub async fn create_session(
    state: &SharedState,
    request: CreateSessionRequest,
) -> Result<SessionDetail, ServiceError> {
    let scheduled_for = match &request.scheduled_for {
        Some(raw) => Some(parse_rfc3339(raw).ok_or_else(|| {
            ServiceError::InvalidInput(format!("`{raw}` is not a valid RFC 3339 timestamp"))
        })?),
        None => None,
    };

    let now = SystemTime::now();
    let entity = SessionEntity {
        id: Uuid::new_v4(),
        name: request.name,
        scheduled_for,
        created_at: now,
        updated_at: now,
        phase: SessionPhaseEntity::Waiting,
        current_photo: 1,
        photo_count: state.config().photo_count(),
        photo_started_at: None,
        photo_duration_secs: state
            .config()
            .clamp_photo_duration(request.photo_duration_secs),
        generation: 0,
        version: 0,
    };

    state.store().save_session(entity.clone()).await?;
    let runtime = SessionRuntime::new(&entity);
    state.install_session(runtime.clone());
    info!(session_id = %entity.id, name = %entity.name, "session created");

    sse_events::broadcast_session_created(state, entity.clone().into_list_summary());
    let snapshot = phase_snapshot(state, &runtime, None).await;
    Ok(SessionDetail::from_entity(&entity, snapshot))
}

/// List every stored session as a summary projection.
pub async fn list_sessions(state: &SharedState) -> Result<Vec<SessionSummary>, ServiceError> {
    let items = state.store().list_sessions().await?;
    Ok(items.into_iter().map(SessionSummary::from).collect())
}

/// Fetch the detail view of one session.
pub async fn get_session(state: &SharedState, id: Uuid) -> Result<SessionDetail, ServiceError> {
    let entity = state
        .store()
        .find_session(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{id}` not found")))?;
    let runtime = state.require_session(id)?;
    let snapshot = phase_snapshot(state, &runtime, None).await;
    Ok(SessionDetail::from_entity(&entity, snapshot))
}

/// Delete a session, its votes, its runtime and its SSE hub, closing every
/// connected participant socket. Refused mid-walkthrough; only sessions in
/// the waiting room or completed ones can be removed.
pub async fn delete_session(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    if let Some(runtime) = state.session(id) {
        let phase = runtime.phase().await;
        if !matches!(phase, SessionPhase::Waiting | SessionPhase::Completed) {
            return Err(ServiceError::InvalidState(format!(
                "a session cannot be deleted mid-walkthrough (phase is {phase:?})"
            )));
        }
    }

    state.store().delete_votes_for_session(id).await?;
    if !state.store().delete_session(id).await? {
        return Err(ServiceError::NotFound(format!("session `{id}` not found")));
    }

    if let Some(runtime) = state.remove_session(id) {
        for entry in runtime.presence().iter() {
            let _ = entry.value().tx.send(Message::Close(None));
        }
        runtime.presence().clear();
    }

    info!(session_id = %id, "session deleted");
    sse_events::broadcast_session_deleted(state, id);
    Ok(())
}

/// Record a participant's vote on the photo currently on screen.
///
/// Votes are only accepted while the session is `active`; the storage layer
/// rejects duplicates per `(photo, voter)` and votes tagged with a stale
/// generation. The refreshed live tally is broadcast and returned.
pub async fn submit_vote(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    voter_id: &str,
    demographics: DemographicProfile,
    response: VoteValue,
    elapsed_ms: u32,
) -> Result<PhotoTallySnapshot, ServiceError> {
    let machine = session.state().await;
    if machine.phase != SessionPhase::Active {
        return Err(ServiceError::InvalidState(format!(
            "votes are only accepted while a photo is active (phase is {:?})",
            machine.phase
        )));
    }

    let meta = session.read_meta().await;
    let window_ms = meta.photo_duration_secs.saturating_mul(1_000);

    let vote = VoteEntity {
        id: Uuid::new_v4(),
        session_id: session.id,
        photo: machine.current_photo,
        voter_id: voter_id.to_string(),
        response: response.into(),
        elapsed_ms: elapsed_ms.min(window_ms),
        demographics: demographics.into(),
        is_admin_vote: false,
        generation: machine.generation,
        created_at: SystemTime::now(),
    };

    state.store().insert_vote(vote).await?;

    let tally = live_tally(state, session).await?;
    sse_events::broadcast_vote_recorded(state, session.id, machine.current_photo, tally.clone());
    Ok(tally)
}

/// Current photo's tally computed from recorded votes and live presence.
pub async fn live_tally(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
) -> Result<PhotoTallySnapshot, ServiceError> {
    let machine = session.state().await;
    let votes = state
        .store()
        .votes_for_photo(session.id, machine.current_photo)
        .await?;
    Ok(tally::compute_photo_tally(
        machine.current_photo,
        Some(machine.generation),
        &votes,
        presence::present_count(session),
    ))
}

/// Assemble the per-photo report for one session.
pub async fn report(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
) -> Result<SessionReport, ServiceError> {
    let entity = state
        .store()
        .find_session(session.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("session `{}` not found", session.id)))?;

    let votes = state.store().votes_for_session(session.id).await?;
    let machine = session.state().await;
    let present_count = presence::present_count(session);

    let mut photos = Vec::new();
    for photo in 1..=machine.photo_count {
        // Only the photo currently open can race a restart; earlier photos
        // were finalized with their rows intact.
        let filter = (photo == machine.current_photo).then_some(machine.generation);
        let photo_tally = tally::compute_photo_tally(photo, filter, &votes, present_count);
        if photo_tally.counts.recorded() > 0 || photo_tally.admin_response.is_some() {
            photos.push(photo_tally);
        }
    }

    let total_votes = votes
        .iter()
        .filter(|vote| {
            vote.photo != machine.current_photo || vote.generation == machine.generation
        })
        .count();

    Ok(SessionReport {
        id: entity.id,
        name: entity.name,
        phase: machine.phase.into(),
        photo_count: machine.photo_count,
        generated_at: format_system_time(SystemTime::now()),
        total_votes,
        photos,
    })
}

/// Rebuild in-memory runtimes for every persisted session at startup.
pub async fn restore_sessions(state: &SharedState) -> Result<usize, ServiceError> {
    let items = state.store().list_sessions().await?;
    let mut restored = 0;
    for item in items {
        if let Some(entity) = state.store().find_session(item.id).await? {
            state.install_session(SessionRuntime::new(&entity));
            restored += 1;
        }
    }
    if restored > 0 {
        info!(count = restored, "restored session runtimes from storage");
    }
    Ok(restored)
}

trait IntoListSummary {
    fn into_list_summary(self) -> SessionSummary;
}

impl IntoListSummary for SessionEntity {
    fn into_list_summary(self) -> SessionSummary {
        crate::dao::models::SessionListItemEntity::from(self).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::session_store::memory::MemorySessionStore,
        state::AppState,
    };

    fn test_state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(MemorySessionStore::default()))
    }

    fn create_request(name: &str) -> CreateSessionRequest {
        CreateSessionRequest {
            name: name.to_string(),
            scheduled_for: None,
            photo_duration_secs: Some(30),
        }
    }

    #[tokio::test]
    async fn create_session_persists_and_installs_runtime() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma A"))
            .await
            .unwrap();

        assert_eq!(detail.snapshot.current_photo, 1);
        assert_eq!(detail.snapshot.photo_count, 30);
        assert!(state.session(detail.id).is_some());
        assert_eq!(list_sessions(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_schedule_timestamp_is_rejected() {
        let state = test_state();
        let request = CreateSessionRequest {
            name: "turma B".into(),
            scheduled_for: Some("tomorrow".into()),
            photo_duration_secs: None,
        };
        let err = create_session(&state, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn votes_are_rejected_outside_the_active_phase() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma C"))
            .await
            .unwrap();
        let session = state.require_session(detail.id).unwrap();

        let err = submit_vote(
            &state,
            &session,
            "p1",
            DemographicProfile::default(),
            VoteValue::Deferido,
            1_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn delete_session_removes_runtime_and_votes() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma D"))
            .await
            .unwrap();

        delete_session(&state, detail.id).await.unwrap();
        assert!(state.session(detail.id).is_none());
        assert!(
            state
                .store()
                .find_session(detail.id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn restart_of_a_later_photo_keeps_earlier_results_in_the_report() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma G"))
            .await
            .unwrap();
        use crate::services::admin_service as admin;

        let session = state.require_session(detail.id).unwrap();
        admin::start_session(&state, detail.id).await.unwrap();
        submit_vote(
            &state,
            &session,
            "p1",
            DemographicProfile::default(),
            VoteValue::Deferido,
            1_000,
        )
        .await
        .unwrap();
        admin::show_results(&state, detail.id).await.unwrap();
        admin::next_photo(&state, detail.id).await.unwrap();

        // Restarting photo 2 bumps the session generation; photo 1's
        // finalized result must survive it.
        admin::restart_current_photo(&state, detail.id).await.unwrap();

        let report = report(&state, &session).await.unwrap();
        assert_eq!(report.total_votes, 1);
        assert_eq!(report.photos.len(), 1);
        assert_eq!(report.photos[0].photo, 1);
        assert_eq!(report.photos[0].counts.deferido, 1);
    }

    #[tokio::test]
    async fn sessions_cannot_be_deleted_mid_walkthrough() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma F"))
            .await
            .unwrap();
        crate::services::admin_service::start_session(&state, detail.id)
            .await
            .unwrap();

        let err = delete_session(&state, detail.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert!(state.session(detail.id).is_some());
    }

    #[tokio::test]
    async fn restore_rebuilds_runtimes_from_storage() {
        let state = test_state();
        let detail = create_session(&state, create_request("turma E"))
            .await
            .unwrap();

        // Simulate a restart: fresh state sharing the same store.
        let restarted = AppState::new(AppConfig::default(), state.store());
        assert!(restarted.session(detail.id).is_none());
        let restored = restore_sessions(&restarted).await.unwrap();
        assert_eq!(restored, 1);
        assert!(restarted.session(detail.id).is_some());
    }
}
