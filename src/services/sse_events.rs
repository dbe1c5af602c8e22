use std::sync::Arc;

use axum::extract::ws::Message;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        common::PhotoTallySnapshot,
        session::SessionSummary,
        sse::{
            PhaseChangedEvent, PhotoFinalizedEvent, PresenceSyncEvent, ServerEvent,
            SessionCreatedEvent, SessionDeletedEvent, SessionResetEvent, TimerTickEvent,
            VoteRecordedEvent,
        },
        ws::ParticipantOutboundMessage,
    },
    services::{presence, session_service},
    state::{SessionRuntime, SharedState, state_machine::SessionPhase},
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_VOTE_RECORDED: &str = "vote.recorded";
const EVENT_PRESENCE_SYNC: &str = "presence.sync";
const EVENT_TIMER_TICK: &str = "timer.tick";
const EVENT_PHOTO_FINALIZED: &str = "photo.finalized";
const EVENT_SESSION_CREATED: &str = "session.created";
const EVENT_SESSION_DELETED: &str = "session.deleted";
const EVENT_SESSION_RESET: &str = "session.reset";

/// Broadcast a lifecycle phase change to the session's monitors, the admin
/// stream and every connected participant socket.
pub async fn broadcast_phase_changed(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    phase: SessionPhase,
) {
    let snapshot = session_service::phase_snapshot(state, session, Some(phase)).await;
    let payload = PhaseChangedEvent(snapshot.clone());
    send_session_event(state, session.id, EVENT_PHASE_CHANGED, &payload);
    send_admin_event(state, EVENT_PHASE_CHANGED, &payload);
    push_to_participants(session, &ParticipantOutboundMessage::Phase { snapshot });
}

/// Broadcast the refreshed live tally after an accepted vote.
pub fn broadcast_vote_recorded(
    state: &SharedState,
    session_id: Uuid,
    photo: u16,
    tally: PhotoTallySnapshot,
) {
    let payload = VoteRecordedEvent {
        session_id,
        photo,
        tally,
    };
    send_session_event(state, session_id, EVENT_VOTE_RECORDED, &payload);
    send_admin_event(state, EVENT_VOTE_RECORDED, &payload);
}

/// Broadcast the roster after a participant joined or left, to monitors,
/// the admin stream and the participants themselves.
pub fn broadcast_presence_sync(state: &SharedState, session: &Arc<SessionRuntime>) {
    let participants = presence::roster(session);
    let payload = PresenceSyncEvent {
        session_id: session.id,
        count: participants.len(),
        participants: participants.clone(),
    };
    send_session_event(state, session.id, EVENT_PRESENCE_SYNC, &payload);
    send_admin_event(state, EVENT_PRESENCE_SYNC, &payload);
    push_to_participants(
        session,
        &ParticipantOutboundMessage::Presence {
            count: participants.len(),
            participants,
        },
    );
}

/// Broadcast one countdown tick of the photo window, mirrored onto
/// participant sockets.
pub fn broadcast_timer_tick(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    photo: u16,
    remaining_secs: u32,
) {
    let payload = TimerTickEvent {
        session_id: session.id,
        photo,
        remaining_secs,
    };
    send_session_event(state, session.id, EVENT_TIMER_TICK, &payload);
    push_to_participants(
        session,
        &ParticipantOutboundMessage::Timer {
            photo,
            remaining_secs,
        },
    );
}

/// Broadcast the frozen tally of a photo whose window just closed.
pub fn broadcast_photo_finalized(
    state: &SharedState,
    session_id: Uuid,
    photo: u16,
    tally: PhotoTallySnapshot,
) {
    let payload = PhotoFinalizedEvent {
        session_id,
        photo,
        tally,
    };
    send_session_event(state, session_id, EVENT_PHOTO_FINALIZED, &payload);
    send_admin_event(state, EVENT_PHOTO_FINALIZED, &payload);
}

/// Announce a freshly created session on the admin stream.
pub fn broadcast_session_created(state: &SharedState, session: SessionSummary) {
    let payload = SessionCreatedEvent { session };
    send_admin_event(state, EVENT_SESSION_CREATED, &payload);
}

/// Announce a deleted session to its monitors and the admin stream.
pub fn broadcast_session_deleted(state: &SharedState, session_id: Uuid) {
    let payload = SessionDeletedEvent { session_id };
    send_session_event(state, session_id, EVENT_SESSION_DELETED, &payload);
    send_admin_event(state, EVENT_SESSION_DELETED, &payload);
}

/// Announce a wholesale vote invalidation (restart or reset) and the new
/// generation clients must tag subsequent votes with.
pub fn broadcast_session_reset(state: &SharedState, session_id: Uuid, generation: u32) {
    let payload = SessionResetEvent {
        session_id,
        generation,
    };
    send_session_event(state, session_id, EVENT_SESSION_RESET, &payload);
    send_admin_event(state, EVENT_SESSION_RESET, &payload);
}

fn send_session_event(
    state: &SharedState,
    session_id: Uuid,
    event: &str,
    payload: &impl Serialize,
) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.session_sse(session_id).broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize session SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}

/// Fan a message out to every connected participant socket of one session.
fn push_to_participants(session: &Arc<SessionRuntime>, message: &ParticipantOutboundMessage) {
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize participant push message");
            return;
        }
    };
    for entry in session.presence().iter() {
        let _ = entry.value().tx.send(Message::Text(payload.clone().into()));
    }
}
