//! Ephemeral roster of connected participants, rebuilt from live sockets.

use std::sync::Arc;

use axum::extract::ws::Message;
use tracing::info;

use crate::{
    dto::{format_system_time, session::ParticipantSummary},
    services::sse_events,
    state::{ParticipantConnection, SessionRuntime, SharedState},
};

/// Current roster of one session, in no particular order.
pub fn roster(session: &Arc<SessionRuntime>) -> Vec<ParticipantSummary> {
    session
        .presence()
        .iter()
        .map(|entry| {
            let connection = entry.value();
            ParticipantSummary {
                participant_id: connection.participant_id.clone(),
                display_name: connection.display_name.clone(),
                joined_at: format_system_time(connection.joined_at),
            }
        })
        .collect()
}

/// Register a participant socket, displacing any previous connection with
/// the same identity, then announce the new roster.
pub fn register(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    connection: ParticipantConnection,
) {
    let participant_id = connection.participant_id.clone();
    if let Some(previous) = session.presence().insert(participant_id.clone(), connection) {
        info!(
            session_id = %session.id,
            participant_id = %participant_id,
            "participant reconnected; closing previous socket"
        );
        let _ = previous.tx.send(Message::Close(None));
    }
    sse_events::broadcast_presence_sync(state, session);
}

/// Drop a participant from the roster and announce the change.
///
/// A reconnect replaces the roster entry before the old socket's teardown
/// runs, so removal only happens when the stored sender is the one being
/// torn down.
pub fn unregister(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    participant_id: &str,
    tx: &tokio::sync::mpsc::UnboundedSender<Message>,
) {
    let removed = session
        .presence()
        .remove_if(participant_id, |_, connection| connection.tx.same_channel(tx));
    if removed.is_some() {
        sse_events::broadcast_presence_sync(state, session);
    }
}

/// Number of currently connected participants.
pub fn present_count(session: &Arc<SessionRuntime>) -> usize {
    session.presence().len()
}
