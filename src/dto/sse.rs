use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::{
    common::{PhotoTallySnapshot, SessionPhaseSnapshot},
    session::{ParticipantSummary, SessionSummary},
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Pre-serialized data field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }

}

#[derive(Debug, Serialize, ToSchema)]
/// Token payload refreshed on the admin stream.
pub struct AdminHandshake {
    /// Single-connection credential expected in `X-Admin-Token`.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Broadcast whenever a session's lifecycle phase changes.
pub struct PhaseChangedEvent(pub SessionPhaseSnapshot);

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast after each accepted vote with the refreshed live tally.
pub struct VoteRecordedEvent {
    /// Session the vote belongs to.
    pub session_id: Uuid,
    /// Photo the vote targeted.
    pub photo: u16,
    /// Live tally including the new vote.
    pub tally: PhotoTallySnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the connected-participant roster changes.
pub struct PresenceSyncEvent {
    /// Session whose roster changed.
    pub session_id: Uuid,
    /// Number of connected participants.
    pub count: usize,
    /// Current roster.
    pub participants: Vec<ParticipantSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast once per second while a photo window is open.
pub struct TimerTickEvent {
    /// Session the timer belongs to.
    pub session_id: Uuid,
    /// Photo the window applies to.
    pub photo: u16,
    /// Whole seconds left before the window closes.
    pub remaining_secs: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a photo window closes and its tally freezes.
pub struct PhotoFinalizedEvent {
    /// Session the photo belongs to.
    pub session_id: Uuid,
    /// Photo whose votes froze.
    pub photo: u16,
    /// Frozen tally.
    pub tally: PhotoTallySnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted on the admin stream when a session is created.
pub struct SessionCreatedEvent {
    /// Listing projection of the new session.
    pub session: SessionSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted when a session has been deleted.
pub struct SessionDeletedEvent {
    /// Identifier of the removed session.
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
/// Event emitted when votes were invalidated wholesale (restart or reset).
pub struct SessionResetEvent {
    /// Session whose votes were invalidated.
    pub session_id: Uuid,
    /// New generation; votes tagged with older generations are void.
    pub generation: u32,
}
