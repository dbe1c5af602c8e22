//! DTO definitions for session CRUD, live snapshots and the final report.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{SessionEntity, SessionListItemEntity},
    dto::{
        common::{PhotoTallySnapshot, SessionPhaseSnapshot},
        format_system_time,
        phase::VisibleSessionPhase,
    },
};

/// Payload describing a new training session.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSessionRequest {
    /// Display name shown to participants.
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    /// Optional RFC 3339 date the session is scheduled to run.
    pub scheduled_for: Option<String>,
    /// Per-photo voting window in seconds; server clamps out-of-range values.
    pub photo_duration_secs: Option<u32>,
}

/// Minimal projection of a session when listed.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Current lifecycle phase.
    pub phase: VisibleSessionPhase,
    /// 1-based index of the photo currently being shown.
    pub current_photo: u16,
    /// Scheduled date in RFC 3339, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<String>,
    /// Creation timestamp in RFC 3339.
    pub created_at: String,
}

impl From<SessionListItemEntity> for SessionSummary {
    fn from(entity: SessionListItemEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            phase: crate::state::state_machine::SessionPhase::from(entity.phase).into(),
            current_photo: entity.current_photo,
            scheduled_for: entity.scheduled_for.map(format_system_time),
            created_at: format_system_time(entity.created_at),
        }
    }
}

/// Full client-facing view of one session.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionDetail {
    /// Session identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Scheduled date in RFC 3339, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<String>,
    /// Creation timestamp in RFC 3339.
    pub created_at: String,
    /// Last update timestamp in RFC 3339.
    pub updated_at: String,
    /// Per-photo voting window in seconds.
    pub photo_duration_secs: u32,
    /// Live phase snapshot, including tally and presence context.
    pub snapshot: SessionPhaseSnapshot,
}

impl SessionDetail {
    /// Assemble the detail view from a persisted entity and a live snapshot.
    pub fn from_entity(entity: &SessionEntity, snapshot: SessionPhaseSnapshot) -> Self {
        Self {
            id: entity.id,
            name: entity.name.clone(),
            scheduled_for: entity.scheduled_for.map(format_system_time),
            created_at: format_system_time(entity.created_at),
            updated_at: format_system_time(entity.updated_at),
            photo_duration_secs: entity.photo_duration_secs,
            snapshot,
        }
    }
}

/// Roster entry for one connected participant.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct ParticipantSummary {
    /// Opaque identity announced at join time.
    pub participant_id: String,
    /// Display name shown in rosters.
    pub display_name: String,
    /// When the participant joined, RFC 3339.
    pub joined_at: String,
}

/// Final per-session report covering every photo evaluated so far.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionReport {
    /// Session identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Phase the session was in when the report was generated.
    pub phase: VisibleSessionPhase,
    /// Total number of photos in the session.
    pub photo_count: u16,
    /// Report generation timestamp, RFC 3339.
    pub generated_at: String,
    /// Number of recorded votes across all photos.
    pub total_votes: usize,
    /// Frozen tallies, one entry per photo with at least one recorded vote.
    pub photos: Vec<PhotoTallySnapshot>,
}
