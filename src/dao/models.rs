use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle phase of a training session as stored in persistence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhaseEntity {
    /// Session created, participants gathering in the waiting room.
    Waiting,
    /// A photo is on screen and votes are being collected.
    Active,
    /// Votes for the current photo are frozen and results are shown.
    ShowingResults,
    /// The last photo has been evaluated; terminal.
    Completed,
}

/// Response value recorded for a vote.
///
/// `NOT_ANSWERED` is a derived tally category for present-but-silent
/// participants and is never persisted as a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteResponseEntity {
    /// The participant approved the candidate's self-identification.
    Deferido,
    /// The participant rejected the candidate's self-identification.
    Indeferido,
}

/// Demographic snapshot copied from the voter's profile at submission time.
///
/// Copied rather than joined live so later profile edits cannot rewrite
/// historical breakdowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemographicsEntity {
    /// Self-declared gender, free-form bucket.
    pub gender: Option<String>,
    /// Age bracket label (e.g. "25-34").
    pub age_bracket: Option<String>,
    /// State or region label.
    pub region: Option<String>,
}

/// Aggregate session entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Display name of the training session.
    pub name: String,
    /// Date the session is scheduled to run, if any.
    pub scheduled_for: Option<SystemTime>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the session entity was updated.
    pub updated_at: SystemTime,
    /// Current lifecycle phase.
    pub phase: SessionPhaseEntity,
    /// 1-based index of the photo currently being shown.
    pub current_photo: u16,
    /// Total number of photos evaluated in this session.
    pub photo_count: u16,
    /// Timestamp marking when the current photo was put on screen.
    pub photo_started_at: Option<SystemTime>,
    /// Configured per-photo voting window in seconds.
    pub photo_duration_secs: u32,
    /// Restart counter; bumped whenever votes are invalidated wholesale.
    pub generation: u32,
    /// Optimistic-concurrency version, incremented on every mutation.
    pub version: u64,
}

/// Immutable evaluation record, unique per `(session, photo, voter)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Primary key of the vote record.
    pub id: Uuid,
    /// Session this vote belongs to.
    pub session_id: Uuid,
    /// 1-based index of the photo that was evaluated.
    pub photo: u16,
    /// Opaque identity of the submitting participant.
    pub voter_id: String,
    /// Recorded response value.
    pub response: VoteResponseEntity,
    /// Time the voter spent before submitting, clamped to the photo window.
    pub elapsed_ms: u32,
    /// Demographic snapshot taken at submission time.
    pub demographics: DemographicsEntity,
    /// Distinguishes the administrator's own vote from participant votes.
    pub is_admin_vote: bool,
    /// Session generation this vote was cast under.
    pub generation: u32,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Subset of [`SessionEntity`] returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionListItemEntity {
    /// Primary key of the session.
    pub id: Uuid,
    /// Display name of the training session.
    pub name: String,
    /// Date the session is scheduled to run, if any.
    pub scheduled_for: Option<SystemTime>,
    /// Current lifecycle phase.
    pub phase: SessionPhaseEntity,
    /// 1-based index of the photo currently being shown.
    pub current_photo: u16,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl From<SessionEntity> for SessionListItemEntity {
    fn from(entity: SessionEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            scheduled_for: entity.scheduled_for,
            phase: entity.phase,
            current_photo: entity.current_photo,
            created_at: entity.created_at,
        }
    }
}
