use std::time::SystemTime;

use crate::dao::models::{DemographicsEntity, SessionEntity, SessionPhaseEntity};
use crate::state::state_machine::SessionPhase;

/// Session metadata owned outside the state machine: naming, scheduling and
/// the timestamps the photo timer derives from.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    /// Display name of the training session.
    pub name: String,
    /// Date the session is scheduled to run, if any.
    pub scheduled_for: Option<SystemTime>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last update timestamp.
    pub updated_at: SystemTime,
    /// Configured per-photo voting window in seconds.
    pub photo_duration_secs: u32,
    /// When the current photo was put on screen; `None` outside `active`
    /// and `showing_results`.
    pub photo_started_at: Option<SystemTime>,
}

/// Demographic snapshot supplied by a participant when joining.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemographicProfile {
    /// Self-declared gender, free-form bucket.
    pub gender: Option<String>,
    /// Age bracket label.
    pub age_bracket: Option<String>,
    /// State or region label.
    pub region: Option<String>,
}

impl From<DemographicProfile> for DemographicsEntity {
    fn from(value: DemographicProfile) -> Self {
        Self {
            gender: value.gender,
            age_bracket: value.age_bracket,
            region: value.region,
        }
    }
}

impl From<DemographicsEntity> for DemographicProfile {
    fn from(value: DemographicsEntity) -> Self {
        Self {
            gender: value.gender,
            age_bracket: value.age_bracket,
            region: value.region,
        }
    }
}

impl From<SessionPhase> for SessionPhaseEntity {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Waiting => SessionPhaseEntity::Waiting,
            SessionPhase::Active => SessionPhaseEntity::Active,
            SessionPhase::ShowingResults => SessionPhaseEntity::ShowingResults,
            SessionPhase::Completed => SessionPhaseEntity::Completed,
        }
    }
}

impl From<SessionPhaseEntity> for SessionPhase {
    fn from(value: SessionPhaseEntity) -> Self {
        match value {
            SessionPhaseEntity::Waiting => SessionPhase::Waiting,
            SessionPhaseEntity::Active => SessionPhase::Active,
            SessionPhaseEntity::ShowingResults => SessionPhase::ShowingResults,
            SessionPhaseEntity::Completed => SessionPhase::Completed,
        }
    }
}

impl SessionMeta {
    /// Extract the metadata slice of a persisted session entity.
    pub fn from_entity(entity: &SessionEntity) -> Self {
        Self {
            name: entity.name.clone(),
            scheduled_for: entity.scheduled_for,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
            photo_duration_secs: entity.photo_duration_secs,
            photo_started_at: entity.photo_started_at,
        }
    }
}
