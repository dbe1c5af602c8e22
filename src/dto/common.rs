use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::VoteResponseEntity, dto::phase::VisibleSessionPhase};

/// Evaluation verdict as exchanged with clients.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteValue {
    /// The candidate's self-identification is approved.
    Deferido,
    /// The candidate's self-identification is rejected.
    Indeferido,
}

impl From<VoteValue> for VoteResponseEntity {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::Deferido => VoteResponseEntity::Deferido,
            VoteValue::Indeferido => VoteResponseEntity::Indeferido,
        }
    }
}

impl From<VoteResponseEntity> for VoteValue {
    fn from(value: VoteResponseEntity) -> Self {
        match value {
            VoteResponseEntity::Deferido => VoteValue::Deferido,
            VoteResponseEntity::Indeferido => VoteValue::Indeferido,
        }
    }
}

/// Per-response counters for one photo or one demographic bucket.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, Default, PartialEq, Eq)]
pub struct TallyCounts {
    /// Number of recorded DEFERIDO votes.
    pub deferido: u32,
    /// Number of recorded INDEFERIDO votes.
    pub indeferido: u32,
    /// Present participants with no recorded vote. Derived, never stored.
    pub not_answered: u32,
}

impl TallyCounts {
    /// Total number of recorded votes, silent participants excluded.
    pub fn recorded(&self) -> u32 {
        self.deferido + self.indeferido
    }
}

/// Aggregated results for a single photo, including demographic breakdowns.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct PhotoTallySnapshot {
    /// 1-based index of the photo.
    pub photo: u16,
    /// Overall counters.
    pub counts: TallyCounts,
    /// Counters bucketed by declared gender.
    pub by_gender: IndexMap<String, TallyCounts>,
    /// Counters bucketed by age bracket.
    pub by_age_bracket: IndexMap<String, TallyCounts>,
    /// Counters bucketed by region.
    pub by_region: IndexMap<String, TallyCounts>,
    /// Mean time-to-vote across recorded votes, absent when nobody voted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_elapsed_ms: Option<u32>,
    /// Share of the majority response over recorded votes, 0-100.
    pub consensus_pct: f32,
    /// True when the consensus falls below the divergence threshold.
    pub low_consensus: bool,
    /// True when every present participant has a recorded vote.
    pub all_voted: bool,
    /// The administrator's own verdict, surfaced separately in results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_response: Option<VoteValue>,
}

/// Shared snapshot describing one session's phase and live context.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct SessionPhaseSnapshot {
    /// Session this snapshot describes.
    pub session_id: Uuid,
    /// Current lifecycle phase.
    pub phase: VisibleSessionPhase,
    /// 1-based index of the photo currently being shown.
    pub current_photo: u16,
    /// Total number of photos evaluated in this session.
    pub photo_count: u16,
    /// Restart counter; clients drop in-flight votes when it changes.
    pub generation: u32,
    /// Number of participants currently connected.
    pub present_count: usize,
    /// Seconds left on the photo window; present during `active` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_secs: Option<u32>,
    /// Frozen tally; present during `showing_results` and `completed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<PhotoTallySnapshot>,
}
