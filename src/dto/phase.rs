use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::SessionPhase;

/// Publicly visible session phase exposed to clients (REST/SSE/WS).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleSessionPhase {
    /// Participants gathering before the first photo.
    Waiting,
    /// A photo is on screen and votes are being collected.
    Active,
    /// Votes are frozen and the tally for the current photo is shown.
    ShowingResults,
    /// Every photo has been evaluated.
    Completed,
}

impl From<SessionPhase> for VisibleSessionPhase {
    fn from(value: SessionPhase) -> Self {
        match value {
            SessionPhase::Waiting => VisibleSessionPhase::Waiting,
            SessionPhase::Active => VisibleSessionPhase::Active,
            SessionPhase::ShowingResults => VisibleSessionPhase::ShowingResults,
            SessionPhase::Completed => VisibleSessionPhase::Completed,
        }
    }
}

impl From<&SessionPhase> for VisibleSessionPhase {
    fn from(value: &SessionPhase) -> Self {
        (*value).into()
    }
}
