//! DTO definitions used by the admin REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::common::{SessionPhaseSnapshot, VoteValue};

/// Response returned by every lifecycle action, carrying the post-action snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransitionResponse {
    /// Snapshot of the session after the action committed.
    pub snapshot: SessionPhaseSnapshot,
}

/// The administrator's own verdict on the current photo.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminVoteRequest {
    /// Verdict value; resubmitting replaces the previous one in place.
    pub response: VoteValue,
}
