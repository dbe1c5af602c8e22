use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dto::{
        common::{SessionPhaseSnapshot, VoteValue},
        session::ParticipantSummary,
        validation::validate_participant_id,
    },
    state::session::DemographicProfile,
};

/// Demographic fields a participant may declare when joining.
#[derive(Debug, Deserialize, Serialize, ToSchema, Clone, Default)]
pub struct DemographicsInput {
    /// Self-declared gender.
    pub gender: Option<String>,
    /// Age bracket label (e.g. "25-34").
    pub age_bracket: Option<String>,
    /// State or region label.
    pub region: Option<String>,
}

impl From<DemographicsInput> for DemographicProfile {
    fn from(value: DemographicsInput) -> Self {
        Self {
            gender: value.gender,
            age_bracket: value.age_bracket,
            region: value.region,
        }
    }
}

/// First-message payload binding a socket to a session and identity.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct JoinPayload {
    /// Session the participant wants to enter.
    pub session_id: Uuid,
    /// Opaque identity; stable across reconnects.
    pub participant_id: String,
    /// Display name shown in rosters.
    pub display_name: String,
    /// Demographic snapshot copied onto every vote this identity casts.
    #[serde(default)]
    pub demographics: DemographicsInput,
}

impl Validate for JoinPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_participant_id(&self.participant_id) {
            errors.add("participant_id", e);
        }

        if self.display_name.is_empty() || self.display_name.chars().count() > 120 {
            let mut err = ValidationError::new("display_name_length");
            err.message = Some("Display name must be 1-120 characters".into());
            errors.add("display_name", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Messages accepted from participant WebSocket clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ParticipantInboundMessage {
    /// Bind this socket to a session; must be the first message.
    #[serde(rename = "join")]
    Join(JoinPayload),
    /// Cast a vote on the photo currently on screen.
    #[serde(rename = "vote")]
    Vote {
        /// Verdict value.
        response: VoteValue,
        /// Milliseconds between photo display and submission.
        elapsed_ms: u32,
    },
    /// Politely leave the session before closing the socket.
    #[serde(rename = "leave")]
    Leave,
    /// Anything unrecognised; ignored with a warning.
    #[serde(other)]
    Unknown,
}

impl ParticipantInboundMessage {
    /// Parse a raw text frame, running payload validation for join messages.
    pub fn from_json_str(raw: &str) -> Result<Self, String> {
        let message: Self = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        if let Self::Join(payload) = &message {
            payload.validate().map_err(|err| err.to_string())?;
        }
        Ok(message)
    }
}

/// Messages pushed to participant WebSocket clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ParticipantOutboundMessage {
    /// Positive acknowledgement after a successful join.
    #[serde(rename = "joined")]
    Joined {
        /// Snapshot of the session at join time.
        snapshot: SessionPhaseSnapshot,
    },
    /// Acknowledgement that a vote was recorded.
    #[serde(rename = "vote_ack")]
    VoteAck {
        /// Photo the vote was recorded against.
        photo: u16,
    },
    /// Phase change notification mirroring the SSE stream.
    #[serde(rename = "phase")]
    Phase {
        /// Snapshot of the session after the change.
        snapshot: SessionPhaseSnapshot,
    },
    /// Full roster sync after a participant joined or left.
    #[serde(rename = "presence")]
    Presence {
        /// Number of connected participants.
        count: usize,
        /// Current roster.
        participants: Vec<ParticipantSummary>,
    },
    /// Countdown tick while a photo window is open.
    #[serde(rename = "timer")]
    Timer {
        /// Photo the window applies to.
        photo: u16,
        /// Whole seconds left.
        remaining_secs: u32,
    },
    /// Recoverable error; the socket stays open.
    #[serde(rename = "error")]
    Error {
        /// Human-readable reason.
        message: String,
    },
}
