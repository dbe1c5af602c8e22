//! Request/response types exposed over HTTP, SSE and WebSocket.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Admin REST payloads.
pub mod admin;
/// Shared snapshots reused across surfaces.
pub mod common;
/// Healthcheck payloads.
pub mod health;
/// Client-visible lifecycle phases.
pub mod phase;
/// Session CRUD and reporting payloads.
pub mod session;
/// Server-sent event envelopes and payloads.
pub mod sse;
/// Validation helpers for DTOs.
pub mod validation;
/// Participant WebSocket messages.
pub mod ws;

pub(crate) fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

pub(crate) fn parse_rfc3339(value: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .map(SystemTime::from)
}
