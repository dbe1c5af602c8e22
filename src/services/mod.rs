/// Admin-driven session lifecycle operations.
pub mod admin_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Connected-participant roster management.
pub mod presence;
/// Session CRUD, vote intake and reporting.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Pure vote aggregation and consensus math.
pub mod tally;
/// Server-side photo window countdown.
pub mod timer;
/// WebSocket connection and message handling service.
pub mod websocket_service;
