use axum::Router;

use crate::state::SharedState;

/// Admin-only lifecycle endpoints.
pub mod admin;
/// Swagger UI and OpenAPI document.
pub mod docs;
/// Health probe.
pub mod health;
/// Read-only session endpoints.
pub mod session;
/// Server-sent event streams.
pub mod sse;
/// Participant WebSocket endpoint.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(session::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
