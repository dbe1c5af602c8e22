use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/sessions/{id}",
    tag = "sse",
    params(("id" = String, Path, description = "Identifier of the session to monitor")),
    responses((status = 200, description = "Session monitor SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream one session's realtime events to monitor frontends.
pub async fn session_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    state.require_session(id)?;
    let receiver = sse_service::subscribe_session(&state, id);
    info!(session_id = %id, "new session SSE connection");
    Ok(sse_service::to_sse_stream(receiver, StreamKind::Session(id)))
}

#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses((status = 200, description = "Admin SSE stream", content_type = "text/event-stream", body = String))
)]
/// Stream admin-only events, establishing or validating the admin token.
pub async fn admin_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>>, AppError> {
    let (receiver, token) = sse_service::subscribe_admin(&state).await?;
    info!("new admin SSE connection");
    sse_service::broadcast_admin_handshake(state.admin_sse(), &token);
    Ok(sse_service::to_sse_stream(
        receiver,
        StreamKind::Admin(state),
    ))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/sessions/{id}", get(session_stream))
        .route("/sse/admin", get(admin_stream))
}
