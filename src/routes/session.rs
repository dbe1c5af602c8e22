use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use uuid::Uuid;

use crate::{
    dto::session::{SessionDetail, SessionReport, SessionSummary},
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Read-only session endpoints used by monitors and participant frontends.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/report", get(session_report))
}

/// List every known session.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    responses((status = 200, description = "Known sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(session_service::list_sessions(&state).await?))
}

/// Fetch one session's detail view, including the live phase snapshot.
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Session detail", body = SessionDetail))
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    Ok(Json(session_service::get_session(&state, id).await?))
}

/// Per-photo results report for one session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/report",
    tag = "sessions",
    params(("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Session report", body = SessionReport))
)]
pub async fn session_report(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionReport>, AppError> {
    let session = state.require_session(id)?;
    Ok(Json(session_service::report(&state, &session).await?))
}
