use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        admin::{AdminVoteRequest, TransitionResponse},
        common::PhotoTallySnapshot,
        session::{CreateSessionRequest, SessionDetail, SessionSummary},
    },
    error::AppError,
    services::{admin_service, session_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only management endpoints for configuring and driving sessions.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/sessions", get(list_sessions).post(create_session))
        .route(
            "/admin/sessions/{id}",
            get(get_session).delete(delete_session),
        )
        .route("/admin/sessions/{id}/start", post(start_session))
        .route("/admin/sessions/{id}/results", post(show_results))
        .route("/admin/sessions/{id}/next", post(next_photo))
        .route("/admin/sessions/{id}/restart", post(restart_photo))
        .route("/admin/sessions/{id}/reset", post(back_to_start))
        .route("/admin/sessions/{id}/vote", post(admin_vote))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Retrieve all sessions known to the system for administration purposes.
#[utoipa::path(
    get,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "List available sessions", body = [SessionSummary]))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(session_service::list_sessions(&state).await?))
}

/// Create a fresh session in the waiting phase.
#[utoipa::path(
    post,
    path = "/admin/sessions",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreateSessionRequest,
    responses((status = 200, description = "Session created", body = SessionDetail))
)]
pub async fn create_session(
    State(state): State<SharedState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<Json<SessionDetail>, AppError> {
    payload.validate()?;
    Ok(Json(session_service::create_session(&state, payload).await?))
}

/// Retrieve a session by its ID.
#[utoipa::path(
    get,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session to retrieve")),
    responses((status = 200, description = "Session detail", body = SessionDetail))
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    Ok(Json(session_service::get_session(&state, id).await?))
}

/// Delete a session together with its votes.
#[utoipa::path(
    delete,
    path = "/admin/sessions/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session to delete")),
    responses((status = 204, description = "Session deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session_service::delete_session(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Open the first photo window of a waiting session.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session to start")),
    responses((status = 200, description = "Session started", body = TransitionResponse))
)]
pub async fn start_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let snapshot = admin_service::start_session(&state, id).await?;
    Ok(Json(TransitionResponse { snapshot }))
}

/// Freeze the current photo's votes and show its results.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/results",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Results frozen", body = TransitionResponse))
)]
pub async fn show_results(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let snapshot = admin_service::show_results(&state, id).await?;
    Ok(Json(TransitionResponse { snapshot }))
}

/// Advance to the next photo or complete the session.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/next",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Advanced", body = TransitionResponse))
)]
pub async fn next_photo(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let snapshot = admin_service::next_photo(&state, id).await?;
    Ok(Json(TransitionResponse { snapshot }))
}

/// Reopen the current photo with a fresh window, voiding its votes.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/restart",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Photo restarted", body = TransitionResponse))
)]
pub async fn restart_photo(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let snapshot = admin_service::restart_current_photo(&state, id).await?;
    Ok(Json(TransitionResponse { snapshot }))
}

/// Return the session to the waiting room, voiding all votes.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    responses((status = 200, description = "Session reset", body = TransitionResponse))
)]
pub async fn back_to_start(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransitionResponse>, AppError> {
    let snapshot = admin_service::back_to_start(&state, id).await?;
    Ok(Json(TransitionResponse { snapshot }))
}

/// Record or replace the administrator's verdict on the current photo.
#[utoipa::path(
    post,
    path = "/admin/sessions/{id}/vote",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the session")),
    request_body = AdminVoteRequest,
    responses((status = 200, description = "Verdict recorded", body = PhotoTallySnapshot))
)]
pub async fn admin_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminVoteRequest>,
) -> Result<Json<PhotoTallySnapshot>, AppError> {
    Ok(Json(
        admin_service::admin_vote(&state, id, payload.response).await?,
    ))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
