use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Phenoeval Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::list_sessions,
        crate::routes::session::get_session,
        crate::routes::session::session_report,
        crate::routes::sse::session_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::admin::create_session,
        crate::routes::admin::list_sessions,
        crate::routes::admin::get_session,
        crate::routes::admin::delete_session,
        crate::routes::admin::start_session,
        crate::routes::admin::show_results,
        crate::routes::admin::next_photo,
        crate::routes::admin::restart_photo,
        crate::routes::admin::back_to_start,
        crate::routes::admin::admin_vote,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::VoteValue,
            crate::dto::common::TallyCounts,
            crate::dto::common::PhotoTallySnapshot,
            crate::dto::common::SessionPhaseSnapshot,
            crate::dto::phase::VisibleSessionPhase,
            crate::dto::session::CreateSessionRequest,
            crate::dto::session::SessionSummary,
            crate::dto::session::SessionDetail,
            crate::dto::session::SessionReport,
            crate::dto::session::ParticipantSummary,
            crate::dto::admin::AdminVoteRequest,
            crate::dto::admin::TransitionResponse,
            crate::dto::sse::AdminHandshake,
            crate::dto::ws::ParticipantInboundMessage,
            crate::dto::ws::ParticipantOutboundMessage,
            crate::dto::ws::DemographicsInput,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sessions", description = "Read-only session information"),
        (name = "admin", description = "Admin-only session lifecycle operations"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "participants", description = "WebSocket operations for participant clients"),
    )
)]
pub struct ApiDoc;
