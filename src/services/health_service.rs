use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the storage backend and report the overall service health.
pub async fn current_health(state: &SharedState) -> HealthResponse {
    match state.store().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(_) => HealthResponse::degraded(),
    }
}
