use std::sync::Arc;

use crate::{
    error::ServiceError,
    services::sse_events::broadcast_phase_changed,
    state::{SessionRuntime, SharedState, state_machine::SessionEvent},
};

/// Execute a planned state-machine transition for one session, then
/// broadcast the resulting phase change to its subscribers.
pub async fn run_transition_with_broadcast<F, Fut, T>(
    state: &SharedState,
    session: &Arc<SessionRuntime>,
    event: SessionEvent,
    work: F,
) -> Result<(T, crate::state::Plan), ServiceError>
where
    F: FnOnce(crate::state::Plan) -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let (res, plan) = session.run_transition(event, work).await?;
    broadcast_phase_changed(state, session, plan.to).await;
    Ok((res, plan))
}
