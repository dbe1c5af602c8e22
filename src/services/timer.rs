//! Server-side countdown for the photo voting window.
//!
//! The server clock is authoritative: clients only render the ticks they
//! receive and never close a window themselves.

use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval};
use tracing::warn;

use crate::{
    services::{admin_service, session_service, sse_events},
    state::{SessionRuntime, SharedState, state_machine::SessionPhase},
};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Arm the countdown for the photo currently on screen.
///
/// The task re-checks phase, photo and generation on every tick and winds
/// down silently as soon as any of them moved on, so a restart or a manual
/// freeze orphans the old timer instead of racing it.
pub fn spawn_photo_timer(state: SharedState, session: Arc<SessionRuntime>) {
    tokio::spawn(async move {
        let armed = session.state().await;
        if armed.phase != SessionPhase::Active {
            return;
        }
        let photo = armed.current_photo;
        let generation = armed.generation;

        let mut ticker = interval(TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of a Tokio interval fires immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let machine = session.state().await;
            if machine.phase != SessionPhase::Active
                || machine.current_photo != photo
                || machine.generation != generation
            {
                return;
            }

            let meta = session.read_meta().await;
            let remaining = session_service::remaining_secs(&meta).unwrap_or(0);
            if remaining == 0 {
                if let Err(err) =
                    admin_service::finish_photo_after_timeout(&state, &session, photo, generation)
                        .await
                {
                    warn!(
                        session_id = %session.id,
                        photo,
                        error = %err,
                        "failed to freeze photo after window expiry"
                    );
                }
                return;
            }

            sse_events::broadcast_timer_tick(&state, &session, photo, remaining);
        }
    });
}
