/// Runtime session metadata and entity conversions.
pub mod session;
mod sse;
/// Per-session lifecycle state machine.
pub mod state_machine;
/// Transition execution helpers that pair persistence with fan-out.
pub mod transitions;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{models::SessionEntity, session_store::SessionStore},
    error::ServiceError,
    state::{
        session::{DemographicProfile, SessionMeta},
        state_machine::{SessionEvent, SessionPhase, SessionStateMachine},
    },
};

pub use self::sse::SseHub;
use self::sse::SseState;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

/// Cheaply cloneable handle on the shared application state.
pub type SharedState = Arc<AppState>;
/// Upper bound on how long a transition's persistence work may run.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
/// Handle used to push messages to a connected participant socket.
pub struct ParticipantConnection {
    /// Opaque identity announced by the participant.
    pub participant_id: String,
    /// Display name shown in rosters.
    pub display_name: String,
    /// Demographic snapshot supplied at join time.
    pub demographics: DemographicProfile,
    /// When the participant joined the session channel.
    pub joined_at: SystemTime,
    /// Outbound channel feeding the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Live, in-memory counterpart of one persisted session: its state machine,
/// mutable metadata and the ephemeral presence registry.
pub struct SessionRuntime {
    /// Identifier shared with the persisted session entity.
    pub id: Uuid,
    machine: RwLock<SessionStateMachine>,
    meta: RwLock<SessionMeta>,
    presence: DashMap<String, ParticipantConnection>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl SessionRuntime {
    /// Build the runtime for a (new or restored) session entity.
    pub fn new(entity: &SessionEntity) -> Arc<Self> {
        Arc::new(Self {
            id: entity.id,
            machine: RwLock::new(SessionStateMachine::restore(
                entity.phase.into(),
                entity.current_photo,
                entity.photo_count,
                entity.generation,
                entity.version,
            )),
            meta: RwLock::new(SessionMeta::from_entity(entity)),
            presence: DashMap::new(),
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Snapshot the current phase.
    pub async fn phase(&self) -> SessionPhase {
        self.machine.read().await.phase()
    }

    /// 1-based index of the photo currently being shown.
    pub async fn current_photo(&self) -> u16 {
        self.machine.read().await.current_photo()
    }

    /// Total number of photos in this session.
    pub async fn photo_count(&self) -> u16 {
        self.machine.read().await.photo_count()
    }

    /// Restart counter used to invalidate in-flight votes.
    pub async fn generation(&self) -> u32 {
        self.machine.read().await.generation()
    }

    /// Full state-machine snapshot.
    pub async fn state(&self) -> Snapshot {
        self.machine.read().await.snapshot()
    }

    /// Registry of connected participants keyed by their identity.
    pub fn presence(&self) -> &DashMap<String, ParticipantConnection> {
        &self.presence
    }

    /// Clone of the session metadata.
    pub async fn read_meta(&self) -> SessionMeta {
        self.meta.read().await.clone()
    }

    /// Mutate the session metadata under its write lock.
    pub async fn with_meta_mut<F, T>(&self, mutate: F) -> T
    where
        F: FnOnce(&mut SessionMeta) -> T,
    {
        let mut guard = self.meta.write().await;
        mutate(&mut guard)
    }

    /// Assemble the entity this plan would persist: current metadata plus the
    /// plan's target phase/photo/generation. `photo_started_at` is passed in
    /// so metadata is only mutated after the transition commits.
    pub async fn entity_for_plan(
        &self,
        plan: &Plan,
        photo_started_at: Option<SystemTime>,
    ) -> SessionEntity {
        let meta = self.meta.read().await;
        let machine = self.machine.read().await;
        let generation = if plan.bumps_generation {
            machine.generation() + 1
        } else {
            machine.generation()
        };

        SessionEntity {
            id: self.id,
            name: meta.name.clone(),
            scheduled_for: meta.scheduled_for,
            created_at: meta.created_at,
            updated_at: SystemTime::now(),
            phase: plan.to.into(),
            current_photo: plan.photo_to,
            photo_count: machine.photo_count(),
            photo_started_at,
            photo_duration_secs: meta.photo_duration_secs,
            generation,
            version: plan.version_next,
        }
    }

    async fn plan_transition(&self, event: SessionEvent) -> Result<Plan, PlanError> {
        let mut machine = self.machine.write().await;
        machine.plan(event)
    }

    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let mut machine = self.machine.write().await;
        machine.apply(plan_id)
    }

    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut machine = self.machine.write().await;
        machine.abort(plan_id)
    }

    /// Execute a transition: plan it, run the persistence `work`, and only
    /// apply the plan when the work succeeds. Failures and timeouts abort
    /// the plan and leave the prior phase intact. The per-session gate
    /// serializes concurrent admin actions.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: SessionEvent,
        work: F,
    ) -> Result<(T, Plan), ServiceError>
    where
        F: FnOnce(Plan) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let plan = self.plan_transition(event).await?;
        let plan_id = plan.id;

        let work_future = work(plan.clone());
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            session_id = %self.id,
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                self.apply_planned_transition(plan_id).await?;
                drop(gate);
                Ok((value, plan))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        session_id = %self.id,
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

/// Central application state storing the session registry, the storage
/// backend and the SSE hubs.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn SessionStore>,
    sessions: DashMap<Uuid, Arc<SessionRuntime>>,
    sse: SseState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, store: Arc<dyn SessionStore>) -> SharedState {
        Arc::new(Self {
            config,
            store,
            sessions: DashMap::new(),
            sse: SseState::new(32, 32),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the storage backend.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// Look up the runtime of a session, if it exists.
    pub fn session(&self, id: Uuid) -> Option<Arc<SessionRuntime>> {
        self.sessions.get(&id).map(|entry| entry.clone())
    }

    /// Look up the runtime of a session or fail with a not-found error.
    pub fn require_session(&self, id: Uuid) -> Result<Arc<SessionRuntime>, ServiceError> {
        self.session(id)
            .ok_or_else(|| ServiceError::NotFound(format!("session `{id}` not found")))
    }

    /// Register the runtime of a freshly created session.
    pub fn install_session(&self, runtime: Arc<SessionRuntime>) {
        self.sessions.insert(runtime.id, runtime);
    }

    /// Remove a session runtime and its SSE hub.
    pub fn remove_session(&self, id: Uuid) -> Option<Arc<SessionRuntime>> {
        self.sse.remove_session(id);
        self.sessions.remove(&id).map(|(_, runtime)| runtime)
    }

    /// Broadcast hub used for one session's monitor SSE stream.
    pub fn session_sse(&self, session_id: Uuid) -> SseHub {
        self.sse.session(session_id)
    }

    /// Broadcast hub used for the admin SSE stream.
    pub fn admin_sse(&self) -> &SseHub {
        self.sse.admin().hub()
    }

    /// Token guard that ensures a single admin SSE subscriber at a time.
    pub fn admin_token(&self) -> &Mutex<Option<String>> {
        self.sse.admin().token()
    }
}
