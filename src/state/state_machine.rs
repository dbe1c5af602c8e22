use std::time::Instant;

use thiserror::Error;
use uuid::Uuid;

/// Lifecycle phases of a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Participants gather in the waiting room; no photo shown yet.
    Waiting,
    /// A photo is on screen and votes are being collected.
    Active,
    /// Voting for the current photo is frozen; results are displayed.
    ShowingResults,
    /// The last photo has been evaluated; no further advances.
    Completed,
}

/// Events that can be applied to the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Admin starts the session from the waiting room.
    Start,
    /// Freeze votes for the current photo and display results, either on
    /// timer expiry or on an explicit admin action.
    ShowResults,
    /// Advance past the results screen to the next photo, or complete the
    /// session when the current photo was the last one.
    NextPhoto,
    /// Re-run the current photo, invalidating its votes.
    RestartPhoto,
    /// Reset the whole session back to the waiting room, invalidating all
    /// votes.
    BackToStart,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when plan was created.
        expected: SessionPhase,
        /// Current phase.
        actual: SessionPhase,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version when plan was created.
        expected: u64,
        /// Current version.
        actual: u64,
    },
}

/// Errors that can occur when aborting a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A planned state machine transition that has been validated but not yet
/// applied, so persistence work can run (and fail) in between.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine is currently in.
    pub from: SessionPhase,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
    /// Photo index before the transition.
    pub photo_from: u16,
    /// Photo index after the transition.
    pub photo_to: u16,
    /// Whether applying this plan invalidates votes by bumping the
    /// session generation.
    pub bumps_generation: bool,
    /// Event that triggered this transition.
    pub event: SessionEvent,
    /// Version number after applying this transition.
    pub version_next: u64,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: SessionPhase,
    /// 1-based index of the photo currently being shown.
    pub current_photo: u16,
    /// Total number of photos in the session.
    pub photo_count: u16,
    /// Restart counter used to invalidate in-flight votes.
    pub generation: u32,
    /// Version number of the state machine (increments on each transition).
    pub version: u64,
    /// Pending transition phase, if a transition is planned but not yet applied.
    pub pending: Option<SessionPhase>,
}

/// Per-session state machine implementing the evaluation flow:
/// `waiting` → `active` → `showing_results` → next photo or `completed`.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    current_photo: u16,
    photo_count: u16,
    generation: u32,
    version: u64,
    pending: Option<Plan>,
}

impl SessionStateMachine {
    /// Create a state machine in the waiting room, positioned on photo 1.
    pub fn new(photo_count: u16) -> Self {
        Self {
            phase: SessionPhase::Waiting,
            current_photo: 1,
            photo_count: photo_count.max(1),
            generation: 0,
            version: 0,
            pending: None,
        }
    }

    /// Rebuild a machine from persisted session fields.
    pub fn restore(
        phase: SessionPhase,
        current_photo: u16,
        photo_count: u16,
        generation: u32,
        version: u64,
    ) -> Self {
        let photo_count = photo_count.max(1);
        Self {
            phase,
            current_photo: current_photo.clamp(1, photo_count),
            photo_count,
            generation,
            version,
            pending: None,
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// 1-based index of the photo currently being shown.
    pub fn current_photo(&self) -> u16 {
        self.current_photo
    }

    /// Total number of photos in the session.
    pub fn photo_count(&self) -> u16 {
        self.photo_count
    }

    /// Restart counter; votes carrying an older generation are stale.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Version number, incremented on every applied transition.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            current_photo: self.current_photo,
            photo_count: self.photo_count,
            generation: self.generation,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Plan a transition by validating that the event can be applied from the
    /// current phase. Returns a Plan that can later be applied or aborted.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let (to, photo_to, bumps_generation) = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to,
            photo_from: self.current_photo,
            photo_to,
            bumps_generation,
            event,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition, moving the state machine to the next phase.
    /// Returns the new phase after the transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected_plan_id = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected: expected_plan_id,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.current_photo = plan.photo_to;
        if plan.bumps_generation {
            self.generation += 1;
        }
        self.version = plan.version_next;
        self.pending = None;

        Ok(self.phase)
    }

    /// Abort a planned transition without applying it, returning the state
    /// machine to its previous state.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Compute the target `(phase, photo, bumps_generation)` for an event if
    /// the transition is valid from the current phase.
    fn compute_transition(
        &self,
        event: SessionEvent,
    ) -> Result<(SessionPhase, u16, bool), InvalidTransition> {
        let next = match (self.phase, event) {
            (SessionPhase::Waiting, SessionEvent::Start) => (SessionPhase::Active, 1, false),
            (SessionPhase::Active, SessionEvent::ShowResults) => {
                (SessionPhase::ShowingResults, self.current_photo, false)
            }
            (SessionPhase::ShowingResults, SessionEvent::NextPhoto) => {
                if self.current_photo < self.photo_count {
                    (SessionPhase::Active, self.current_photo + 1, false)
                } else {
                    (SessionPhase::Completed, self.current_photo, false)
                }
            }
            (
                SessionPhase::Active | SessionPhase::ShowingResults,
                SessionEvent::RestartPhoto,
            ) => (SessionPhase::Active, self.current_photo, true),
            // The reset action is the only way out of `Completed`.
            (_, SessionEvent::BackToStart) => (SessionPhase::Waiting, 1, true),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut SessionStateMachine, event: SessionEvent) -> SessionPhase {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    #[test]
    fn initial_state_is_waiting_on_photo_one() {
        let sm = SessionStateMachine::new(30);
        assert_eq!(sm.phase(), SessionPhase::Waiting);
        assert_eq!(sm.current_photo(), 1);
    }

    #[test]
    fn full_walk_through_all_photos() {
        let mut sm = SessionStateMachine::new(3);

        assert_eq!(apply(&mut sm, SessionEvent::Start), SessionPhase::Active);
        assert_eq!(sm.current_photo(), 1);

        for photo in 1..=3u16 {
            assert_eq!(sm.current_photo(), photo);
            assert_eq!(
                apply(&mut sm, SessionEvent::ShowResults),
                SessionPhase::ShowingResults
            );
            let next = apply(&mut sm, SessionEvent::NextPhoto);
            if photo < 3 {
                assert_eq!(next, SessionPhase::Active);
                assert_eq!(sm.current_photo(), photo + 1);
            } else {
                assert_eq!(next, SessionPhase::Completed);
                // The index stays on the last photo.
                assert_eq!(sm.current_photo(), 3);
            }
        }
    }

    #[test]
    fn photo_index_stays_within_bounds() {
        let mut sm = SessionStateMachine::new(30);
        apply(&mut sm, SessionEvent::Start);
        for _ in 0..50 {
            assert!(sm.current_photo() >= 1 && sm.current_photo() <= 30);
            if sm.phase() == SessionPhase::Completed {
                break;
            }
            apply(&mut sm, SessionEvent::ShowResults);
            apply(&mut sm, SessionEvent::NextPhoto);
        }
        assert_eq!(sm.phase(), SessionPhase::Completed);
        assert_eq!(sm.current_photo(), 30);
    }

    #[test]
    fn completed_only_accepts_back_to_start() {
        let mut sm = SessionStateMachine::new(1);
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::ShowResults);
        assert_eq!(
            apply(&mut sm, SessionEvent::NextPhoto),
            SessionPhase::Completed
        );

        for event in [
            SessionEvent::Start,
            SessionEvent::ShowResults,
            SessionEvent::NextPhoto,
            SessionEvent::RestartPhoto,
        ] {
            let err = sm.plan(event).unwrap_err();
            assert!(matches!(err, PlanError::InvalidTransition(_)), "{event:?}");
        }

        assert_eq!(
            apply(&mut sm, SessionEvent::BackToStart),
            SessionPhase::Waiting
        );
        assert_eq!(sm.current_photo(), 1);
    }

    #[test]
    fn restart_photo_keeps_index_and_bumps_generation() {
        let mut sm = SessionStateMachine::new(30);
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::ShowResults);
        apply(&mut sm, SessionEvent::NextPhoto);
        assert_eq!(sm.current_photo(), 2);
        assert_eq!(sm.generation(), 0);

        assert_eq!(
            apply(&mut sm, SessionEvent::RestartPhoto),
            SessionPhase::Active
        );
        assert_eq!(sm.current_photo(), 2);
        assert_eq!(sm.generation(), 1);
    }

    #[test]
    fn back_to_start_resets_photo_and_bumps_generation() {
        let mut sm = SessionStateMachine::new(30);
        apply(&mut sm, SessionEvent::Start);
        apply(&mut sm, SessionEvent::ShowResults);
        apply(&mut sm, SessionEvent::NextPhoto);

        assert_eq!(
            apply(&mut sm, SessionEvent::BackToStart),
            SessionPhase::Waiting
        );
        assert_eq!(sm.current_photo(), 1);
        assert_eq!(sm.generation(), 1);
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = SessionStateMachine::new(30);
        let err = sm.plan(SessionEvent::NextPhoto).unwrap_err();
        match err {
            PlanError::InvalidTransition(invalid) => {
                assert_eq!(invalid.from, SessionPhase::Waiting);
                assert_eq!(invalid.event, SessionEvent::NextPhoto);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn planning_twice_requires_resolution_first() {
        let mut sm = SessionStateMachine::new(30);
        let plan = sm.plan(SessionEvent::Start).unwrap();
        assert_eq!(
            sm.plan(SessionEvent::Start).unwrap_err(),
            PlanError::AlreadyPending
        );
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        // Aborting leaves the machine untouched and plannable again.
        assert_eq!(sm.phase(), SessionPhase::Waiting);
        assert!(sm.plan(SessionEvent::Start).is_ok());
    }

    #[test]
    fn apply_rejects_mismatched_plan_id() {
        let mut sm = SessionStateMachine::new(30);
        let _plan = sm.plan(SessionEvent::Start).unwrap();
        let err = sm.apply(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, ApplyError::IdMismatch { .. }));
        // The pending plan survives a bad apply attempt.
        assert!(sm.pending.is_some());
    }

    #[test]
    fn version_increments_on_every_transition() {
        let mut sm = SessionStateMachine::new(30);
        assert_eq!(sm.version(), 0);
        apply(&mut sm, SessionEvent::Start);
        assert_eq!(sm.version(), 1);
        apply(&mut sm, SessionEvent::ShowResults);
        assert_eq!(sm.version(), 2);
    }
}
