use statig::prelude::*;
use tracing::{debug, warn};

use crate::board::RecordId;

/// Phase of an in-flight move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    /// Source and target columns exist
    Validated,
    /// Transaction acquired for the record
    Locked,
    /// Card optimistically placed in the target column
    Relocated,
    /// Waiting for the check in/out wizard
    Confirming,
    Committed,
    Aborted,
}

impl MovePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MovePhase::Committed | MovePhase::Aborted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveEvent {
    LockAcquired,
    Relocated,
    ConfirmationRequested,
    Commit,
    Abort,
}

struct MoveLifecycle {
    record_id: RecordId,
}

#[state_machine(
    initial = "State::validated()",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl MoveLifecycle {
    #[state]
    fn validated(&mut self, event: &MoveEvent) -> Outcome<State> {
        match event {
            MoveEvent::LockAcquired => {
                debug!(record_id = %self.record_id, "Move locked");
                Transition(State::locked())
            }
            _ => self.ignore(MovePhase::Validated, event),
        }
    }

    #[state]
    fn locked(&mut self, event: &MoveEvent) -> Outcome<State> {
        match event {
            MoveEvent::Relocated => {
                debug!(record_id = %self.record_id, "Card relocated");
                Transition(State::relocated())
            }
            // Pure reorder within one column
            MoveEvent::Commit => Transition(State::committed()),
            MoveEvent::Abort => Transition(State::aborted()),
            _ => self.ignore(MovePhase::Locked, event),
        }
    }

    #[state]
    fn relocated(&mut self, event: &MoveEvent) -> Outcome<State> {
        match event {
            MoveEvent::ConfirmationRequested => {
                debug!(record_id = %self.record_id, "Waiting for confirmation");
                Transition(State::confirming())
            }
            MoveEvent::Commit => Transition(State::committed()),
            MoveEvent::Abort => Transition(State::aborted()),
            _ => self.ignore(MovePhase::Relocated, event),
        }
    }

    #[state]
    fn confirming(&mut self, event: &MoveEvent) -> Outcome<State> {
        match event {
            MoveEvent::Commit => Transition(State::committed()),
            MoveEvent::Abort => Transition(State::aborted()),
            _ => self.ignore(MovePhase::Confirming, event),
        }
    }

    #[state]
    fn committed(&mut self, event: &MoveEvent) -> Outcome<State> {
        self.ignore(MovePhase::Committed, event)
    }

    #[state]
    fn aborted(&mut self, event: &MoveEvent) -> Outcome<State> {
        self.ignore(MovePhase::Aborted, event)
    }
}

impl MoveLifecycle {
    fn ignore(&self, phase: MovePhase, event: &MoveEvent) -> Outcome<State> {
        warn!(record_id = %self.record_id, ?phase, ?event, "Ignoring invalid move transition");
        Handled
    }
}

/// Tracks the phases a single move goes through
pub struct MoveTracker {
    machine: StateMachine<MoveLifecycle>,
    history: Vec<MovePhase>,
}

impl MoveTracker {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            machine: MoveLifecycle { record_id }.state_machine(),
            history: vec![MovePhase::Validated],
        }
    }

    pub fn advance(&mut self, event: MoveEvent) -> MovePhase {
        self.machine.handle(&event);
        let phase = self.phase();
        if self.history.last() != Some(&phase) {
            self.history.push(phase);
        }
        phase
    }

    pub fn phase(&self) -> MovePhase {
        match self.machine.state() {
            State::Validated { .. } => MovePhase::Validated,
            State::Locked { .. } => MovePhase::Locked,
            State::Relocated { .. } => MovePhase::Relocated,
            State::Confirming { .. } => MovePhase::Confirming,
            State::Committed { .. } => MovePhase::Committed,
            State::Aborted { .. } => MovePhase::Aborted,
        }
    }

    pub fn history(&self) -> &[MovePhase] {
        &self.history
    }

    pub fn into_history(self) -> Vec<MovePhase> {
        self.history
    }
}
