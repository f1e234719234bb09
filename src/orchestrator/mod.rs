// Move orchestrator - confirm-before-commit drag and drop
//
// A move is validated, locked, optimistically relocated, confirmed through the check in/out
// wizard when the attendance type changes, then committed or rolled back.

pub mod lifecycle;
pub mod mover;
pub mod types;

#[cfg(test)]
pub mod mocks;


pub use lifecycle::{MoveEvent, MovePhase, MoveTracker};
pub use mover::MoveOrchestrator;
pub use types::{AbortReason, IgnoreReason, MoveError, MoveOutcome, MoveRequest};
