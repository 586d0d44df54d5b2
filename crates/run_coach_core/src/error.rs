//! crates/run_coach_core/src/error.rs
//!
//! Errors raised when a caller asks the engine to break one of its invariants.
//! These are rejected operations, distinct from the `PortError` failures of
//! external services.

use crate::domain::SessionStatus;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoachError {
    #[error("Session {ordinal} does not exist; the plan has {len} sessions")]
    OrdinalOutOfRange { ordinal: u32, len: usize },

    #[error("Session {ordinal} is already {from} and cannot become {to}")]
    IllegalTransition {
        ordinal: u32,
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Session {ordinal} was reported completed without a distance")]
    MissingDistance { ordinal: u32 },

    #[error("Invalid distance for session {ordinal}: {value}")]
    InvalidDistance { ordinal: u32, value: f64 },

    #[error("Outcome belongs to plan {found}, expected plan {expected}")]
    PlanMismatch { expected: Uuid, found: Uuid },

    #[error("Workout type '{0}' is not supported yet; only running workouts can be matched")]
    UnsupportedWorkout(String),
}
