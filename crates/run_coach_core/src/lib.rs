pub mod calendar;
pub mod domain;
pub mod error;
pub mod format;
pub mod matcher;
pub mod ports;
pub mod profile;
pub mod reconcile;
pub mod request;

pub use calendar::ScheduledDay;
pub use domain::{
    AdjustmentContext, GoalDistance, ReportedWorkout, RunnerProfile, SessionOutcome, SessionStatus,
    TrainingPlan, TrainingSession,
};
pub use error::CoachError;
pub use format::{FormatStyle, SessionFormatter};
pub use matcher::{RawWorkout, WorkoutMatch};
pub use ports::{PlanCompletionService, PortError, PortResult, WorkoutExtractionService};
pub use profile::{NormalizeOptions, RawProfile};
pub use reconcile::{
    AdjustmentDirective, OutcomeLedger, OutcomeReport, PlanProgress, PlanSummary, Reconciliation,
    ReconciliationAction,
};
pub use request::{CompletionRequest, CompletionResponse, PlanMode};
