//! services/coach_api/src/web/protocol.rs
//!
//! Defines the JSON request and response bodies of the REST API.
//!
//! The service is stateless: plans and outcome ledgers travel with each
//! request. Core types are documented as plain objects in the OpenAPI schema.

use crate::planner::PlanSource;
use run_coach_core::{
    domain::{ReportedWorkout, RunnerProfile, SessionOutcome, TrainingPlan, TrainingSession},
    format::FormatStyle,
    matcher::{RawWorkout, WorkoutMatch},
    profile::RawProfile,
    reconcile::{OutcomeReport, Reconciliation},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

//=========================================================================================
// Plan Generation
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GeneratePlanRequest {
    /// Questionnaire answers; numeric answers may be sent as text.
    #[schema(value_type = Object)]
    pub profile: RawProfile,
}

#[derive(Deserialize, ToSchema)]
pub struct ContinuePlanRequest {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub profile: RawProfile,
    /// The plan being continued.
    #[schema(value_type = Object)]
    pub plan: TrainingPlan,
    /// Outcomes recorded so far for `plan`; replayed and checked against it.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub ledger: Vec<SessionOutcome>,
}

#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    #[schema(value_type = Object)]
    pub plan: TrainingPlan,
    pub source: PlanSource,
    /// The normalized profile the plan was built for.
    #[schema(value_type = Object)]
    pub profile: RunnerProfile,
}

//=========================================================================================
// Outcome Reports
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ReportOutcomeRequest {
    /// Only needed when the report may trigger an adjustment.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub profile: RawProfile,
    #[schema(value_type = Object)]
    pub plan: TrainingPlan,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub ledger: Vec<SessionOutcome>,
    #[schema(value_type = Object)]
    pub report: OutcomeReport,
}

#[derive(Serialize, ToSchema)]
pub struct ReportOutcomeResponse {
    #[schema(value_type = Object)]
    pub reconciliation: Reconciliation,
    /// The plan with its remaining sessions regenerated, when an adjustment ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub revised_plan: Option<TrainingPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_source: Option<PlanSource>,
    /// The next pending sessions of the current plan.
    #[schema(value_type = Vec<Object>)]
    pub next_sessions: Vec<TrainingSession>,
}

//=========================================================================================
// Workout Matching
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct MatchWorkoutRequest {
    #[schema(value_type = Object)]
    pub plan: TrainingPlan,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub ledger: Vec<SessionOutcome>,
    /// The workout as reported; dates may use any format tracker apps show.
    #[schema(value_type = Object)]
    pub workout: RawWorkout,
}

#[derive(Serialize, ToSchema)]
pub struct MatchSummary {
    pub ordinal: Option<u32>,
    pub score: u32,
    pub forced: bool,
    /// True when the match is strong enough to record without asking the runner.
    pub automatic: bool,
    #[schema(value_type = Option<Object>)]
    pub session: Option<TrainingSession>,
}

impl MatchSummary {
    pub fn new(found: WorkoutMatch, plan: &TrainingPlan) -> Self {
        Self {
            ordinal: found.ordinal,
            score: found.score,
            forced: found.forced,
            automatic: found.is_automatic(),
            session: found.ordinal.and_then(|o| plan.session(o)).cloned(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MatchWorkoutResponse {
    #[schema(value_type = Object)]
    pub workout: ReportedWorkout,
    pub matched: MatchSummary,
}

#[derive(Serialize, ToSchema)]
pub struct ScreenshotResponse {
    #[schema(value_type = Object)]
    pub workout: ReportedWorkout,
    /// Present when a plan was uploaded along with the screenshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched: Option<MatchSummary>,
}

//=========================================================================================
// Rendering
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RenderPlanRequest {
    #[schema(value_type = Object)]
    pub plan: TrainingPlan,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub ledger: Vec<SessionOutcome>,
    #[serde(default)]
    #[schema(value_type = String, example = "markdown")]
    pub format: FormatStyle,
    /// Render only the next pending sessions instead of the whole plan.
    #[serde(default)]
    pub pending_only: bool,
}

#[derive(Serialize, ToSchema)]
pub struct RenderPlanResponse {
    pub text: String,
}
