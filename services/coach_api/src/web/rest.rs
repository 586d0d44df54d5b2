//! services/coach_api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::{
    error::ApiError,
    planner::PlanSource,
    web::{protocol::*, state::AppState},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use run_coach_core::{
    domain::{SessionOutcome, TrainingPlan},
    format::{render_pending, render_plan},
    matcher::match_workout,
    ports::PortError,
    profile::normalize,
    reconcile::{report_outcome, OutcomeLedger, ReconciliationAction, DEFAULT_PENDING_LIMIT},
};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_plan_handler,
        continue_plan_handler,
        report_outcome_handler,
        match_workout_handler,
        screenshot_handler,
        render_plan_handler,
    ),
    components(
        schemas(
            GeneratePlanRequest,
            ContinuePlanRequest,
            PlanResponse,
            PlanSource,
            ReportOutcomeRequest,
            ReportOutcomeResponse,
            MatchWorkoutRequest,
            MatchWorkoutResponse,
            MatchSummary,
            ScreenshotResponse,
            RenderPlanRequest,
            RenderPlanResponse,
        )
    ),
    tags(
        (name = "Run Coach API", description = "Training-plan scheduling and reconciliation for runners.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Plan Generation Handlers
//=========================================================================================

/// Create a training plan from a runner's questionnaire answers.
///
/// Falls back to a minimal three-session plan when the completion service fails.
#[utoipa::path(
    post,
    path = "/plans",
    request_body = GeneratePlanRequest,
    responses(
        (status = 201, description = "Plan created", body = PlanResponse),
        (status = 400, description = "Malformed request body")
    )
)]
pub async fn generate_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GeneratePlanRequest>,
) -> impl IntoResponse {
    let profile = normalize(&payload.profile, &app_state.normalize_options());
    info!(
        "Generating a plan with {} sessions per week on {:?}",
        profile.sessions_per_week, profile.preferred_weekdays
    );

    let generated = app_state.planner.generate(&profile, Utc::now()).await;
    info!("Plan {} created from {:?}", generated.plan.id, generated.source);

    (
        StatusCode::CREATED,
        Json(PlanResponse {
            plan: generated.plan,
            source: generated.source,
            profile,
        }),
    )
}

/// Create the plan that follows a finished (or abandoned) one.
#[utoipa::path(
    post,
    path = "/plans/continue",
    request_body = ContinuePlanRequest,
    responses(
        (status = 201, description = "Continuation plan created", body = PlanResponse),
        (status = 400, description = "Malformed request body"),
        (status = 422, description = "The ledger does not belong to the plan")
    )
)]
pub async fn continue_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ContinuePlanRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ledger = replay_ledger(&payload.plan, payload.ledger)?;
    let profile = normalize(&payload.profile, &app_state.normalize_options());
    let generated = app_state
        .planner
        .continue_plan(&profile, &payload.plan, &ledger, Utc::now())
        .await
        .map_err(ApiError::from)?;
    info!(
        "Plan {} continues plan {} ({:?})",
        generated.plan.id, payload.plan.id, generated.source
    );

    Ok((
        StatusCode::CREATED,
        Json(PlanResponse {
            plan: generated.plan,
            source: generated.source,
            profile,
        }),
    ))
}

//=========================================================================================
// Reconciliation Handlers
//=========================================================================================

/// Record a completed or canceled session and reconcile the plan.
///
/// When the session deviates by more than 20% (or an adjustment is forced)
/// the remaining sessions are regenerated and returned as `revised_plan`.
#[utoipa::path(
    post,
    path = "/plans/outcomes",
    request_body = ReportOutcomeRequest,
    responses(
        (status = 200, description = "Outcome recorded", body = ReportOutcomeResponse),
        (status = 422, description = "The report or the ledger would break a session invariant")
    )
)]
pub async fn report_outcome_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ReportOutcomeRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ledger = replay_ledger(&payload.plan, payload.ledger)?;
    let reconciliation =
        report_outcome(&payload.plan, &ledger, &payload.report).map_err(|e| {
            error!("Rejected outcome report for plan {}: {}", payload.plan.id, e);
            ApiError::from(e)
        })?;

    let (revised_plan, revised_source) = match &reconciliation.action {
        ReconciliationAction::AdjustRemaining(directive) => {
            info!(
                "Session {} deviated by {:.1}%, regenerating sessions {:?}",
                directive.context.ordinal, directive.context.difference_percent, directive.regenerate
            );
            let profile = normalize(&payload.profile, &app_state.normalize_options());
            let adjusted = app_state
                .planner
                .adjust(&profile, &payload.plan, directive)
                .await
                .map_err(ApiError::from)?;
            (Some(adjusted.plan), Some(adjusted.source))
        }
        ReconciliationAction::RecommendContinuation => {
            info!("Plan {} needs a continuation plan", payload.plan.id);
            (None, None)
        }
        ReconciliationAction::KeepPlan => (None, None),
    };

    let current: &TrainingPlan = revised_plan.as_ref().unwrap_or(&payload.plan);
    let next_sessions = reconciliation
        .ledger
        .pending_sessions(current, DEFAULT_PENDING_LIMIT)
        .into_iter()
        .cloned()
        .collect();

    Ok(Json(ReportOutcomeResponse {
        reconciliation,
        revised_plan,
        revised_source,
        next_sessions,
    }))
}

//=========================================================================================
// Workout Matching Handlers
//=========================================================================================

/// Attribute a reported workout to one of the plan's open sessions.
#[utoipa::path(
    post,
    path = "/plans/match",
    request_body = MatchWorkoutRequest,
    responses(
        (status = 200, description = "Match computed", body = MatchWorkoutResponse),
        (status = 422, description = "Not a running workout, or a ledger that does not belong to the plan")
    )
)]
pub async fn match_workout_handler(
    Json(payload): Json<MatchWorkoutRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ledger = replay_ledger(&payload.plan, payload.ledger)?;
    let workout = payload.workout.into_reported();
    let found = match_workout(&payload.plan, &ledger, &workout).map_err(ApiError::from)?;
    info!("Workout matched session {:?} with score {}", found.ordinal, found.score);

    Ok(Json(MatchWorkoutResponse {
        matched: MatchSummary::new(found, &payload.plan),
        workout,
    }))
}

/// Read a workout from an activity-tracker screenshot.
///
/// Accepts a multipart/form-data request with an `image` file part and
/// optional `plan` and `ledger` parts holding JSON. When a plan is given the
/// extracted workout is matched against it.
#[utoipa::path(
    post,
    path = "/workouts/screenshot",
    request_body(content_type = "multipart/form-data", description = "The screenshot, plus an optional plan and ledger."),
    responses(
        (status = 200, description = "Workout extracted", body = ScreenshotResponse),
        (status = 400, description = "Bad request (e.g., missing image)"),
        (status = 422, description = "The workout is not a running workout"),
        (status = 502, description = "The vision service failed or timed out")
    )
)]
pub async fn screenshot_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut image: Option<(Vec<u8>, String)> = None;
    let mut plan: Option<TrainingPlan> = None;
    let mut outcomes: Vec<SessionOutcome> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().unwrap_or("image/jpeg").to_string();
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read image bytes: {}", e),
                    )
                })?;
                image = Some((data.to_vec(), content_type));
            }
            "plan" => plan = Some(json_field(field, "plan").await?),
            "ledger" => outcomes = json_field(field, "ledger").await?,
            _ => {}
        }
    }

    let (bytes, content_type) = image.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Multipart form must include an image".to_string(),
        )
    })?;

    let timeout = app_state.config.completion_timeout;
    let workout = tokio::time::timeout(
        timeout,
        app_state.vision_adapter.extract_workout(&bytes, &content_type),
    )
    .await
    .unwrap_or_else(|_| Err(PortError::Timeout(timeout.as_secs())))
    .map_err(|e| {
        error!("Failed to extract workout from screenshot: {}", e);
        ApiError::from(e)
    })?;
    info!(
        "Extracted workout: {:?} km on {:?} from {:?}",
        workout.distance_km, workout.date, workout.source
    );

    let matched = match &plan {
        Some(plan) => {
            let ledger = replay_ledger(plan, outcomes)?;
            let found = match_workout(plan, &ledger, &workout).map_err(ApiError::from)?;
            Some(MatchSummary::new(found, plan))
        }
        None => None,
    };

    Ok(Json(ScreenshotResponse { workout, matched }))
}

/// Rebuilds the caller's ledger, rejecting outcomes that do not fit `plan`.
fn replay_ledger(
    plan: &TrainingPlan,
    outcomes: Vec<SessionOutcome>,
) -> Result<OutcomeLedger, (StatusCode, String)> {
    OutcomeLedger::from_outcomes(plan, outcomes).map_err(|e| {
        error!("Rejected ledger for plan {}: {}", plan.id, e);
        <(StatusCode, String)>::from(ApiError::from(e))
    })
}

async fn json_field<T: serde::de::DeserializeOwned>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, (StatusCode, String)> {
    let text = field.text().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read the {} part: {}", name, e),
        )
    })?;
    serde_json::from_str(&text).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("The {} part is not valid JSON: {}", name, e),
        )
    })
}

//=========================================================================================
// Rendering Handlers
//=========================================================================================

/// Render a plan, or its next pending sessions, as plain text or markdown.
#[utoipa::path(
    post,
    path = "/plans/render",
    request_body = RenderPlanRequest,
    responses(
        (status = 200, description = "Rendered text", body = RenderPlanResponse),
        (status = 422, description = "The ledger does not belong to the plan")
    )
)]
pub async fn render_plan_handler(
    Json(payload): Json<RenderPlanRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let ledger = replay_ledger(&payload.plan, payload.ledger)?;
    let formatter = payload.format.formatter();
    let text = if payload.pending_only {
        render_pending(&payload.plan, &ledger, DEFAULT_PENDING_LIMIT, formatter)
    } else {
        render_plan(&payload.plan, &ledger, formatter)
    };
    Ok(Json(RenderPlanResponse { text }))
}
