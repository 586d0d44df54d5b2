pub mod protocol;
pub mod rest;
pub mod state;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use rest::{
    continue_plan_handler, generate_plan_handler, match_workout_handler, render_plan_handler,
    report_outcome_handler, screenshot_handler,
};
use state::AppState;
use std::sync::Arc;

/// Builds the API router. Screenshots are capped at 10 MiB.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/plans", post(generate_plan_handler))
        .route("/plans/continue", post(continue_plan_handler))
        .route("/plans/outcomes", post(report_outcome_handler))
        .route("/plans/match", post(match_workout_handler))
        .route("/plans/render", post(render_plan_handler))
        .route("/workouts/screenshot", post(screenshot_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(app_state)
}
