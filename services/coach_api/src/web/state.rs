//! services/coach_api/src/web/state.rs
//!
//! Defines the application state shared by all handlers.

use crate::{config::Config, planner::PlanService};
use run_coach_core::{ports::WorkoutExtractionService, profile::NormalizeOptions};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// The service keeps no plans of its own; callers send the plan and its
/// outcome ledger with every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub planner: Arc<PlanService>,
    pub vision_adapter: Arc<dyn WorkoutExtractionService>,
}

impl AppState {
    pub fn normalize_options(&self) -> NormalizeOptions {
        self.config.normalize_options()
    }
}
