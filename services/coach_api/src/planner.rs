//! services/coach_api/src/planner.rs
//!
//! Orchestrates plan generation: resolves the calendar, builds the completion
//! request, calls the completion port under a timeout and falls back to the
//! minimal plan when the service fails. The caller always gets a plan.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use run_coach_core::{
    calendar::{self, ScheduledDay},
    domain::{RunnerProfile, TrainingPlan},
    error::CoachError,
    ports::{PlanCompletionService, PortError, PortResult},
    reconcile::{apply_adjustment, AdjustmentDirective, OutcomeLedger},
    request::{build_request, fallback_plan, CompletionRequest, ContinuationContext, PlanMode},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use utoipa::ToSchema;

/// Where a returned plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Completion,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedPlan {
    pub plan: TrainingPlan,
    pub source: PlanSource,
}

pub struct PlanService {
    completion: Arc<dyn PlanCompletionService>,
    timeout: Duration,
    timezone: FixedOffset,
}

impl PlanService {
    pub fn new(completion: Arc<dyn PlanCompletionService>, timeout: Duration, timezone: FixedOffset) -> Self {
        Self {
            completion,
            timeout,
            timezone,
        }
    }

    /// The runner's local calendar date at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    pub async fn generate(&self, profile: &RunnerProfile, now: DateTime<Utc>) -> GeneratedPlan {
        let today = self.today(now);
        let schedule = calendar::resolve(
            profile.start_hint.as_deref(),
            &profile.preferred_weekdays,
            profile.sessions_per_week,
            today,
        );
        let request = build_request(profile, &schedule, &PlanMode::Fresh);

        match self.complete(&request, &schedule, now).await {
            Ok(plan) => GeneratedPlan {
                plan,
                source: PlanSource::Completion,
            },
            Err(e) => {
                warn!("Plan completion failed, serving the fallback plan: {}", e);
                GeneratedPlan {
                    plan: fallback_plan(profile, today, now),
                    source: PlanSource::Fallback,
                }
            }
        }
    }

    /// Generates the plan that follows `previous`, starting from today.
    ///
    /// Fails only when `ledger` does not belong to `previous`.
    pub async fn continue_plan(
        &self,
        profile: &RunnerProfile,
        previous: &TrainingPlan,
        ledger: &OutcomeLedger,
        now: DateTime<Utc>,
    ) -> Result<GeneratedPlan, CoachError> {
        let today = self.today(now);
        let context = ContinuationContext::from_plan(previous, ledger, now)?;
        info!(
            "Continuing plan '{}': {:.1} km over {} days (rapid: {})",
            previous.name, context.completed_distance_km, context.elapsed_days, context.rapid_completion
        );

        let schedule = calendar::resolve(None, &profile.preferred_weekdays, profile.sessions_per_week, today);
        let request = build_request(profile, &schedule, &PlanMode::Continuation(context));

        let generated = match self.complete(&request, &schedule, now).await {
            Ok(plan) => GeneratedPlan {
                plan,
                source: PlanSource::Completion,
            },
            Err(e) => {
                warn!("Continuation completion failed, serving the fallback plan: {}", e);
                let mut fallback_profile = profile.clone();
                fallback_profile.start_hint = None;
                GeneratedPlan {
                    plan: fallback_plan(&fallback_profile, today, now),
                    source: PlanSource::Fallback,
                }
            }
        };
        Ok(generated)
    }

    /// Regenerates the open sessions named by `directive` and merges them into `plan`.
    ///
    /// When the completion service fails the plan is returned unchanged.
    pub async fn adjust(
        &self,
        profile: &RunnerProfile,
        plan: &TrainingPlan,
        directive: &AdjustmentDirective,
    ) -> Result<GeneratedPlan, CoachError> {
        let frozen_sessions = plan
            .sessions
            .iter()
            .filter(|s| s.ordinal <= directive.frozen_through)
            .cloned()
            .collect();
        let mode = PlanMode::Adjustment {
            directive: directive.clone(),
            frozen_sessions,
        };
        let request = build_request(profile, &directive.schedule, &mode);

        match self.complete(&request, &directive.schedule, plan.created_at).await {
            Ok(regenerated) => Ok(GeneratedPlan {
                plan: apply_adjustment(plan, directive, &regenerated)?,
                source: PlanSource::Completion,
            }),
            Err(e) => {
                warn!("Adjustment completion failed, keeping the current plan: {}", e);
                Ok(GeneratedPlan {
                    plan: plan.clone(),
                    source: PlanSource::Fallback,
                })
            }
        }
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        schedule: &[ScheduledDay],
        created_at: DateTime<Utc>,
    ) -> PortResult<TrainingPlan> {
        let start_time = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.completion.complete_plan(request))
            .await
            .map_err(|_| PortError::Timeout(self.timeout.as_secs()))??;
        info!("⏱️ Plan completion took: {:?}", start_time.elapsed());
        response.into_plan(schedule, created_at)
    }
}
