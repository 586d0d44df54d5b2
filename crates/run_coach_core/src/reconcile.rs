//! crates/run_coach_core/src/reconcile.rs
//!
//! The reconciliation engine. Records session outcomes in a per-plan ledger,
//! compares completed sessions against their planned distance and decides
//! whether the rest of the plan stays, gets regenerated, or whether the runner
//! should be offered a continuation plan.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::calendar::ScheduledDay;
use crate::domain::{
    AdjustmentContext, SessionOutcome, SessionStatus, TrainingPlan, TrainingSession,
};
use crate::error::CoachError;

/// Deviations strictly above this percentage call for a plan adjustment.
pub const ADJUSTMENT_THRESHOLD_PERCENT: f64 = 20.0;

/// How many upcoming sessions the pending view shows by default.
pub const DEFAULT_PENDING_LIMIT: usize = 3;

//=========================================================================================
// Outcome Ledger
//=========================================================================================

/// All recorded outcomes of one plan, keyed by session ordinal.
///
/// Sessions without an entry are pending. A ledger is only ever filled
/// through `record`, so it serializes as a plain list but is rebuilt from
/// one with `from_outcomes` against the plan it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(into = "Vec<SessionOutcome>")]
pub struct OutcomeLedger {
    outcomes: BTreeMap<u32, SessionOutcome>,
}

impl From<OutcomeLedger> for Vec<SessionOutcome> {
    fn from(ledger: OutcomeLedger) -> Self {
        ledger.outcomes.into_values().collect()
    }
}

/// Session counts of a plan by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub total: usize,
    pub completed: usize,
    pub canceled: usize,
    pub pending: usize,
}

impl PlanProgress {
    pub fn is_exhausted(&self) -> bool {
        self.total > 0 && self.pending == 0
    }
}

/// What a fully worked-through plan amounted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub completed_sessions: usize,
    pub canceled_sessions: usize,
    pub completed_distance_km: f64,
}

impl OutcomeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays previously recorded outcomes of `plan`, in order.
    ///
    /// Every outcome goes through `record`, so a list holding another plan's
    /// outcomes, unknown ordinals or completed sessions without a distance is
    /// rejected as a whole.
    pub fn from_outcomes<I>(plan: &TrainingPlan, outcomes: I) -> Result<Self, CoachError>
    where
        I: IntoIterator<Item = SessionOutcome>,
    {
        let mut ledger = Self::new();
        for outcome in outcomes {
            ledger.record(plan, outcome)?;
        }
        Ok(ledger)
    }

    /// Checks that every stored outcome refers to a session of `plan`.
    pub fn ensure_belongs_to(&self, plan: &TrainingPlan) -> Result<(), CoachError> {
        for outcome in self.outcomes.values() {
            if outcome.plan_id != plan.id {
                return Err(CoachError::PlanMismatch {
                    expected: plan.id,
                    found: outcome.plan_id,
                });
            }
            if plan.session(outcome.ordinal).is_none() {
                return Err(CoachError::OrdinalOutOfRange {
                    ordinal: outcome.ordinal,
                    len: plan.len(),
                });
            }
        }
        Ok(())
    }

    pub fn outcome(&self, ordinal: u32) -> Option<&SessionOutcome> {
        self.outcomes.get(&ordinal)
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &SessionOutcome> {
        self.outcomes.values()
    }

    pub fn status(&self, ordinal: u32) -> SessionStatus {
        self.outcome(ordinal)
            .map(|o| o.status)
            .unwrap_or(SessionStatus::Pending)
    }

    /// Records an outcome, enforcing the one-way session state machine.
    ///
    /// Rewriting a terminal status with the same status replaces the earlier
    /// entry; switching between completed and canceled is rejected.
    pub fn record(&mut self, plan: &TrainingPlan, outcome: SessionOutcome) -> Result<(), CoachError> {
        if outcome.plan_id != plan.id {
            return Err(CoachError::PlanMismatch {
                expected: plan.id,
                found: outcome.plan_id,
            });
        }
        if plan.session(outcome.ordinal).is_none() {
            return Err(CoachError::OrdinalOutOfRange {
                ordinal: outcome.ordinal,
                len: plan.len(),
            });
        }
        if outcome.status == SessionStatus::Completed {
            match outcome.actual_distance_km {
                None => return Err(CoachError::MissingDistance { ordinal: outcome.ordinal }),
                Some(km) if !km.is_finite() || km < 0.0 => {
                    return Err(CoachError::InvalidDistance {
                        ordinal: outcome.ordinal,
                        value: km,
                    })
                }
                Some(_) => {}
            }
        }

        let current = self.status(outcome.ordinal);
        if current.is_terminal() && current != outcome.status {
            return Err(CoachError::IllegalTransition {
                ordinal: outcome.ordinal,
                from: current,
                to: outcome.status,
            });
        }
        if outcome.status == SessionStatus::Pending {
            return Ok(());
        }
        self.outcomes.insert(outcome.ordinal, outcome);
        Ok(())
    }

    /// Sessions still pending, in ordinal order.
    pub fn open_sessions<'a>(
        &'a self,
        plan: &'a TrainingPlan,
    ) -> impl Iterator<Item = &'a TrainingSession> + 'a {
        plan.sessions
            .iter()
            .filter(move |s| self.status(s.ordinal) == SessionStatus::Pending)
    }

    /// The next `limit` pending sessions.
    pub fn pending_sessions<'a>(&'a self, plan: &'a TrainingPlan, limit: usize) -> Vec<&'a TrainingSession> {
        self.open_sessions(plan).take(limit).collect()
    }

    pub fn progress(&self, plan: &TrainingPlan) -> PlanProgress {
        let mut progress = PlanProgress {
            total: plan.len(),
            completed: 0,
            canceled: 0,
            pending: 0,
        };
        for session in &plan.sessions {
            match self.status(session.ordinal) {
                SessionStatus::Pending => progress.pending += 1,
                SessionStatus::Completed => progress.completed += 1,
                SessionStatus::Canceled => progress.canceled += 1,
            }
        }
        progress
    }

    pub fn is_exhausted(&self, plan: &TrainingPlan) -> bool {
        self.progress(plan).is_exhausted()
    }

    /// Sum of actual distances over the completed sessions of `plan`.
    pub fn completed_distance_km(&self, plan: &TrainingPlan) -> f64 {
        plan.sessions
            .iter()
            .filter_map(|session| self.outcome(session.ordinal))
            .filter(|o| o.plan_id == plan.id && o.status == SessionStatus::Completed)
            .filter_map(|o| o.actual_distance_km)
            .sum()
    }

    pub fn summary(&self, plan: &TrainingPlan) -> PlanSummary {
        let progress = self.progress(plan);
        PlanSummary {
            completed_sessions: progress.completed,
            canceled_sessions: progress.canceled,
            completed_distance_km: self.completed_distance_km(plan),
        }
    }
}

//=========================================================================================
// Deviation Assessment
//=========================================================================================

/// Percentage deviation of `actual` from `planned`, always non-negative.
pub fn difference_percent(planned_km: f64, actual_km: f64) -> f64 {
    if planned_km > 0.0 {
        (actual_km - planned_km).abs() / planned_km * 100.0
    } else if actual_km > 0.0 {
        100.0
    } else {
        0.0
    }
}

impl AdjustmentContext {
    pub fn evaluate(session: &TrainingSession, planned_km: f64, actual_km: f64) -> Self {
        let difference = difference_percent(planned_km, actual_km);
        let signed = if actual_km < planned_km { -difference } else { difference };
        Self {
            ordinal: session.ordinal,
            session_type: session.session_type.clone(),
            planned_distance_km: planned_km,
            actual_distance_km: actual_km,
            difference_percent: difference,
            signed_difference_percent: signed,
            needs_adjustment: difference > ADJUSTMENT_THRESHOLD_PERCENT,
        }
    }

    /// The note sent along with an adjustment request when no operator note is given.
    pub fn describe(&self) -> String {
        let direction = if self.signed_difference_percent < 0.0 { "less" } else { "more" };
        format!(
            "Session {} ({}) was planned at {:.1} km but the runner ran {:.1} km, {:.0}% {} than planned. Rework the remaining sessions around this result.",
            self.ordinal,
            self.session_type,
            self.planned_distance_km,
            self.actual_distance_km,
            self.difference_percent,
            direction,
        )
    }
}

//=========================================================================================
// Outcome Reports
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportedResult {
    Completed { actual_distance_km: f64 },
    Canceled,
}

/// A runner's report about one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub ordinal: u32,
    #[serde(flatten)]
    pub result: ReportedResult,
    /// Overrides the session's planned distance for the comparison.
    #[serde(default)]
    pub planned_distance_km: Option<f64>,
    #[serde(default)]
    pub force_adjustment: bool,
    #[serde(default)]
    pub adjustment_note: Option<String>,
}

/// Instructions for regenerating the open tail of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentDirective {
    pub plan_id: Uuid,
    pub context: AdjustmentContext,
    /// Sessions with an ordinal up to and including this one are left untouched.
    pub frozen_through: u32,
    pub regenerate: Vec<u32>,
    /// Dates of the regenerated slots, in ordinal order.
    pub schedule: Vec<ScheduledDay>,
    #[serde(default)]
    pub override_note: Option<String>,
    #[serde(default)]
    pub forced: bool,
}

impl AdjustmentDirective {
    /// The operator note when one was given, otherwise the generated one.
    pub fn note(&self) -> String {
        self.override_note
            .clone()
            .unwrap_or_else(|| self.context.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ReconciliationAction {
    KeepPlan,
    AdjustRemaining(AdjustmentDirective),
    RecommendContinuation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub ledger: OutcomeLedger,
    pub assessment: Option<AdjustmentContext>,
    pub action: ReconciliationAction,
    pub progress: PlanProgress,
    /// Present once every session is completed or canceled.
    pub exhausted: Option<PlanSummary>,
}

/// Records `report` against a copy of `ledger` and decides what happens to the plan.
pub fn report_outcome(
    plan: &TrainingPlan,
    ledger: &OutcomeLedger,
    report: &OutcomeReport,
) -> Result<Reconciliation, CoachError> {
    ledger.ensure_belongs_to(plan)?;
    let session = plan
        .session(report.ordinal)
        .ok_or(CoachError::OrdinalOutOfRange {
            ordinal: report.ordinal,
            len: plan.len(),
        })?;

    let (status, actual_distance_km) = match report.result {
        ReportedResult::Completed { actual_distance_km } => {
            (SessionStatus::Completed, Some(actual_distance_km))
        }
        ReportedResult::Canceled => (SessionStatus::Canceled, None),
    };

    let mut ledger = ledger.clone();
    ledger.record(
        plan,
        SessionOutcome {
            plan_id: plan.id,
            ordinal: report.ordinal,
            status,
            actual_distance_km,
        },
    )?;

    let (assessment, action) = match actual_distance_km {
        None => (None, ReconciliationAction::KeepPlan),
        Some(actual_km) => {
            let planned_km = report.planned_distance_km.unwrap_or(session.distance_km);
            if !planned_km.is_finite() || planned_km < 0.0 {
                return Err(CoachError::InvalidDistance {
                    ordinal: report.ordinal,
                    value: planned_km,
                });
            }
            let context = AdjustmentContext::evaluate(session, planned_km, actual_km);
            let action = decide(plan, &ledger, report, &context);
            (Some(context), action)
        }
    };

    let progress = ledger.progress(plan);
    let exhausted = progress.is_exhausted().then(|| ledger.summary(plan));

    Ok(Reconciliation {
        ledger,
        assessment,
        action,
        progress,
        exhausted,
    })
}

fn decide(
    plan: &TrainingPlan,
    ledger: &OutcomeLedger,
    report: &OutcomeReport,
    context: &AdjustmentContext,
) -> ReconciliationAction {
    let override_note = report
        .adjustment_note
        .as_deref()
        .map(str::trim)
        .filter(|note| !note.is_empty())
        .map(str::to_string);

    if !(context.needs_adjustment || report.force_adjustment || override_note.is_some()) {
        return ReconciliationAction::KeepPlan;
    }

    let remaining: Vec<&TrainingSession> = ledger
        .open_sessions(plan)
        .filter(|s| s.ordinal > report.ordinal)
        .collect();
    if remaining.is_empty() {
        return ReconciliationAction::RecommendContinuation;
    }

    ReconciliationAction::AdjustRemaining(AdjustmentDirective {
        plan_id: plan.id,
        context: context.clone(),
        frozen_through: report.ordinal,
        regenerate: remaining.iter().map(|s| s.ordinal).collect(),
        schedule: remaining.iter().map(|s| ScheduledDay::new(s.date)).collect(),
        override_note,
        forced: report.force_adjustment,
    })
}

//=========================================================================================
// Merging Regenerated Sessions
//=========================================================================================

/// Produces the revised plan for an adjustment.
///
/// Each regenerated slot keeps its ordinal and date; only its content is
/// taken from `regenerated`, in order. Slots the regenerated plan does not
/// cover keep their original content.
pub fn apply_adjustment(
    plan: &TrainingPlan,
    directive: &AdjustmentDirective,
    regenerated: &TrainingPlan,
) -> Result<TrainingPlan, CoachError> {
    if directive.plan_id != plan.id {
        return Err(CoachError::PlanMismatch {
            expected: plan.id,
            found: directive.plan_id,
        });
    }

    let mut revised = plan.clone();
    let mut replacements = regenerated.sessions.iter();
    for session in revised
        .sessions
        .iter_mut()
        .filter(|s| directive.regenerate.contains(&s.ordinal))
    {
        let Some(replacement) = replacements.next() else {
            break;
        };
        session.session_type = replacement.session_type.clone();
        session.distance_km = replacement.distance_km;
        session.pace = replacement.pace.clone();
        session.description = replacement.description.clone();
        session.purpose = replacement.purpose.clone();
    }

    let context = &directive.context;
    revised.description = format!(
        "{}\n\nAdjusted after session {}: {:.1} km run instead of the planned {:.1} km.",
        plan.description.trim_end(),
        context.ordinal,
        context.actual_distance_km,
        context.planned_distance_km,
    );
    Ok(revised)
}
