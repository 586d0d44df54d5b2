//! crates/run_coach_core/src/request.rs
//!
//! Builds the structured requests sent to the plan-completion service and
//! turns its replies back into `TrainingPlan` values.
//!
//! The calendar resolved beforehand is authoritative: the request enumerates
//! its dates verbatim and `CompletionResponse::into_plan` re-anchors sessions
//! on them.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::calendar::{self, parse_calendar_date, weekday_name, ScheduledDay};
use crate::domain::{
    dmy, AdjustmentContext, RunnerProfile, SessionStatus, TrainingPlan, TrainingSession, DATE_FORMAT,
};
use crate::error::CoachError;
use crate::ports::{PortError, PortResult};
use crate::profile::LooseValue;
use crate::reconcile::{AdjustmentDirective, OutcomeLedger};

/// A prior plan finished in fewer days than this counts as rapid completion.
pub const RAPID_COMPLETION_DAYS: i64 = 3;

const COACH_INSTRUCTIONS: &str = "You are an experienced running coach. Build a personal running plan for the runner described in the data. \
Match the load to the runner's experience, current weekly volume and goal distance. \
Every session needs a type, a distance in kilometers, a target pace in min/km, a short description and its purpose.";

const RESPONSE_SHAPE: &str = r#"Reply with one JSON object of this shape and nothing else:
{"plan_name": "...", "plan_description": "...", "sessions": [{"weekday": "Wednesday", "date": "DD.MM.YYYY", "type": "Easy run", "distance": "5 km", "pace": "6:00-6:30 min/km", "description": "...", "purpose": "..."}]}"#;

const RAPID_PROGRESSION: &str = "The previous plan was finished in under three days, so it was far too easy. \
Raise the load measurably: longer sessions, faster target paces and at least one additional high-intensity session (intervals or tempo).";

const STEADY_PROGRESSION: &str = "Progress the load modestly from the previous plan, by no more than about ten percent in weekly volume.";

//=========================================================================================
// Request Modes
//=========================================================================================

/// A run completed during a prior plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedRun {
    pub ordinal: u32,
    #[serde(with = "dmy")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub session_type: String,
    pub distance_km: f64,
    pub pace: String,
}

/// What a continuation plan needs to know about the plan it follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationContext {
    pub previous_plan_name: String,
    pub completed_distance_km: f64,
    pub elapsed_days: i64,
    pub type_frequencies: BTreeMap<String, u32>,
    pub completed_runs: Vec<CompletedRun>,
    pub rapid_completion: bool,
}

impl ContinuationContext {
    pub fn from_plan(
        plan: &TrainingPlan,
        ledger: &OutcomeLedger,
        now: DateTime<Utc>,
    ) -> Result<Self, CoachError> {
        ledger.ensure_belongs_to(plan)?;
        let elapsed_days = (now - plan.created_at).num_days().max(0);

        let mut type_frequencies = BTreeMap::new();
        for session in &plan.sessions {
            let kind = session.session_type.trim().to_lowercase();
            if !kind.is_empty() {
                *type_frequencies.entry(kind).or_insert(0) += 1;
            }
        }

        let completed_runs = plan
            .sessions
            .iter()
            .filter_map(|session| {
                let outcome = ledger.outcome(session.ordinal)?;
                let distance_km = outcome.actual_distance_km?;
                (outcome.status == SessionStatus::Completed).then(|| CompletedRun {
                    ordinal: session.ordinal,
                    date: session.date,
                    session_type: session.session_type.clone(),
                    distance_km,
                    pace: session.pace.clone(),
                })
            })
            .collect();

        Ok(Self {
            previous_plan_name: plan.name.clone(),
            completed_distance_km: ledger.completed_distance_km(plan),
            elapsed_days,
            type_frequencies,
            completed_runs,
            rapid_completion: elapsed_days < RAPID_COMPLETION_DAYS,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanMode {
    Fresh,
    Continuation(ContinuationContext),
    Adjustment {
        directive: AdjustmentDirective,
        frozen_sessions: Vec<TrainingSession>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Fresh,
    Continuation,
    Adjustment,
}

//=========================================================================================
// Completion Request
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustmentPayload {
    pub context: AdjustmentContext,
    pub frozen_through: u32,
    pub frozen_sessions: Vec<TrainingSession>,
    pub note: String,
}

/// The structured data a completion request carries next to its instructions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanRequestData {
    pub profile: RunnerProfile,
    pub schedule: Vec<ScheduledDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation: Option<ContinuationContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<AdjustmentPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub kind: RequestKind,
    pub instructions: String,
    pub data: PlanRequestData,
}

pub fn build_request(
    profile: &RunnerProfile,
    schedule: &[ScheduledDay],
    mode: &PlanMode,
) -> CompletionRequest {
    let mut instructions = String::from(COACH_INSTRUCTIONS);
    instructions.push_str("\n\n");
    instructions.push_str(&schedule_constraint(schedule));

    let (kind, continuation, adjustment) = match mode {
        PlanMode::Fresh => (RequestKind::Fresh, None, None),
        PlanMode::Continuation(context) => {
            instructions.push_str("\n\n");
            instructions.push_str(&continuation_instructions(context));
            (RequestKind::Continuation, Some(context.clone()), None)
        }
        PlanMode::Adjustment {
            directive,
            frozen_sessions,
        } => {
            let note = directive.note();
            let _ = write!(
                instructions,
                "\n\nPLAN ADJUSTMENT: {note}\nSessions 1 to {} are already done and stay exactly as they are. \
                 Write only the {} remaining sessions, one for each date listed above, in that order.",
                directive.frozen_through,
                directive.regenerate.len(),
            );
            let payload = AdjustmentPayload {
                context: directive.context.clone(),
                frozen_through: directive.frozen_through,
                frozen_sessions: frozen_sessions.clone(),
                note,
            };
            (RequestKind::Adjustment, None, Some(payload))
        }
    };

    instructions.push_str("\n\n");
    instructions.push_str(RESPONSE_SHAPE);

    CompletionRequest {
        kind,
        instructions,
        data: PlanRequestData {
            profile: profile.clone(),
            schedule: schedule.to_vec(),
            continuation,
            adjustment,
        },
    }
}

fn schedule_constraint(schedule: &[ScheduledDay]) -> String {
    let mut text = format!(
        "Schedule exactly {} sessions, one on each of these dates:\n",
        schedule.len()
    );
    for day in schedule {
        let _ = writeln!(
            text,
            "- {} {}",
            weekday_name(day.weekday),
            day.date.format(DATE_FORMAT)
        );
    }
    text.push_str("Do not use any other date or weekday, and do not move, add or drop a date.");
    text
}

fn continuation_instructions(context: &ContinuationContext) -> String {
    let frequencies = context
        .type_frequencies
        .iter()
        .map(|(kind, count)| format!("{kind} x{count}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "This plan continues \"{}\". The runner completed {} runs totalling {:.1} km in {} days. \
         Session types in the previous plan: {}. Build on that progress rather than starting over. {}",
        context.previous_plan_name,
        context.completed_runs.len(),
        context.completed_distance_km,
        context.elapsed_days,
        if frequencies.is_empty() { "none".to_string() } else { frequencies },
        if context.rapid_completion {
            RAPID_PROGRESSION
        } else {
            STEADY_PROGRESSION
        },
    )
}

//=========================================================================================
// Completion Response
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionSession {
    #[serde(default, alias = "day_of_week")]
    pub weekday: String,
    #[serde(default)]
    pub date: String,
    #[serde(default, rename = "type", alias = "training_type", alias = "workout_type")]
    pub session_type: String,
    #[serde(default)]
    pub distance: Option<LooseValue>,
    #[serde(default)]
    pub pace: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub purpose: String,
}

/// The reply of the completion service, as loosely as it tends to arrive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub plan_description: String,
    #[serde(alias = "training_days")]
    pub sessions: Vec<CompletionSession>,
}

impl CompletionResponse {
    pub fn from_json(content: &str) -> PortResult<Self> {
        let response: Self = serde_json::from_str(content.trim())
            .map_err(|e| PortError::Malformed(format!("plan reply is not valid JSON: {e}")))?;
        if response.sessions.is_empty() {
            return Err(PortError::Malformed("plan reply contains no sessions".to_string()));
        }
        Ok(response)
    }

    /// Converts the reply into a plan anchored on `schedule`.
    ///
    /// Session `i` always lands on `schedule[i]`; sessions beyond the
    /// schedule are dropped. With an empty schedule the reply's own dates are used.
    pub fn into_plan(self, schedule: &[ScheduledDay], created_at: DateTime<Utc>) -> PortResult<TrainingPlan> {
        let limit = if schedule.is_empty() {
            self.sessions.len()
        } else {
            schedule.len().min(self.sessions.len())
        };

        let sessions = self
            .sessions
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, session)| -> PortResult<TrainingSession> {
                let date = schedule
                    .get(index)
                    .map(|day| day.date)
                    .or_else(|| parse_calendar_date(&session.date))
                    .ok_or_else(|| {
                        PortError::Malformed(format!(
                            "session {} has no usable date: '{}'",
                            index + 1,
                            session.date
                        ))
                    })?;
                Ok(TrainingSession {
                    ordinal: index as u32 + 1,
                    weekday: date.weekday(),
                    date,
                    session_type: non_empty_or(session.session_type, "Run"),
                    distance_km: session
                        .distance
                        .as_ref()
                        .and_then(LooseValue::as_number)
                        .filter(|km| *km >= 0.0)
                        .unwrap_or(0.0),
                    pace: session.pace.trim().to_string(),
                    description: session.description.trim().to_string(),
                    purpose: session.purpose.trim().to_string(),
                })
            })
            .collect::<PortResult<Vec<_>>>()?;

        if sessions.is_empty() {
            return Err(PortError::Malformed("plan reply contains no sessions".to_string()));
        }

        Ok(TrainingPlan::new(
            non_empty_or(self.plan_name, "Training plan"),
            self.plan_description.trim(),
            sessions,
            created_at,
        ))
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

//=========================================================================================
// Fallback Plan
//=========================================================================================

struct FallbackSession {
    session_type: &'static str,
    distance_km: f64,
    pace: &'static str,
    description: &'static str,
    purpose: &'static str,
}

const FALLBACK_SESSIONS: [FallbackSession; 3] = [
    FallbackSession {
        session_type: "Easy run",
        distance_km: 5.0,
        pace: "6:00-6:30 min/km",
        description: "Relaxed run at a conversational pace.",
        purpose: "Aerobic base",
    },
    FallbackSession {
        session_type: "Tempo run",
        distance_km: 7.0,
        pace: "5:30-6:00 min/km",
        description: "1 km warm-up, 5 km at a comfortably hard pace, 1 km cool-down.",
        purpose: "Lactate threshold",
    },
    FallbackSession {
        session_type: "Long run",
        distance_km: 10.0,
        pace: "6:00-6:30 min/km",
        description: "Steady long run, keep the effort even from start to finish.",
        purpose: "Endurance",
    },
];

/// The minimal plan served when the completion service cannot produce one.
pub fn fallback_plan(profile: &RunnerProfile, today: NaiveDate, created_at: DateTime<Utc>) -> TrainingPlan {
    let schedule = calendar::resolve_recurring(
        profile.start_hint.as_deref(),
        &profile.preferred_weekdays,
        FALLBACK_SESSIONS.len() as u32,
        today,
    );
    let sessions = schedule
        .iter()
        .zip(FALLBACK_SESSIONS.iter())
        .enumerate()
        .map(|(index, (day, template))| TrainingSession {
            ordinal: index as u32 + 1,
            weekday: day.weekday,
            date: day.date,
            session_type: template.session_type.to_string(),
            distance_km: template.distance_km,
            pace: template.pace.to_string(),
            description: template.description.to_string(),
            purpose: template.purpose.to_string(),
        })
        .collect();
    TrainingPlan::new(
        "Starter plan",
        format!("A basic three-session week towards your {} goal.", profile.goal_distance),
        sessions,
        created_at,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GoalDistance, SessionOutcome};
    use crate::reconcile::{report_outcome, OutcomeReport, ReconciliationAction, ReportedResult};
    use chrono::{Duration, TimeZone, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn profile() -> RunnerProfile {
        RunnerProfile {
            age: Some(30),
            gender: None,
            height_cm: None,
            weight_kg: None,
            experience: Some("beginner".to_string()),
            weekly_distance_km: Some(10.0),
            goal_distance: GoalDistance::Kilometers(10.0),
            goal_date: None,
            target_time: None,
            comfortable_pace: Some("6:30".to_string()),
            preferred_weekdays: vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
            sessions_per_week: 3,
            start_hint: Some("today".to_string()),
        }
    }

    fn schedule() -> Vec<ScheduledDay> {
        calendar::resolve(Some("today"), &[Weekday::Mon, Weekday::Wed, Weekday::Fri], 3, date(2026, 10, 20))
    }

    const REPLY: &str = r#"{
        "plan_name": "10K build",
        "plan_description": "First week",
        "training_days": [
            {"weekday": "Wednesday", "date": "21.10.2026", "training_type": "Easy run", "distance": "5 km", "pace": "6:30", "description": "Easy"},
            {"weekday": "Friday", "date": "not a date", "type": "Intervals", "distance": 6, "pace": "5:10", "description": "6x400"},
            {"weekday": "Monday", "date": "26.10.2026", "workout_type": "Long run", "distance": "9,5 км", "pace": "6:40", "description": "Long"}
        ]
    }"#;

    #[test]
    fn fresh_request_enumerates_the_resolved_dates() {
        let request = build_request(&profile(), &schedule(), &PlanMode::Fresh);
        assert_eq!(request.kind, RequestKind::Fresh);
        assert!(request.instructions.contains("- Wednesday 21.10.2026"));
        assert!(request.instructions.contains("- Friday 23.10.2026"));
        assert!(request.instructions.contains("- Monday 26.10.2026"));
        assert!(request.instructions.contains("Do not use any other date"));
        assert!(request.data.continuation.is_none());
        assert!(request.data.adjustment.is_none());

        let data = serde_json::to_value(&request.data).unwrap();
        assert_eq!(data["schedule"][0]["date"], "21.10.2026");
        assert!(data.get("continuation").is_none());
    }

    #[test]
    fn reply_aliases_and_units_are_accepted() {
        let response = CompletionResponse::from_json(REPLY).unwrap();
        let plan = response
            .into_plan(&schedule(), Utc.with_ymd_and_hms(2026, 10, 20, 7, 0, 0).unwrap())
            .unwrap();

        assert_eq!(plan.name, "10K build");
        assert_eq!(plan.len(), 3);
        let ordinals: Vec<u32> = plan.sessions.iter().map(|s| s.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
        assert_eq!(plan.sessions[0].session_type, "Easy run");
        assert_eq!(plan.sessions[1].date, date(2026, 10, 23));
        assert_eq!(plan.sessions[1].weekday, Weekday::Fri);
        assert_eq!(plan.sessions[2].session_type, "Long run");
        assert!((plan.sessions[2].distance_km - 9.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_replies_are_rejected() {
        assert!(matches!(
            CompletionResponse::from_json("Sure! Here is your plan."),
            Err(PortError::Malformed(_))
        ));
        assert!(matches!(
            CompletionResponse::from_json(r#"{"plan_name": "x"}"#),
            Err(PortError::Malformed(_))
        ));
        assert!(matches!(
            CompletionResponse::from_json(r#"{"sessions": []}"#),
            Err(PortError::Malformed(_))
        ));

        let undated = CompletionResponse::from_json(r#"{"sessions": [{"date": "soon"}]}"#).unwrap();
        assert!(undated.into_plan(&[], Utc::now()).is_err());
    }

    #[test]
    fn continuation_context_summarizes_the_prior_plan() {
        let created = Utc.with_ymd_and_hms(2026, 10, 20, 7, 0, 0).unwrap();
        let plan = CompletionResponse::from_json(REPLY)
            .unwrap()
            .into_plan(&schedule(), created)
            .unwrap();
        let mut ledger = OutcomeLedger::new();
        for (ordinal, status, km) in [
            (1, SessionStatus::Completed, Some(5.0)),
            (2, SessionStatus::Canceled, None),
            (3, SessionStatus::Completed, Some(10.0)),
        ] {
            ledger
                .record(&plan, SessionOutcome { plan_id: plan.id, ordinal, status, actual_distance_km: km })
                .unwrap();
        }

        let rapid = ContinuationContext::from_plan(&plan, &ledger, created + Duration::days(2)).unwrap();
        assert!(rapid.rapid_completion);
        assert!((rapid.completed_distance_km - 15.0).abs() < 1e-9);
        assert_eq!(rapid.completed_runs.len(), 2);
        assert_eq!(rapid.type_frequencies.get("intervals"), Some(&1));

        let steady = ContinuationContext::from_plan(&plan, &ledger, created + Duration::days(7)).unwrap();
        assert!(!steady.rapid_completion);
        assert_eq!(steady.elapsed_days, 7);

        let rapid_request = build_request(&profile(), &schedule(), &PlanMode::Continuation(rapid));
        assert_eq!(rapid_request.kind, RequestKind::Continuation);
        assert!(rapid_request.instructions.contains("high-intensity"));
        let steady_request = build_request(&profile(), &schedule(), &PlanMode::Continuation(steady));
        assert!(steady_request.instructions.contains("modestly"));
    }

    #[test]
    fn adjustment_request_prefers_the_operator_note() {
        let created = Utc.with_ymd_and_hms(2026, 10, 20, 7, 0, 0).unwrap();
        let plan = CompletionResponse::from_json(REPLY)
            .unwrap()
            .into_plan(&schedule(), created)
            .unwrap();
        let mut report = OutcomeReport {
            ordinal: 1,
            result: ReportedResult::Completed { actual_distance_km: 2.0 },
            planned_distance_km: None,
            force_adjustment: false,
            adjustment_note: None,
        };

        let generated = report_outcome(&plan, &OutcomeLedger::new(), &report).unwrap();
        let ReconciliationAction::AdjustRemaining(directive) = generated.action else {
            panic!("expected an adjustment");
        };
        let mode = PlanMode::Adjustment {
            directive: directive.clone(),
            frozen_sessions: plan.sessions[..1].to_vec(),
        };
        let request = build_request(&profile(), &directive.schedule, &mode);
        assert_eq!(request.kind, RequestKind::Adjustment);
        assert!(request.instructions.contains(&directive.context.describe()));
        assert_eq!(request.data.schedule.len(), 2);
        assert_eq!(request.data.adjustment.as_ref().unwrap().frozen_through, 1);

        report.adjustment_note = Some("Travelling next week, keep it short".to_string());
        let noted = report_outcome(&plan, &OutcomeLedger::new(), &report).unwrap();
        let ReconciliationAction::AdjustRemaining(directive) = noted.action else {
            panic!("expected an adjustment");
        };
        let mode = PlanMode::Adjustment { directive: directive.clone(), frozen_sessions: Vec::new() };
        let request = build_request(&profile(), &directive.schedule, &mode);
        assert!(request.instructions.contains("Travelling next week, keep it short"));
        assert!(!request.instructions.contains(&directive.context.describe()));
    }

    #[test]
    fn fallback_plan_uses_the_first_three_resolved_dates() {
        let plan = fallback_plan(&profile(), date(2026, 10, 20), Utc::now());
        assert_eq!(plan.len(), 3);
        let kinds: Vec<&str> = plan.sessions.iter().map(|s| s.session_type.as_str()).collect();
        assert_eq!(kinds, vec!["Easy run", "Tempo run", "Long run"]);
        let distances: Vec<f64> = plan.sessions.iter().map(|s| s.distance_km).collect();
        assert_eq!(distances, vec![5.0, 7.0, 10.0]);
        let dates: Vec<NaiveDate> = plan.sessions.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(2026, 10, 21), date(2026, 10, 23), date(2026, 10, 26)]);
    }

    #[test]
    fn fallback_plan_stays_on_the_runners_own_days() {
        let mut runner = profile();
        runner.preferred_weekdays = vec![Weekday::Sun, Weekday::Wed];
        runner.sessions_per_week = 2;

        let plan = fallback_plan(&runner, date(2026, 10, 20), Utc::now());
        assert_eq!(plan.len(), 3);
        let dates: Vec<NaiveDate> = plan.sessions.iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![date(2026, 10, 21), date(2026, 10, 25), date(2026, 10, 28)]);
        assert!(plan
            .sessions
            .iter()
            .all(|s| matches!(s.weekday, Weekday::Wed | Weekday::Sun)));
    }
}
