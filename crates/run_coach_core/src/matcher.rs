//! crates/run_coach_core/src/matcher.rs
//!
//! Attributes an externally reported workout (manual entry or screenshot) to
//! one of the open sessions of a plan.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::{ReportedWorkout, TrainingPlan, TrainingSession};
use crate::error::CoachError;
use crate::profile::LooseValue;
use crate::reconcile::OutcomeLedger;

pub const EXACT_DATE_SCORE: u32 = 10;
pub const ADJACENT_DATE_SCORE: u32 = 5;
pub const TYPE_SCORE: u32 = 1;

/// Matches scoring at least this much are attributed without asking the runner.
pub const AUTOMATIC_MATCH_SCORE: u32 = 5;

/// Substrings that mark a workout label as running.
const RUNNING_VOCABULARY: [&str; 8] = [
    "run", "jog", "treadmill", "marathon", "бег", "пробеж", "марафон", "трусц",
];

const REPORTED_DATE_FORMATS: [&str; 7] = [
    "%d.%m.%Y",
    "%Y-%m-%d",
    "%m/%d/%y",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
];

const REPORTED_DATETIME_FORMATS: [&str; 6] = [
    "%m/%d/%y %H:%M",
    "%m/%d/%y, %H:%M",
    "%m/%d/%y %I:%M %p",
    "%m/%d/%y, %I:%M %p",
    "%d.%m.%Y %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

//=========================================================================================
// Match Result
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutMatch {
    /// The matched session, `None` when nothing scored.
    pub ordinal: Option<u32>,
    pub score: u32,
    /// Set when the match came from an exact date.
    pub forced: bool,
}

impl WorkoutMatch {
    pub fn none() -> Self {
        Self {
            ordinal: None,
            score: 0,
            forced: false,
        }
    }

    pub fn is_automatic(&self) -> bool {
        self.ordinal.is_some() && self.score >= AUTOMATIC_MATCH_SCORE
    }
}

//=========================================================================================
// Matching
//=========================================================================================

pub fn is_running_workout(workout_type: Option<&str>) -> bool {
    match workout_type.map(str::trim) {
        None | Some("") => true,
        Some(label) => {
            let label = label.to_lowercase();
            RUNNING_VOCABULARY.iter().any(|word| label.contains(word))
        }
    }
}

/// Finds the open session the workout most likely belongs to.
///
/// An open session on the workout's exact date wins outright. Otherwise
/// date proximity, distance similarity and type similarity add up and the
/// highest score wins, ties going to the earliest session.
pub fn match_workout(
    plan: &TrainingPlan,
    ledger: &OutcomeLedger,
    workout: &ReportedWorkout,
) -> Result<WorkoutMatch, CoachError> {
    ledger.ensure_belongs_to(plan)?;
    if !is_running_workout(workout.workout_type.as_deref()) {
        return Err(CoachError::UnsupportedWorkout(
            workout.workout_type.clone().unwrap_or_default(),
        ));
    }

    if let Some(date) = workout.date {
        if let Some(session) = ledger.open_sessions(plan).find(|s| s.date == date) {
            return Ok(WorkoutMatch {
                ordinal: Some(session.ordinal),
                score: EXACT_DATE_SCORE,
                forced: true,
            });
        }
    }

    let mut best = WorkoutMatch::none();
    for session in ledger.open_sessions(plan) {
        let score = score_session(session, workout);
        if score > best.score {
            best = WorkoutMatch {
                ordinal: Some(session.ordinal),
                score,
                forced: false,
            };
        }
    }
    Ok(best)
}

fn score_session(session: &TrainingSession, workout: &ReportedWorkout) -> u32 {
    let mut score = 0;

    if let Some(date) = workout.date {
        if (date - session.date).num_days().abs() == 1 {
            score += ADJACENT_DATE_SCORE;
        }
    }

    if let Some(reported_km) = workout.distance_km {
        score += distance_score(reported_km, session.distance_km);
    }

    if let Some(label) = workout.workout_type.as_deref() {
        let reported = label.trim().to_lowercase();
        let planned = session.session_type.trim().to_lowercase();
        if !reported.is_empty()
            && !planned.is_empty()
            && (reported.contains(&planned) || planned.contains(&reported))
        {
            score += TYPE_SCORE;
        }
    }

    score
}

/// Points for distance similarity, relative to the larger of the two distances.
pub fn distance_score(reported_km: f64, planned_km: f64) -> u32 {
    if reported_km <= 0.0 || planned_km <= 0.0 {
        return 0;
    }
    let percent = (reported_km - planned_km).abs() / reported_km.max(planned_km) * 100.0;
    match percent {
        p if p <= 10.0 => 3,
        p if p <= 20.0 => 2,
        p if p <= 30.0 => 1,
        _ => 0,
    }
}

//=========================================================================================
// Ingestion
//=========================================================================================

/// Reads the date of a reported workout in the forms tracker apps display.
pub fn parse_reported_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    REPORTED_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            REPORTED_DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            let head = text.split([' ', ',']).next()?;
            ["%m/%d/%y", "%m/%d/%Y", "%d.%m.%Y", "%Y-%m-%d"]
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(head, format).ok())
        })
}

/// A workout as extracted from a screenshot or typed in, before parsing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawWorkout {
    pub date: Option<String>,
    #[serde(alias = "distance")]
    pub distance_km: Option<LooseValue>,
    pub duration: Option<String>,
    pub pace: Option<String>,
    #[serde(alias = "type")]
    pub workout_type: Option<String>,
    #[serde(alias = "app_name")]
    pub source: Option<String>,
}

impl RawWorkout {
    pub fn into_reported(self) -> ReportedWorkout {
        let text = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        ReportedWorkout {
            date: self.date.as_deref().and_then(parse_reported_date),
            distance_km: self
                .distance_km
                .as_ref()
                .and_then(LooseValue::as_number)
                .filter(|km| *km >= 0.0),
            duration: text(self.duration),
            pace: text(self.pace),
            workout_type: text(self.workout_type),
            source: text(self.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SessionOutcome;
    use crate::domain::SessionStatus;
    use chrono::{Datelike, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(ordinal: u32, date: NaiveDate, kind: &str, km: f64) -> TrainingSession {
        TrainingSession {
            ordinal,
            weekday: date.weekday(),
            date,
            session_type: kind.to_string(),
            distance_km: km,
            pace: String::new(),
            description: String::new(),
            purpose: String::new(),
        }
    }

    fn plan() -> TrainingPlan {
        TrainingPlan::new(
            "Week one",
            "",
            vec![
                session(1, date(2026, 10, 21), "Easy run", 5.0),
                session(2, date(2026, 10, 23), "Tempo run", 7.0),
                session(3, date(2026, 10, 26), "Long run", 10.0),
            ],
            Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap(),
        )
    }

    fn workout(date: Option<NaiveDate>, km: Option<f64>, kind: Option<&str>) -> ReportedWorkout {
        ReportedWorkout {
            date,
            distance_km: km,
            workout_type: kind.map(str::to_string),
            ..ReportedWorkout::default()
        }
    }

    #[test]
    fn exact_date_forces_a_match_regardless_of_distance() {
        let plan = plan();
        let result = match_workout(
            &plan,
            &OutcomeLedger::new(),
            &workout(Some(date(2026, 10, 23)), Some(42.0), Some("run")),
        )
        .unwrap();
        assert_eq!(result.ordinal, Some(2));
        assert_eq!(result.score, EXACT_DATE_SCORE);
        assert!(result.forced);
        assert!(result.is_automatic());
    }

    #[test]
    fn adjacent_date_and_close_distance_add_up() {
        let plan = plan();
        let result = match_workout(
            &plan,
            &OutcomeLedger::new(),
            &workout(Some(date(2026, 10, 22)), Some(6.8), Some("Tempo run")),
        )
        .unwrap();
        // Adjacent to both 21.10 and 23.10; tempo distance and type tip it to session 2.
        assert_eq!(result.ordinal, Some(2));
        assert_eq!(result.score, ADJACENT_DATE_SCORE + 3 + TYPE_SCORE);
        assert!(!result.forced);
    }

    #[test]
    fn ties_go_to_the_earliest_session() {
        let plan = TrainingPlan::new(
            "Twins",
            "",
            vec![
                session(1, date(2026, 10, 21), "Easy run", 5.0),
                session(2, date(2026, 10, 23), "Easy run", 5.0),
            ],
            Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap(),
        );
        let result = match_workout(&plan, &OutcomeLedger::new(), &workout(None, Some(5.0), None)).unwrap();
        assert_eq!(result.ordinal, Some(1));
        assert_eq!(result.score, 3);
        assert!(!result.is_automatic());
    }

    #[test]
    fn ledger_of_another_plan_cannot_steer_the_match() {
        let plan = plan();
        let other = self::plan();
        let mut ledger = OutcomeLedger::new();
        ledger
            .record(
                &other,
                SessionOutcome {
                    plan_id: other.id,
                    ordinal: 1,
                    status: SessionStatus::Canceled,
                    actual_distance_km: None,
                },
            )
            .unwrap();

        let result = match_workout(&plan, &ledger, &workout(None, Some(5.0), None));
        assert!(matches!(result, Err(CoachError::PlanMismatch { .. })));
    }

    #[test]
    fn closed_sessions_are_skipped() {
        let plan = plan();
        let mut ledger = OutcomeLedger::new();
        ledger
            .record(
                &plan,
                SessionOutcome {
                    plan_id: plan.id,
                    ordinal: 2,
                    status: SessionStatus::Canceled,
                    actual_distance_km: None,
                },
            )
            .unwrap();

        let result = match_workout(
            &plan,
            &ledger,
            &workout(Some(date(2026, 10, 23)), Some(7.0), None),
        )
        .unwrap();
        assert_ne!(result.ordinal, Some(2));
    }

    #[test]
    fn nothing_scoring_means_no_match() {
        let plan = plan();
        let result = match_workout(
            &plan,
            &OutcomeLedger::new(),
            &workout(Some(date(2027, 1, 1)), Some(50.0), Some("trail running")),
        )
        .unwrap();
        assert_eq!(result, WorkoutMatch::none());
    }

    #[test]
    fn non_running_workouts_are_rejected() {
        let plan = plan();
        let err = match_workout(
            &plan,
            &OutcomeLedger::new(),
            &workout(Some(date(2026, 10, 21)), Some(20.0), Some("Cycling")),
        )
        .unwrap_err();
        assert_eq!(err, CoachError::UnsupportedWorkout("Cycling".to_string()));
        assert!(is_running_workout(Some("Утренняя пробежка")));
        assert!(is_running_workout(None));
    }

    #[test]
    fn distance_score_bands() {
        assert_eq!(distance_score(10.0, 10.0), 3);
        assert_eq!(distance_score(10.0, 8.5), 2);
        assert_eq!(distance_score(7.5, 10.0), 1);
        assert_eq!(distance_score(5.0, 10.0), 0);
        assert_eq!(distance_score(5.0, 0.0), 0);
    }

    #[test]
    fn reported_dates_in_tracker_formats() {
        let expected = Some(date(2025, 4, 17));
        for text in [
            "17.04.2025",
            "2025-04-17",
            "04/17/25",
            "04/17/25 07:30",
            "04/17/25, 7:30 AM",
            "April 17, 2025",
            "Apr 17, 2025",
        ] {
            assert_eq!(parse_reported_date(text), expected, "input {text}");
        }
        assert_eq!(parse_reported_date("yesterday"), None);
    }

    #[test]
    fn raw_workout_ingestion() {
        let raw: RawWorkout = serde_json::from_value(serde_json::json!({
            "date": "04/17/25, 7:30 AM",
            "distance": "5,2 km",
            "type": "Outdoor Run",
            "app_name": "Strava",
            "pace": " "
        }))
        .unwrap();
        let reported = raw.into_reported();
        assert_eq!(reported.date, Some(date(2025, 4, 17)));
        assert_eq!(reported.distance_km, Some(5.2));
        assert_eq!(reported.workout_type.as_deref(), Some("Outdoor Run"));
        assert_eq!(reported.source.as_deref(), Some("Strava"));
        assert_eq!(reported.pace, None);
    }
}
