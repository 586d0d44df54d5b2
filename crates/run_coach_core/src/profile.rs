//! crates/run_coach_core/src/profile.rs
//!
//! Collapses the loosely typed questionnaire answers a runner gives into the
//! canonical `RunnerProfile`. Malformed input falls back to documented
//! defaults; nothing in here fails.

use chrono::Weekday;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::calendar::{parse_calendar_date, resolve_weekdays};
use crate::domain::{GoalDistance, RunnerProfile, HALF_MARATHON_KM, MARATHON_KM};

static NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").ok());

const HALF_MARATHON_NAMES: [&str; 4] = ["half-marathon", "half marathon", "halfmarathon", "полумарафон"];
const MARATHON_NAMES: [&str; 2] = ["marathon", "марафон"];

//=========================================================================================
// Raw Input
//=========================================================================================

/// A questionnaire answer that may arrive as a number or as free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Number(f64),
    Text(String),
}

impl LooseValue {
    /// The numeric reading of the value; text yields its first number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Number(_) => None,
            Self::Text(text) => first_number(text),
        }
    }
}

/// Profile answers as collected, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProfile {
    pub age: Option<LooseValue>,
    pub gender: Option<String>,
    pub height: Option<LooseValue>,
    pub weight: Option<LooseValue>,
    pub experience: Option<String>,
    pub fitness_level: Option<String>,
    #[serde(alias = "weekly_distance")]
    pub weekly_volume: Option<LooseValue>,
    #[serde(alias = "distance")]
    pub goal_distance: Option<LooseValue>,
    #[serde(alias = "goal_date")]
    pub competition_date: Option<String>,
    pub target_time: Option<String>,
    pub comfortable_pace: Option<String>,
    #[serde(alias = "preferred_days")]
    pub preferred_training_days: Option<String>,
    #[serde(alias = "sessions_per_week")]
    pub training_days_per_week: Option<LooseValue>,
    pub training_start_date: Option<String>,
    pub training_start_date_text: Option<String>,
}

/// Defaults applied when an answer is missing or unreadable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    pub default_goal_distance_km: f64,
    pub default_sessions_per_week: u32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            default_goal_distance_km: 5.0,
            default_sessions_per_week: 3,
        }
    }
}

//=========================================================================================
// Normalization
//=========================================================================================

pub fn normalize(raw: &RawProfile, options: &NormalizeOptions) -> RunnerProfile {
    let sessions_per_week = raw
        .training_days_per_week
        .as_ref()
        .and_then(LooseValue::as_number)
        .map(|n| n.round().clamp(1.0, 7.0) as u32)
        .unwrap_or_else(|| options.default_sessions_per_week.clamp(1, 7));

    let requested_days = raw
        .preferred_training_days
        .as_deref()
        .map(parse_weekdays)
        .unwrap_or_default();

    RunnerProfile {
        age: positive(raw.age.as_ref()).map(|age| age.round() as u32),
        gender: non_empty(raw.gender.as_deref()),
        height_cm: positive(raw.height.as_ref()),
        weight_kg: positive(raw.weight.as_ref()),
        experience: non_empty(raw.experience.as_deref())
            .or_else(|| non_empty(raw.fitness_level.as_deref())),
        weekly_distance_km: raw
            .weekly_volume
            .as_ref()
            .and_then(LooseValue::as_number)
            .filter(|km| *km >= 0.0),
        goal_distance: parse_goal_distance(
            raw.goal_distance.as_ref(),
            options.default_goal_distance_km,
        ),
        goal_date: raw.competition_date.as_deref().and_then(parse_calendar_date),
        target_time: non_empty(raw.target_time.as_deref()),
        comfortable_pace: non_empty(raw.comfortable_pace.as_deref()),
        preferred_weekdays: resolve_weekdays(&requested_days, sessions_per_week),
        sessions_per_week,
        start_hint: non_empty(raw.training_start_date_text.as_deref())
            .or_else(|| non_empty(raw.training_start_date.as_deref())),
    }
}

/// Reads one weekday token in English or Russian, case-insensitively.
pub fn parse_weekday_token(token: &str) -> Option<Weekday> {
    let day = match token.trim().to_lowercase().as_str() {
        "mo" | "mon" | "monday" | "пн" | "пон" | "понедельник" => Weekday::Mon,
        "tu" | "tue" | "tues" | "tuesday" | "вт" | "вто" | "вторник" => Weekday::Tue,
        "we" | "wed" | "wednesday" | "ср" | "сре" | "среда" => Weekday::Wed,
        "th" | "thu" | "thur" | "thurs" | "thursday" | "чт" | "чет" | "четверг" => Weekday::Thu,
        "fr" | "fri" | "friday" | "пт" | "пят" | "пятница" => Weekday::Fri,
        "sa" | "sat" | "saturday" | "сб" | "суб" | "суббота" => Weekday::Sat,
        "su" | "sun" | "sunday" | "вс" | "вос" | "воскресенье" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

/// Splits a free-text weekday list. Unknown tokens are dropped.
pub fn parse_weekdays(text: &str) -> Vec<Weekday> {
    text.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter_map(parse_weekday_token)
        .collect()
}

pub fn parse_goal_distance(value: Option<&LooseValue>, default_km: f64) -> GoalDistance {
    let km = match value {
        Some(LooseValue::Text(text)) => {
            let label = text.trim().to_lowercase();
            if HALF_MARATHON_NAMES.contains(&label.as_str()) {
                Some(HALF_MARATHON_KM)
            } else if MARATHON_NAMES.contains(&label.as_str()) {
                Some(MARATHON_KM)
            } else {
                first_number(&label)
            }
        }
        Some(number) => number.as_number(),
        None => None,
    };
    GoalDistance::from_km(km.filter(|km| *km > 0.0).unwrap_or(default_km))
}

/// The first integer or decimal in `text`; a comma decimal separator is accepted.
pub fn first_number(text: &str) -> Option<f64> {
    let token = NUMBER.as_ref()?.find(text)?;
    token.as_str().replace(',', ".").parse().ok()
}

fn positive(value: Option<&LooseValue>) -> Option<f64> {
    value.and_then(LooseValue::as_number).filter(|n| *n > 0.0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
