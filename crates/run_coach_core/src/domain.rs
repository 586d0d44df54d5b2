//! crates/run_coach_core/src/domain.rs
//!
//! Defines the pure, core data structures of the coaching engine.
//! These structs are independent of any database or transport; their serde
//! shape is the only contract they carry.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const HALF_MARATHON_KM: f64 = 21.1;
pub const MARATHON_KM: f64 = 42.2;

//=========================================================================================
// Runner Profile
//=========================================================================================

/// The race distance a runner is preparing for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "km", rename_all = "snake_case")]
pub enum GoalDistance {
    Kilometers(f64),
    HalfMarathon,
    Marathon,
}

impl GoalDistance {
    /// Maps a kilometer value onto the labelled race distances where it matches one.
    pub fn from_km(km: f64) -> Self {
        if (km - HALF_MARATHON_KM).abs() < 0.05 {
            Self::HalfMarathon
        } else if (km - MARATHON_KM).abs() < 0.05 {
            Self::Marathon
        } else {
            Self::Kilometers(km)
        }
    }

    pub fn km(&self) -> f64 {
        match self {
            Self::Kilometers(km) => *km,
            Self::HalfMarathon => HALF_MARATHON_KM,
            Self::Marathon => MARATHON_KM,
        }
    }
}

impl fmt::Display for GoalDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kilometers(km) => write!(f, "{km} km"),
            Self::HalfMarathon => write!(f, "half-marathon ({HALF_MARATHON_KM} km)"),
            Self::Marathon => write!(f, "marathon ({MARATHON_KM} km)"),
        }
    }
}

/// The canonical runner profile every downstream component works with.
///
/// Built once by the profile normalizer. `preferred_weekdays` already holds
/// exactly `sessions_per_week` days, sorted Monday first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerProfile {
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub experience: Option<String>,
    pub weekly_distance_km: Option<f64>,
    pub goal_distance: GoalDistance,
    #[serde(default, with = "dmy_opt")]
    pub goal_date: Option<NaiveDate>,
    pub target_time: Option<String>,
    pub comfortable_pace: Option<String>,
    pub preferred_weekdays: Vec<Weekday>,
    pub sessions_per_week: u32,
    pub start_hint: Option<String>,
}

//=========================================================================================
// Plans and Sessions
//=========================================================================================

/// One scheduled training day within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSession {
    pub ordinal: u32,
    pub weekday: Weekday,
    #[serde(with = "dmy")]
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub session_type: String,
    pub distance_km: f64,
    pub pace: String,
    pub description: String,
    #[serde(default)]
    pub purpose: String,
}

/// A dated, ordered sequence of sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPlan {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub sessions: Vec<TrainingSession>,
    pub created_at: DateTime<Utc>,
}

impl TrainingPlan {
    /// Creates a plan with a fresh identifier.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        sessions: Vec<TrainingSession>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            sessions,
            created_at,
        }
    }

    pub fn session(&self, ordinal: u32) -> Option<&TrainingSession> {
        self.sessions.iter().find(|s| s.ordinal == ordinal)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn total_planned_km(&self) -> f64 {
        self.sessions.iter().map(|s| s.distance_km).sum()
    }
}

//=========================================================================================
// Outcomes and Adjustment Context
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Pending,
    Completed,
    Canceled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// The recorded result of a single session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub plan_id: Uuid,
    pub ordinal: u32,
    pub status: SessionStatus,
    #[serde(default)]
    pub actual_distance_km: Option<f64>,
}

/// How a completed session compared against its plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentContext {
    pub ordinal: u32,
    pub session_type: String,
    pub planned_distance_km: f64,
    pub actual_distance_km: f64,
    /// Absolute deviation, the value compared against the threshold.
    pub difference_percent: f64,
    /// Negative when the runner ran less than planned.
    pub signed_difference_percent: f64,
    pub needs_adjustment: bool,
}

//=========================================================================================
// Reported Workouts
//=========================================================================================

/// A workout observed outside the plan, e.g. read from a tracker screenshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportedWorkout {
    #[serde(default, with = "dmy_opt")]
    pub date: Option<NaiveDate>,
    pub distance_km: Option<f64>,
    pub duration: Option<String>,
    pub pace: Option<String>,
    pub workout_type: Option<String>,
    pub source: Option<String>,
}

//=========================================================================================
// Date serde helpers (DD.MM.YYYY)
//=========================================================================================

pub const DATE_FORMAT: &str = "%d.%m.%Y";

pub mod dmy {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

pub mod dmy_opt {
    use super::DATE_FORMAT;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format(DATE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
