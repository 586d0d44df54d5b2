//! crates/run_coach_core/src/calendar.rs
//!
//! Calendar resolution: turns a free-text start hint, a set of preferred
//! weekdays and a session count into the concrete dates a plan may use.
//! Every plan the engine produces is anchored on the output of `resolve`.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::{dmy, DATE_FORMAT};

pub const ALL_WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Full-date formats tried in order for user supplied dates.
const FULL_DATE_FORMATS: [&str; 3] = [DATE_FORMAT, "%Y-%m-%d", "%d/%m/%Y"];

/// Hints meaning "start as soon as possible".
const NO_PREFERENCE: [&str; 6] = ["", "today", "unknown", "now", "сегодня", "не знаю"];

/// A single resolved training date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledDay {
    #[serde(with = "dmy")]
    pub date: NaiveDate,
    pub weekday: Weekday,
}

impl ScheduledDay {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weekday: date.weekday(),
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses a complete calendar date written in any accepted format.
pub fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    FULL_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

/// Interprets a start hint. `None` means "no usable preference".
///
/// A partial `day.month` hint takes the year of `now`.
pub fn parse_start_hint(hint: &str, now: NaiveDate) -> Option<NaiveDate> {
    let hint = hint.trim();
    if NO_PREFERENCE.contains(&hint.to_lowercase().as_str()) {
        return None;
    }
    parse_calendar_date(hint).or_else(|| {
        NaiveDate::parse_from_str(&format!("{hint}.{}", now.year()), DATE_FORMAT).ok()
    })
}

/// Pads or truncates the preferred weekdays to exactly `count` days (at most seven).
///
/// Missing days are filled Monday through Sunday. The result is sorted
/// Monday first and truncation keeps the earliest days of the week.
pub fn resolve_weekdays(preferred: &[Weekday], count: u32) -> Vec<Weekday> {
    let target = count.min(7) as usize;
    let mut days: Vec<Weekday> = Vec::with_capacity(7);
    for day in preferred {
        if !days.contains(day) {
            days.push(*day);
        }
    }
    if days.is_empty() {
        days.extend(ALL_WEEKDAYS);
    }
    for day in ALL_WEEKDAYS {
        if days.len() >= target {
            break;
        }
        if !days.contains(&day) {
            days.push(day);
        }
    }
    days.sort_by_key(|day| day.num_days_from_monday());
    days.truncate(target);
    days
}

/// Resolves the ordered training dates for a plan.
///
/// The first date is the earliest day on or after the effective start whose
/// weekday is in the resolved set. Past start hints are clamped to `now`.
pub fn resolve(
    start_hint: Option<&str>,
    preferred: &[Weekday],
    session_count: u32,
    now: NaiveDate,
) -> Vec<ScheduledDay> {
    let weekdays = resolve_weekdays(preferred, session_count);
    walk(effective_start(start_hint, now), &weekdays, session_count)
}

/// Like `resolve`, but never adds weekdays the runner did not choose.
///
/// When fewer weekdays were chosen than sessions are needed, the chosen days
/// repeat in the following weeks. No preference means every day is allowed.
pub fn resolve_recurring(
    start_hint: Option<&str>,
    preferred: &[Weekday],
    session_count: u32,
    now: NaiveDate,
) -> Vec<ScheduledDay> {
    let mut weekdays: Vec<Weekday> = Vec::with_capacity(7);
    for day in preferred {
        if !weekdays.contains(day) {
            weekdays.push(*day);
        }
    }
    if weekdays.is_empty() {
        weekdays.extend(ALL_WEEKDAYS);
    }
    walk(effective_start(start_hint, now), &weekdays, session_count)
}

fn effective_start(start_hint: Option<&str>, now: NaiveDate) -> NaiveDate {
    start_hint
        .and_then(|hint| parse_start_hint(hint, now))
        .unwrap_or(now)
        .max(now)
}

fn walk(start: NaiveDate, weekdays: &[Weekday], session_count: u32) -> Vec<ScheduledDay> {
    if weekdays.is_empty() {
        return Vec::new();
    }

    let start_index = start.weekday().num_days_from_monday();
    let offset = weekdays
        .iter()
        .map(|day| (7 + day.num_days_from_monday() - start_index) % 7)
        .min()
        .unwrap_or(0);

    let mut schedule = Vec::with_capacity(session_count as usize);
    let mut cursor = start.checked_add_days(Days::new(offset.into()));
    while let Some(date) = cursor {
        if schedule.len() >= session_count as usize {
            break;
        }
        if weekdays.contains(&date.weekday()) {
            schedule.push(ScheduledDay::new(date));
        }
        cursor = date.succ_opt();
    }
    schedule
}
