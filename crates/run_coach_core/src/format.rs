//! crates/run_coach_core/src/format.rs
//!
//! Text rendering of plans. The engine never decides how a plan looks; callers
//! pass a `SessionFormatter` for the surface they are rendering to.

use serde::{Deserialize, Serialize};

use crate::calendar::weekday_name;
use crate::domain::{SessionStatus, TrainingPlan, TrainingSession, DATE_FORMAT};
use crate::reconcile::{OutcomeLedger, PlanProgress};

pub trait SessionFormatter: Send + Sync {
    fn plan_header(&self, plan: &TrainingPlan) -> String;
    fn session(&self, session: &TrainingSession, status: SessionStatus) -> String;
    fn progress(&self, progress: &PlanProgress) -> String;
}

/// Which built-in formatter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStyle {
    #[default]
    Plain,
    Markdown,
}

impl FormatStyle {
    pub fn formatter(self) -> &'static dyn SessionFormatter {
        match self {
            Self::Plain => &PlainFormatter,
            Self::Markdown => &MarkdownFormatter,
        }
    }
}

pub struct PlainFormatter;

impl SessionFormatter for PlainFormatter {
    fn plan_header(&self, plan: &TrainingPlan) -> String {
        let mut header = plan.name.clone();
        if !plan.description.trim().is_empty() {
            header.push('\n');
            header.push_str(plan.description.trim());
        }
        header.push_str(&format!(
            "\nPlanned volume: {}",
            format_weekly_volume(Some(plan.total_planned_km()))
        ));
        header
    }

    fn session(&self, session: &TrainingSession, status: SessionStatus) -> String {
        let mut line = format!(
            "{}. {}, {} [{}]: {}, {:.1} km",
            session.ordinal,
            weekday_name(session.weekday),
            session.date.format(DATE_FORMAT),
            status,
            session.session_type,
            session.distance_km,
        );
        if !session.pace.is_empty() {
            line.push_str(&format!(", pace {}", session.pace));
        }
        if !session.description.is_empty() {
            line.push_str(&format!("\n   {}", session.description));
        }
        line
    }

    fn progress(&self, progress: &PlanProgress) -> String {
        format!(
            "Completed {} of {}, canceled {}, pending {}",
            progress.completed, progress.total, progress.canceled, progress.pending
        )
    }
}

pub struct MarkdownFormatter;

fn status_marker(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Pending => "⏳",
        SessionStatus::Completed => "✅",
        SessionStatus::Canceled => "❌",
    }
}

impl SessionFormatter for MarkdownFormatter {
    fn plan_header(&self, plan: &TrainingPlan) -> String {
        let mut header = format!("## {}", plan.name);
        if !plan.description.trim().is_empty() {
            header.push_str("\n\n");
            header.push_str(plan.description.trim());
        }
        header.push_str(&format!(
            "\n\n**Planned volume:** {}",
            format_weekly_volume(Some(plan.total_planned_km()))
        ));
        header
    }

    fn session(&self, session: &TrainingSession, status: SessionStatus) -> String {
        let mut block = format!(
            "### {} Session {}: {}, {}\n- **Type:** {}\n- **Distance:** {:.1} km",
            status_marker(status),
            session.ordinal,
            weekday_name(session.weekday),
            session.date.format(DATE_FORMAT),
            session.session_type,
            session.distance_km,
        );
        if !session.pace.is_empty() {
            block.push_str(&format!("\n- **Pace:** {}", session.pace));
        }
        if !session.description.is_empty() {
            block.push_str(&format!("\n- **Description:** {}", session.description));
        }
        if !session.purpose.is_empty() {
            block.push_str(&format!("\n- **Purpose:** {}", session.purpose));
        }
        block
    }

    fn progress(&self, progress: &PlanProgress) -> String {
        format!(
            "**Progress:** {}/{} completed, {} canceled, {} pending",
            progress.completed, progress.total, progress.canceled, progress.pending
        )
    }
}

/// Renders a whole plan with each session's current status.
pub fn render_plan(plan: &TrainingPlan, ledger: &OutcomeLedger, formatter: &dyn SessionFormatter) -> String {
    let mut parts = vec![formatter.plan_header(plan)];
    parts.extend(
        plan.sessions
            .iter()
            .map(|session| formatter.session(session, ledger.status(session.ordinal))),
    );
    parts.push(formatter.progress(&ledger.progress(plan)));
    parts.join("\n\n")
}

/// Renders the next pending sessions, the view shown after an outcome report.
pub fn render_pending(
    plan: &TrainingPlan,
    ledger: &OutcomeLedger,
    limit: usize,
    formatter: &dyn SessionFormatter,
) -> String {
    let mut parts: Vec<String> = ledger
        .pending_sessions(plan, limit)
        .into_iter()
        .map(|session| formatter.session(session, SessionStatus::Pending))
        .collect();
    parts.push(formatter.progress(&ledger.progress(plan)));
    parts.join("\n\n")
}

/// A runner's weekly volume as shown to them; unknown volume reads as zero.
pub fn format_weekly_volume(volume_km: Option<f64>) -> String {
    let km = volume_km.filter(|km| km.is_finite() && *km > 0.0).unwrap_or(0.0);
    if km.fract() == 0.0 {
        format!("{km:.0} km/week")
    } else {
        format!("{km:.1} km/week")
    }
}
