//! `schedule_engineer` and `escalate_to_human`.
//!
//! Neither reaches a real booking system; both issue a reference the tenant
//! can quote and state the target response window.

use std::fmt;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::{required_str, Tool, ToolError};

const SCHEDULE_TOOL: &str = "schedule_engineer";
const ESCALATE_TOOL: &str = "escalate_to_human";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Low,
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [Self::Low, Self::Medium, Self::High, Self::Emergency];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Emergency => "emergency",
        }
    }

    /// Target attendance window.
    pub fn window(self) -> AttendanceWindow {
        match self {
            Self::Emergency => AttendanceWindow::Hours(24),
            Self::High => AttendanceWindow::WorkingDays(3),
            Self::Medium => AttendanceWindow::WorkingDays(7),
            Self::Low => AttendanceWindow::WorkingDays(28),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceWindow {
    Hours(u32),
    WorkingDays(u32),
}

impl AttendanceWindow {
    /// Calendar time from now to the latest attendance. Working days skip
    /// weekends only.
    fn deadline_offset(self, from_weekday: chrono::Weekday) -> Duration {
        match self {
            Self::Hours(h) => Duration::hours(i64::from(h)),
            Self::WorkingDays(n) => {
                let mut day = from_weekday;
                let mut remaining = n;
                let mut calendar_days = 0i64;
                while remaining > 0 {
                    day = day.succ();
                    calendar_days += 1;
                    if !matches!(day, chrono::Weekday::Sat | chrono::Weekday::Sun) {
                        remaining -= 1;
                    }
                }
                Duration::days(calendar_days)
            }
        }
    }
}

impl fmt::Display for AttendanceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hours(h) => write!(f, "within {h} hours"),
            Self::WorkingDays(1) => write!(f, "within 1 working day"),
            Self::WorkingDays(n) => write!(f, "within {n} working days"),
        }
    }
}

fn new_reference(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", id[..8].to_uppercase())
}

pub struct ScheduleEngineerTool;

#[async_trait]
impl Tool for ScheduleEngineerTool {
    fn name(&self) -> &str {
        SCHEDULE_TOOL
    }

    fn description(&self) -> &str {
        "Schedule an engineer visit for a housing issue. Returns a booking reference \
         and the target attendance window for the given urgency."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "issue_type": {
                    "type": "string",
                    "description": "Type of issue requiring an engineer"
                },
                "urgency": {
                    "type": "string",
                    "description": "Urgency level",
                    "enum": Urgency::ALL.iter().map(|u| u.as_str()).collect::<Vec<_>>()
                }
            },
            "required": ["issue_type", "urgency"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let issue_type = required_str(arguments, "issue_type", SCHEDULE_TOOL)?;
        let raw_urgency = required_str(arguments, "urgency", SCHEDULE_TOOL)?;
        let urgency = Urgency::parse(raw_urgency).ok_or_else(|| ToolError::InvalidArguments {
            tool: SCHEDULE_TOOL.to_string(),
            reason: format!(
                "urgency must be one of low, medium, high, emergency (got '{raw_urgency}')"
            ),
        })?;

        let now = Utc::now();
        let window = urgency.window();
        let deadline = now + window.deadline_offset(chrono::Datelike::weekday(&now));
        let reference = new_reference("ENG");

        tracing::info!(
            reference = %reference,
            issue_type = %issue_type,
            urgency = urgency.as_str(),
            "engineer visit scheduled"
        );

        Ok(format!(
            "Engineer scheduled for {issue_type} (urgency: {}).\n\
             Booking reference: {reference}\n\
             Target attendance: {window}, by {}.",
            urgency.as_str(),
            deadline.format("%A %-d %B %Y %H:%M UTC"),
        ))
    }
}

pub struct EscalateToHumanTool;

#[async_trait]
impl Tool for EscalateToHumanTool {
    fn name(&self) -> &str {
        ESCALATE_TOOL
    }

    fn description(&self) -> &str {
        "Escalate the issue to a human housing officer when it cannot be resolved \
         by guidance alone, or the tenant asks for a person."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "reason": {
                    "type": "string",
                    "description": "Reason for escalation"
                }
            },
            "required": ["reason"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let reason = required_str(arguments, "reason", ESCALATE_TOOL)?;
        let reference = new_reference("ESC");

        tracing::info!(reference = %reference, reason = %reason, "escalated to human support");

        Ok(format!(
            "Issue escalated to human support: {reason}\n\
             Escalation reference: {reference}\n\
             A housing officer will contact the tenant within 2 working days."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    #[test]
    fn test_urgency_parse() {
        assert_eq!(Urgency::parse("Emergency"), Some(Urgency::Emergency));
        assert_eq!(Urgency::parse(" low "), Some(Urgency::Low));
        assert_eq!(Urgency::parse("urgent"), None);
    }

    #[test]
    fn test_urgency_windows() {
        assert_eq!(Urgency::Emergency.window(), AttendanceWindow::Hours(24));
        assert_eq!(Urgency::High.window(), AttendanceWindow::WorkingDays(3));
        assert_eq!(Urgency::Medium.window(), AttendanceWindow::WorkingDays(7));
        assert_eq!(Urgency::Low.window(), AttendanceWindow::WorkingDays(28));
        assert_eq!(Urgency::High.window().to_string(), "within 3 working days");
    }

    #[test]
    fn test_working_days_skip_weekends() {
        // Friday + 3 working days = Wednesday, 5 calendar days later.
        assert_eq!(
            AttendanceWindow::WorkingDays(3).deadline_offset(Weekday::Fri),
            Duration::days(5)
        );
        assert_eq!(
            AttendanceWindow::WorkingDays(3).deadline_offset(Weekday::Mon),
            Duration::days(3)
        );
        assert_eq!(
            AttendanceWindow::Hours(24).deadline_offset(Weekday::Sat),
            Duration::hours(24)
        );
    }

    #[tokio::test]
    async fn test_schedule_engineer_returns_reference() {
        let out = ScheduleEngineerTool
            .execute(&serde_json::json!({"issue_type": "heating", "urgency": "high"}))
            .await
            .unwrap();
        assert!(out.starts_with("Engineer scheduled for heating (urgency: high)"));
        assert!(out.contains("Booking reference: ENG-"));
        assert!(out.contains("within 3 working days"));
    }

    #[tokio::test]
    async fn test_schedule_engineer_rejects_bad_urgency() {
        let err = ScheduleEngineerTool
            .execute(&serde_json::json!({"issue_type": "damp", "urgency": "asap"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_escalate_to_human() {
        let out = EscalateToHumanTool
            .execute(&serde_json::json!({"reason": "landlord unresponsive"}))
            .await
            .unwrap();
        assert!(out.contains("landlord unresponsive"));
        assert!(out.contains("Escalation reference: ESC-"));
    }

    #[test]
    fn test_reference_format() {
        let r = new_reference("ENG");
        assert_eq!(r.len(), 12);
        assert!(r[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
