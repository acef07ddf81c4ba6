use crate::calendar::CalendarPolicy;
use crate::scheduler::{self, SchedulerResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Input to a single scheduling calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingTask {
    pub anchor_date: NaiveDateTime,
    pub duration_hours: f64,
}

impl SchedulingTask {
    pub fn new(anchor_date: NaiveDateTime, duration_hours: f64) -> Self {
        Self {
            anchor_date,
            duration_hours,
        }
    }

    /// Treat the anchor as a request date.
    pub fn suggested_due_date(&self, policy: &CalendarPolicy) -> SchedulerResult<NaiveDateTime> {
        scheduler::compute_suggested_due_date(self.anchor_date, self.duration_hours, policy)
    }

    /// Treat the anchor as a due date.
    pub fn latest_start(&self, policy: &CalendarPolicy) -> SchedulerResult<NaiveDateTime> {
        scheduler::compute_latest_start(self.anchor_date, self.duration_hours, policy)
    }
}

/// How an assigned due date got onto a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSource {
    #[default]
    Manual,
    Bulk,
    CalendarDrop,
    AcceptedSuggestion,
}

impl AssignmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentSource::Manual => "manual",
            AssignmentSource::Bulk => "bulk",
            AssignmentSource::CalendarDrop => "calendar_drop",
            AssignmentSource::AcceptedSuggestion => "accepted_suggestion",
        }
    }
}

impl FromStr for AssignmentSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "manual" => Ok(AssignmentSource::Manual),
            "bulk" => Ok(AssignmentSource::Bulk),
            "calendar_drop" | "drop" => Ok(AssignmentSource::CalendarDrop),
            "accepted_suggestion" | "accepted" => Ok(AssignmentSource::AcceptedSuggestion),
            other => Err(format!("invalid assignment source '{other}'")),
        }
    }
}

/// Due-date lifecycle of a request: unscheduled, carrying a computed
/// suggestion, or assigned by a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DueDateState {
    #[default]
    Unscheduled,
    Suggested {
        date: NaiveDateTime,
    },
    Assigned {
        date: NaiveDateTime,
        source: AssignmentSource,
    },
}

impl DueDateState {
    pub fn date(&self) -> Option<NaiveDateTime> {
        match self {
            DueDateState::Unscheduled => None,
            DueDateState::Suggested { date } | DueDateState::Assigned { date, .. } => Some(*date),
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, DueDateState::Assigned { .. })
    }

    pub fn suggestion(&self) -> Option<NaiveDateTime> {
        match self {
            DueDateState::Suggested { date } => Some(*date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DueDateState::Unscheduled => "unscheduled",
            DueDateState::Suggested { .. } => "suggested",
            DueDateState::Assigned { .. } => "assigned",
        }
    }
}

/// A test request tracked on the due-date board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestTask {
    pub id: i32,
    #[serde(default)]
    pub request_no: String,
    pub name: String,
    pub request_date: NaiveDateTime,
    pub duration_hours: f64,
    #[serde(default)]
    pub due: DueDateState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RequestTask {
    pub fn new(
        id: i32,
        name: impl Into<String>,
        request_date: NaiveDateTime,
        duration_hours: f64,
    ) -> Self {
        Self {
            id,
            request_no: String::new(),
            name: name.into(),
            request_date,
            duration_hours,
            due: DueDateState::Unscheduled,
            notes: None,
        }
    }

    pub fn with_request_no(mut self, request_no: impl Into<String>) -> Self {
        self.request_no = request_no.into();
        self
    }

    pub fn scheduling_task(&self) -> SchedulingTask {
        SchedulingTask::new(self.request_date, self.duration_hours)
    }

    /// Assigned date if any, otherwise the current suggestion.
    pub fn effective_due_date(&self) -> Option<NaiveDateTime> {
        self.due.date()
    }
}
