use crate::task::{DueDateState, RequestTask};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskValidationError {
    message: String,
}

impl TaskValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TaskValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskValidationError {}

pub fn validate_task(task: &RequestTask) -> Result<(), TaskValidationError> {
    if !task.duration_hours.is_finite() {
        return Err(TaskValidationError::new(format!(
            "task {} has non-finite duration_hours {}",
            task.id, task.duration_hours
        )));
    }

    if task.duration_hours < 0.0 {
        return Err(TaskValidationError::new(format!(
            "task {} has negative duration_hours {}",
            task.id, task.duration_hours
        )));
    }

    if task.name.trim().is_empty() && task.request_no.trim().is_empty() {
        return Err(TaskValidationError::new(format!(
            "task {} requires a name or a request number",
            task.id
        )));
    }

    if let DueDateState::Assigned { date, .. } = task.due
        && date.date() < task.request_date.date()
    {
        return Err(TaskValidationError::new(format!(
            "task {} due date {} precedes its request date {}",
            task.id,
            date.date(),
            task.request_date.date()
        )));
    }

    Ok(())
}

pub fn validate_task_collection(tasks: &[RequestTask]) -> Result<(), TaskValidationError> {
    let mut seen_ids = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen_ids.insert(task.id) {
            return Err(TaskValidationError::new(format!(
                "duplicate task id {}",
                task.id
            )));
        }
        validate_task(task)?;
    }
    Ok(())
}
