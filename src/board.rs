use crate::calendar::{CalendarDate, CalendarPolicy, PolicyError};
use crate::scheduler::{self, SchedulerError};
use crate::task::{AssignmentSource, DueDateState, RequestTask};
use crate::task_validation::{self, TaskValidationError};
use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    #[error("task {0} not found")]
    TaskNotFound(i32),
    #[error("task {0} already exists")]
    DuplicateTask(i32),
    #[error("task {0} has no suggested due date to accept")]
    NoSuggestion(i32),
    #[error("{0}")]
    InvalidTask(#[from] TaskValidationError),
    #[error("invalid calendar policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("task {task_id}: {source}")]
    Scheduling {
        task_id: i32,
        #[source]
        source: SchedulerError,
    },
    #[error("{0} cannot be represented as a due date")]
    DateOutOfRange(NaiveDate),
}

pub type BoardResult<T> = Result<T, BoardError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeSummary {
    pub task_count: usize,
    pub suggested_count: usize,
    pub assigned_count: usize,
    pub unscheduled_count: usize,
    pub latest_due: Option<NaiveDateTime>,
}

impl RecomputeSummary {
    pub fn to_cli_summary(&self) -> String {
        let mut parts = Vec::new();
        parts.push(format!("tasks={}", self.task_count));
        parts.push(format!("suggested={}", self.suggested_count));
        parts.push(format!("assigned={}", self.assigned_count));
        if self.unscheduled_count > 0 {
            parts.push(format!("unscheduled={}", self.unscheduled_count));
        }
        if let Some(date) = self.latest_due {
            parts.push(format!("latest_due={}", date.format("%Y-%m-%d %H:%M")));
        }
        parts.join(" ")
    }
}

/// Proposed schedule row for calendar overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub task_id: i32,
    pub name: String,
    pub due: DueDateState,
    pub latest_start: Option<NaiveDateTime>,
}

/// Request tasks plus the policy their suggestions are derived from.
#[derive(Debug, Clone, Default)]
pub struct DueDateBoard {
    policy: CalendarPolicy,
    tasks: Vec<RequestTask>,
}

impl DueDateBoard {
    pub fn new(policy: CalendarPolicy) -> Self {
        Self {
            policy,
            tasks: Vec::new(),
        }
    }

    /// Builds a board from stored parts without touching their due dates.
    /// Stored tasks that could never get a suggestion are rejected.
    pub fn with_tasks(policy: CalendarPolicy, tasks: Vec<RequestTask>) -> BoardResult<Self> {
        policy.validate()?;
        task_validation::validate_task_collection(&tasks)?;
        Self::suggestions_for(&tasks, &policy)?;
        Ok(Self { policy, tasks })
    }

    pub fn policy(&self) -> &CalendarPolicy {
        &self.policy
    }

    pub fn tasks(&self) -> &[RequestTask] {
        &self.tasks
    }

    pub fn find_task(&self, task_id: i32) -> Option<&RequestTask> {
        self.tasks.iter().find(|task| task.id == task_id)
    }

    fn task_mut(&mut self, task_id: i32) -> BoardResult<&mut RequestTask> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or(BoardError::TaskNotFound(task_id))
    }

    pub fn next_task_id(&self) -> i32 {
        self.tasks
            .iter()
            .map(|task| task.id)
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
    }

    /// Replaces the policy and refreshes every suggestion. Nothing changes if
    /// the policy is invalid or any suggestion fails to compute.
    pub fn set_policy(&mut self, policy: CalendarPolicy) -> BoardResult<RecomputeSummary> {
        policy.validate()?;
        let suggestions = Self::suggestions_for(&self.tasks, &policy)?;
        info!(
            skip_weekends = policy.skip_weekends,
            use_working_hours = policy.use_working_hours,
            working_hours_start = policy.working_hours_start,
            working_hours_end = policy.working_hours_end,
            exceptional_days = policy.exceptional_days.len(),
            "calendar policy updated"
        );
        self.policy = policy;
        Ok(self.apply_suggestions(suggestions))
    }

    pub fn update_policy_with<F>(&mut self, mutator: F) -> BoardResult<RecomputeSummary>
    where
        F: FnOnce(&mut CalendarPolicy),
    {
        let mut policy = self.policy.clone();
        mutator(&mut policy);
        self.set_policy(policy)
    }

    /// Re-derives the suggestion of every task without an assigned due date.
    pub fn recompute(&mut self) -> BoardResult<RecomputeSummary> {
        let suggestions = Self::suggestions_for(&self.tasks, &self.policy)?;
        Ok(self.apply_suggestions(suggestions))
    }

    fn suggest_for(&self, task: &RequestTask) -> BoardResult<NaiveDateTime> {
        task.scheduling_task()
            .suggested_due_date(&self.policy)
            .map_err(|source| BoardError::Scheduling {
                task_id: task.id,
                source,
            })
    }

    fn suggestions_for(
        tasks: &[RequestTask],
        policy: &CalendarPolicy,
    ) -> BoardResult<Vec<Option<NaiveDateTime>>> {
        tasks
            .par_iter()
            .map(|task| {
                if task.due.is_assigned() {
                    return Ok(None);
                }
                task.scheduling_task()
                    .suggested_due_date(policy)
                    .map(Some)
                    .map_err(|source| BoardError::Scheduling {
                        task_id: task.id,
                        source,
                    })
            })
            .collect()
    }

    fn apply_suggestions(&mut self, suggestions: Vec<Option<NaiveDateTime>>) -> RecomputeSummary {
        for (task, suggestion) in self.tasks.iter_mut().zip(suggestions) {
            if let Some(date) = suggestion {
                task.due = DueDateState::Suggested { date };
            }
        }
        let summary = self.summary();
        debug!(summary = %summary.to_cli_summary(), "suggestions recomputed");
        summary
    }

    pub fn summary(&self) -> RecomputeSummary {
        let mut summary = RecomputeSummary {
            task_count: self.tasks.len(),
            suggested_count: 0,
            assigned_count: 0,
            unscheduled_count: 0,
            latest_due: None,
        };
        for task in &self.tasks {
            match task.due {
                DueDateState::Unscheduled => summary.unscheduled_count += 1,
                DueDateState::Suggested { .. } => summary.suggested_count += 1,
                DueDateState::Assigned { .. } => summary.assigned_count += 1,
            }
        }
        summary.latest_due = self
            .tasks
            .iter()
            .filter_map(RequestTask::effective_due_date)
            .max();
        summary
    }

    pub fn add_task(&mut self, task: RequestTask) -> BoardResult<()> {
        if self.find_task(task.id).is_some() {
            return Err(BoardError::DuplicateTask(task.id));
        }
        self.upsert_task(task)
    }

    /// Inserts or replaces a task by id. A task without an assigned date is
    /// rejected when no suggestion can be computed for it under the current
    /// policy, so a later recompute cannot fail on it.
    pub fn upsert_task(&mut self, task: RequestTask) -> BoardResult<()> {
        task_validation::validate_task(&task)?;
        if !task.due.is_assigned() {
            self.suggest_for(&task)?;
        }
        match self.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.push(task),
        }
        Ok(())
    }

    pub fn remove_task(&mut self, task_id: i32) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        self.tasks.len() != before
    }

    pub fn assign_due_date(
        &mut self,
        task_id: i32,
        date: NaiveDateTime,
        source: AssignmentSource,
    ) -> BoardResult<()> {
        let task = self.task_mut(task_id)?;
        let mut updated = task.clone();
        updated.due = DueDateState::Assigned { date, source };
        task_validation::validate_task(&updated)?;
        *task = updated;
        debug!(task_id, %date, source = source.as_str(), "due date assigned");
        Ok(())
    }

    /// Assigns one date to several tasks; fails without changes if any id is
    /// unknown. Repeated ids count once.
    pub fn bulk_assign(&mut self, task_ids: &[i32], date: NaiveDateTime) -> BoardResult<usize> {
        let unique: BTreeSet<i32> = task_ids.iter().copied().collect();
        let mut staged = Vec::with_capacity(unique.len());
        for task_id in unique {
            let task = self
                .find_task(task_id)
                .ok_or(BoardError::TaskNotFound(task_id))?;
            let mut updated = task.clone();
            updated.due = DueDateState::Assigned {
                date,
                source: AssignmentSource::Bulk,
            };
            task_validation::validate_task(&updated)?;
            staged.push(updated);
        }
        let count = staged.len();
        for updated in staged {
            self.upsert_task(updated)?;
        }
        info!(count, %date, "bulk due date assignment");
        Ok(count)
    }

    /// Assignment from dropping a task onto a calendar day: the day's end of
    /// working hours becomes the due date.
    pub fn drop_on_day(&mut self, task_id: i32, day: impl CalendarDate) -> BoardResult<NaiveDateTime> {
        let day = day.calendar_day();
        let date = self
            .policy
            .end_of_working_day(day)
            .ok_or(BoardError::DateOutOfRange(day))?;
        self.assign_due_date(task_id, date, AssignmentSource::CalendarDrop)?;
        Ok(date)
    }

    pub fn accept_suggestion(&mut self, task_id: i32) -> BoardResult<NaiveDateTime> {
        let task = self.task_mut(task_id)?;
        let date = task
            .due
            .suggestion()
            .ok_or(BoardError::NoSuggestion(task_id))?;
        task.due = DueDateState::Assigned {
            date,
            source: AssignmentSource::AcceptedSuggestion,
        };
        Ok(date)
    }

    /// Drops any due date; the next recompute suggests one again. Refused when
    /// the task could not get a suggestion under the current policy.
    pub fn clear_due_date(&mut self, task_id: i32) -> BoardResult<bool> {
        let task = self
            .find_task(task_id)
            .ok_or(BoardError::TaskNotFound(task_id))?;
        if task.due.is_assigned() {
            self.suggest_for(task)?;
        }
        let task = self.task_mut(task_id)?;
        let had_date = task.due != DueDateState::Unscheduled;
        task.due = DueDateState::Unscheduled;
        Ok(had_date)
    }

    pub fn tasks_due_on(&self, day: NaiveDate) -> Vec<&RequestTask> {
        self.tasks
            .iter()
            .filter(|task| task.effective_due_date().map(|date| date.date()) == Some(day))
            .collect()
    }

    /// Effective due date and the latest start that meets it, per task.
    pub fn schedule_overlay(&self) -> BoardResult<Vec<ScheduleEntry>> {
        let policy = &self.policy;
        self.tasks
            .par_iter()
            .map(|task| -> BoardResult<ScheduleEntry> {
                let latest_start = task
                    .effective_due_date()
                    .map(|due| scheduler::compute_latest_start(due, task.duration_hours, policy))
                    .transpose()
                    .map_err(|source| BoardError::Scheduling {
                        task_id: task.id,
                        source,
                    })?;
                Ok(ScheduleEntry {
                    task_id: task.id,
                    name: task.name.clone(),
                    due: task.due,
                    latest_start,
                })
            })
            .collect()
    }
}
