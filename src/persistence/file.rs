use super::{PersistenceError, PersistenceResult};
use crate::board::DueDateBoard;
use crate::calendar::CalendarPolicy;
use crate::task::{AssignmentSource, DueDateState, RequestTask};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Serialize, Deserialize)]
struct BoardSnapshot {
    #[serde(default)]
    policy: CalendarPolicy,
    tasks: Vec<RequestTask>,
}

impl BoardSnapshot {
    fn from_board(board: &DueDateBoard) -> PersistenceResult<Self> {
        super::validate_board(board)?;
        Ok(Self {
            policy: board.policy().clone(),
            tasks: board.tasks().to_vec(),
        })
    }

    fn into_board(self) -> PersistenceResult<DueDateBoard> {
        super::validate_tasks(&self.tasks)?;
        Ok(DueDateBoard::with_tasks(self.policy, self.tasks)?)
    }
}

pub fn save_board_to_json<P: AsRef<Path>>(board: &DueDateBoard, path: P) -> PersistenceResult<()> {
    let snapshot = BoardSnapshot::from_board(board)?;
    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(file, &snapshot)?;
    debug!(path = %path.as_ref().display(), tasks = snapshot.tasks.len(), "board saved as json");
    Ok(())
}

pub fn load_board_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<DueDateBoard> {
    let file = File::open(path)?;
    let snapshot: BoardSnapshot = serde_json::from_reader(file)?;
    snapshot.into_board()
}

pub fn save_policy_to_json<P: AsRef<Path>>(
    policy: &CalendarPolicy,
    path: P,
) -> PersistenceResult<()> {
    policy
        .validate()
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, policy)?;
    Ok(())
}

pub fn load_policy_from_json<P: AsRef<Path>>(path: P) -> PersistenceResult<CalendarPolicy> {
    let file = File::open(path)?;
    let policy: CalendarPolicy = serde_json::from_reader(file)?;
    policy
        .validate()
        .map_err(|err| PersistenceError::InvalidData(err.to_string()))?;
    Ok(policy)
}

#[derive(Default, Serialize, Deserialize)]
struct TaskCsvRecord {
    id: i32,
    request_no: String,
    name: String,
    request_date: String,
    duration_hours: f64,
    due_state: String,
    due_date: String,
    #[serde(default)]
    due_source: String,
    #[serde(default)]
    notes: String,
}

impl From<&RequestTask> for TaskCsvRecord {
    fn from(task: &RequestTask) -> Self {
        let (due_date, due_source) = match task.due {
            DueDateState::Unscheduled => (String::new(), String::new()),
            DueDateState::Suggested { date } => (format_date_time(date), String::new()),
            DueDateState::Assigned { date, source } => {
                (format_date_time(date), source.as_str().to_string())
            }
        };
        Self {
            id: task.id,
            request_no: task.request_no.clone(),
            name: task.name.clone(),
            request_date: format_date_time(task.request_date),
            duration_hours: task.duration_hours,
            due_state: task.due.as_str().to_string(),
            due_date,
            due_source,
            notes: task.notes.clone().unwrap_or_default(),
        }
    }
}

impl TaskCsvRecord {
    fn into_task(self) -> PersistenceResult<RequestTask> {
        let request_date = parse_date_time(&self.request_date)?.ok_or_else(|| {
            PersistenceError::InvalidData(format!("task {} is missing request_date", self.id))
        })?;
        let due_date = parse_date_time(&self.due_date)?;
        let due = match (self.due_state.trim(), due_date) {
            ("" | "unscheduled", _) => DueDateState::Unscheduled,
            ("suggested", Some(date)) => DueDateState::Suggested { date },
            ("assigned", Some(date)) => {
                let source = if self.due_source.trim().is_empty() {
                    AssignmentSource::Manual
                } else {
                    self.due_source
                        .parse::<AssignmentSource>()
                        .map_err(PersistenceError::InvalidData)?
                };
                DueDateState::Assigned { date, source }
            }
            (state, None) => {
                return Err(PersistenceError::InvalidData(format!(
                    "task {} has due_state '{state}' but no due_date",
                    self.id
                )));
            }
            (state, Some(_)) => {
                return Err(PersistenceError::InvalidData(format!(
                    "invalid due_state '{state}'"
                )));
            }
        };

        let mut task = RequestTask::new(self.id, self.name, request_date, self.duration_hours)
            .with_request_no(self.request_no);
        task.due = due;
        task.notes = if self.notes.trim().is_empty() {
            None
        } else {
            Some(self.notes)
        };
        Ok(task)
    }
}

pub fn save_board_to_csv<P: AsRef<Path>>(board: &DueDateBoard, path: P) -> PersistenceResult<()> {
    super::validate_board(board)?;
    let file = File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    for task in board.tasks() {
        writer.serialize(TaskCsvRecord::from(task))?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV carries tasks only; the board gets `policy`.
pub fn load_board_from_csv<P: AsRef<Path>>(
    path: P,
    policy: CalendarPolicy,
) -> PersistenceResult<DueDateBoard> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut tasks = Vec::new();
    for record in reader.deserialize::<TaskCsvRecord>() {
        let record = record?;
        tasks.push(record.into_task()?);
    }

    if tasks.is_empty() {
        return Err(PersistenceError::InvalidData(
            "CSV file contained no tasks".into(),
        ));
    }

    super::validate_tasks(&tasks)?;
    Ok(DueDateBoard::with_tasks(policy, tasks)?)
}

fn format_date_time(date: NaiveDateTime) -> String {
    date.format(DATE_TIME_FORMAT).to_string()
}

fn parse_date_time(input: &str) -> PersistenceResult<Option<NaiveDateTime>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(input.trim(), DATE_TIME_FORMAT)
        .map(Some)
        .map_err(|e| PersistenceError::InvalidData(format!("invalid date '{input}': {e}")))
}
