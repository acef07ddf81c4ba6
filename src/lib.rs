pub mod board;
pub mod calendar;
pub mod config;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod persistence;
pub mod scheduler;
pub mod task;
pub(crate) mod task_validation;

pub use board::{BoardError, DueDateBoard, RecomputeSummary, ScheduleEntry};
pub use calendar::{
    CalendarDay, CalendarPolicy, PolicyError, is_exceptional_day, month_grid,
    working_days_between,
};
pub use config::{ConfigError, ServerConfig};
#[cfg(feature = "sqlite")]
pub use persistence::sqlite::SqliteBoardStore;
pub use persistence::{
    BoardStore, PersistenceError, load_board_from_csv, load_board_from_json,
    load_policy_from_json, save_board_to_csv, save_board_to_json, save_policy_to_json,
};
pub use scheduler::{SchedulerError, compute_latest_start, compute_suggested_due_date};
pub use task::{AssignmentSource, DueDateState, RequestTask, SchedulingTask};
pub use task_validation::TaskValidationError;
