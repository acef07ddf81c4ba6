//! Working-calendar due-date and start-date calculation.
//!
//! Both directions walk the calendar one day at a time starting from the
//! anchor, never counting the anchor day itself. Each eligible day absorbs up
//! to `working_hours_per_day` hours; the walk stops on the day that absorbs
//! the last remaining hour and the result is pinned to `working_hours_end`.
//!
//! A zero-hour duration consumes nothing, so no day is stepped and the result
//! is the anchor's own day at `working_hours_end`.

use crate::calendar::{CalendarPolicy, PolicyError, is_exceptional_day, is_weekend};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("duration must not be negative (got {0} hours)")]
    NegativeDuration(f64),
    #[error("duration must be a finite number of hours (got {0})")]
    NonFiniteDuration(f64),
    #[error("invalid calendar policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("date arithmetic overflowed while scheduling from {anchor}")]
    DateOutOfRange { anchor: NaiveDateTime },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

impl Direction {
    fn step(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Direction::Forward => date.succ_opt(),
            Direction::Backward => date.pred_opt(),
        }
    }
}

/// Latest start that still meets `due_date`, walking backward.
pub fn compute_latest_start(
    due_date: NaiveDateTime,
    duration_hours: f64,
    policy: &CalendarPolicy,
) -> SchedulerResult<NaiveDateTime> {
    check_duration(duration_hours)?;
    if !policy.use_working_hours {
        let offset = wall_clock_offset(due_date, duration_hours)?;
        return due_date
            .checked_sub_signed(offset)
            .ok_or(SchedulerError::DateOutOfRange { anchor: due_date });
    }
    walk_working_days(due_date, duration_hours, policy, Direction::Backward)
}

/// Suggested due date for work requested at `request_date`, walking forward.
pub fn compute_suggested_due_date(
    request_date: NaiveDateTime,
    duration_hours: f64,
    policy: &CalendarPolicy,
) -> SchedulerResult<NaiveDateTime> {
    check_duration(duration_hours)?;
    if !policy.use_working_hours {
        let offset = wall_clock_offset(request_date, duration_hours)?;
        return request_date
            .checked_add_signed(offset)
            .ok_or(SchedulerError::DateOutOfRange {
                anchor: request_date,
            });
    }
    walk_working_days(request_date, duration_hours, policy, Direction::Forward)
}

fn check_duration(duration_hours: f64) -> SchedulerResult<()> {
    if !duration_hours.is_finite() {
        return Err(SchedulerError::NonFiniteDuration(duration_hours));
    }
    if duration_hours < 0.0 {
        return Err(SchedulerError::NegativeDuration(duration_hours));
    }
    Ok(())
}

fn wall_clock_offset(anchor: NaiveDateTime, duration_hours: f64) -> SchedulerResult<Duration> {
    let millis = (duration_hours * MILLIS_PER_HOUR).round();
    if millis > i64::MAX as f64 {
        return Err(SchedulerError::DateOutOfRange { anchor });
    }
    Duration::try_milliseconds(millis as i64).ok_or(SchedulerError::DateOutOfRange { anchor })
}

fn walk_working_days(
    anchor: NaiveDateTime,
    duration_hours: f64,
    policy: &CalendarPolicy,
    direction: Direction,
) -> SchedulerResult<NaiveDateTime> {
    policy.validate()?;
    let capacity = f64::from(policy.working_hours_per_day());
    let out_of_range = SchedulerError::DateOutOfRange { anchor };

    let mut remaining = duration_hours;
    let mut cursor = anchor.date();
    while remaining > 0.0 {
        cursor = direction.step(cursor).ok_or_else(|| out_of_range.clone())?;
        // Weekend first, so a weekend that is also exceptional is skipped once.
        if policy.skip_weekends && is_weekend(cursor) {
            continue;
        }
        if is_exceptional_day(cursor, &policy.exceptional_days) {
            continue;
        }
        remaining -= remaining.min(capacity);
    }

    policy.end_of_working_day(cursor).ok_or(out_of_range)
}
