use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while building or editing a [`CalendarPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    HourOutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("working hours end ({end}) must be after working hours start ({start})")]
    EmptyWorkingWindow { start: u32, end: u32 },
    #[error("please enter a valid date (YYYY-MM-DD), got '{0}'")]
    InvalidDate(String),
}

/// Working-calendar policy shared by every scheduling calculation.
///
/// When `use_working_hours` is false the remaining fields are ignored by the
/// scheduler and durations are applied as elapsed wall-clock hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CalendarPolicy {
    pub skip_weekends: bool,
    pub use_working_hours: bool,
    pub working_hours_start: u32,
    pub working_hours_end: u32,
    pub exceptional_days: BTreeSet<NaiveDate>,
}

impl Default for CalendarPolicy {
    fn default() -> Self {
        Self {
            skip_weekends: true,
            use_working_hours: true,
            working_hours_start: 8,
            working_hours_end: 17,
            exceptional_days: BTreeSet::new(),
        }
    }
}

impl CalendarPolicy {
    pub fn new(skip_weekends: bool, working_hours_start: u32, working_hours_end: u32) -> Self {
        Self {
            skip_weekends,
            use_working_hours: true,
            working_hours_start,
            working_hours_end,
            exceptional_days: BTreeSet::new(),
        }
    }

    /// Policy that treats durations as plain elapsed hours.
    pub fn wall_clock() -> Self {
        Self {
            use_working_hours: false,
            ..Self::default()
        }
    }

    pub fn with_exceptional_days<I>(mut self, days: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.exceptional_days.extend(days);
        self
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.working_hours_start > 23 {
            return Err(PolicyError::HourOutOfRange {
                field: "workingHoursStart",
                value: self.working_hours_start,
                min: 0,
                max: 23,
            });
        }
        if self.working_hours_end < 1 || self.working_hours_end > 24 {
            return Err(PolicyError::HourOutOfRange {
                field: "workingHoursEnd",
                value: self.working_hours_end,
                min: 1,
                max: 24,
            });
        }
        if self.working_hours_end <= self.working_hours_start {
            return Err(PolicyError::EmptyWorkingWindow {
                start: self.working_hours_start,
                end: self.working_hours_end,
            });
        }
        Ok(())
    }

    pub fn working_hours_per_day(&self) -> u32 {
        self.working_hours_end.saturating_sub(self.working_hours_start)
    }

    /// Eligible working day: not a skipped weekend and not an exceptional day.
    pub fn is_working_day(&self, date: impl CalendarDate) -> bool {
        let day = date.calendar_day();
        if self.skip_weekends && is_weekend(day) {
            return false;
        }
        !is_exceptional_day(day, &self.exceptional_days)
    }

    /// `date` at `working_hours_end:00:00`; an end of 24 rolls over to the
    /// following midnight.
    pub fn end_of_working_day(&self, date: NaiveDate) -> Option<NaiveDateTime> {
        date.and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::hours(i64::from(self.working_hours_end)))
    }

    pub fn add_exceptional_day(&mut self, date: NaiveDate) -> bool {
        self.exceptional_days.insert(date)
    }

    pub fn remove_exceptional_day(&mut self, date: NaiveDate) -> bool {
        self.exceptional_days.remove(&date)
    }

    /// Parse and add exceptional days; nothing is added if any entry is invalid.
    pub fn add_exceptional_day_strs<I, S>(&mut self, inputs: I) -> Result<usize, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = parse_exceptional_days(inputs)?;
        let before = self.exceptional_days.len();
        self.exceptional_days.extend(parsed);
        Ok(self.exceptional_days.len() - before)
    }
}

/// Anything that can be normalized to a single calendar day.
pub trait CalendarDate: Copy {
    fn calendar_day(self) -> NaiveDate;
}

impl CalendarDate for NaiveDate {
    fn calendar_day(self) -> NaiveDate {
        self
    }
}

impl CalendarDate for NaiveDateTime {
    fn calendar_day(self) -> NaiveDate {
        self.date()
    }
}

pub fn is_weekend(date: impl CalendarDate) -> bool {
    matches!(date.calendar_day().weekday(), Weekday::Sat | Weekday::Sun)
}

/// Membership test shared by the scheduler and every calendar view.
pub fn is_exceptional_day(date: impl CalendarDate, exceptional_days: &BTreeSet<NaiveDate>) -> bool {
    exceptional_days.contains(&date.calendar_day())
}

pub fn parse_calendar_date(input: &str) -> Result<NaiveDate, PolicyError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| PolicyError::InvalidDate(input.to_string()))
}

pub fn parse_exceptional_days<I, S>(inputs: I) -> Result<BTreeSet<NaiveDate>, PolicyError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .map(|input| parse_calendar_date(input.as_ref()))
        .collect()
}

/// One cell of a month view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_weekend: bool,
    pub is_exceptional: bool,
    pub is_working_day: bool,
}

impl CalendarDay {
    fn classify(date: NaiveDate, month: u32, policy: &CalendarPolicy) -> Self {
        Self {
            date,
            in_month: date.month() == month,
            is_weekend: is_weekend(date),
            is_exceptional: is_exceptional_day(date, &policy.exceptional_days),
            is_working_day: policy.is_working_day(date),
        }
    }
}

/// Sunday-first weeks covering the whole month, padded with the adjacent
/// months' days. Returns `None` for an invalid year/month.
pub fn month_grid(year: i32, month: u32, policy: &CalendarPolicy) -> Option<Vec<CalendarDay>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month_first.pred_opt()?;

    let leading = i64::from(first.weekday().num_days_from_sunday());
    let trailing = 6 - i64::from(last.weekday().num_days_from_sunday());
    let start = first.checked_sub_signed(Duration::days(leading))?;
    let end = last.checked_add_signed(Duration::days(trailing))?;

    Some(
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| CalendarDay::classify(day, month, policy))
            .collect(),
    )
}

/// Eligible working days in an inclusive range.
pub fn working_days_between(
    start: NaiveDate,
    end: NaiveDate,
    policy: &CalendarPolicy,
) -> Vec<NaiveDate> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| policy.is_working_day(*day))
        .collect()
}
