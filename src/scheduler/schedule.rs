//! Next-run calculation for recurring schedules
//!
//! Everything here is pure: given a frequency, a time of day and a reference
//! instant, [`next_run`] returns the next instant the batch should fire.
//! Malformed settings never fail; they resolve to safe defaults with a
//! logged warning.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{SchedulerError, SchedulerResult};
use crate::models::Schedule;

/// Day of month used for monthly runs
pub const MONTHLY_RUN_DAY: u32 = 1;

/// Day of week used for weekly runs
pub const WEEKLY_RUN_WEEKDAY: Weekday = Weekday::Mon;

/// Time used when the configured one cannot be parsed
pub const DEFAULT_TIME_OF_DAY: TimeOfDay = TimeOfDay { hour: 9, minute: 0 };

// ============================================================================
// Frequency
// ============================================================================

/// How often the batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse a configured value, falling back to daily with a warning
    pub fn resolve(value: &str) -> Self {
        value.parse().unwrap_or_else(|err: SchedulerError| {
            tracing::warn!(frequency = %value, error = %err, "Defaulting to daily schedule");
            Self::Daily
        })
    }
}

impl FromStr for Frequency {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(SchedulerError::unknown_frequency(s)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Time of Day
// ============================================================================

/// Wall-clock hour and minute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    /// Hour of the day (0-23)
    pub hour: u32,

    /// Minute of the hour (0-59)
    pub minute: u32,
}

impl TimeOfDay {
    /// Create a time of day, rejecting out-of-range values
    pub fn new(hour: u32, minute: u32) -> SchedulerResult<Self> {
        if hour > 23 || minute > 59 {
            return Err(SchedulerError::invalid_time(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    /// Parse a configured value, falling back to 09:00 with a warning
    pub fn resolve(value: &str) -> Self {
        value.parse().unwrap_or_else(|err: SchedulerError| {
            tracing::warn!(time_of_day = %value, error = %err, "Defaulting to 09:00");
            DEFAULT_TIME_OF_DAY
        })
    }

    /// As a chrono time with seconds zeroed
    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulerError;

    fn from_str(s: &str) -> SchedulerResult<Self> {
        let (hour, minute) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| SchedulerError::invalid_time(s))?;

        let hour: u32 = hour.parse().map_err(|_| SchedulerError::invalid_time(s))?;
        let minute: u32 = minute.parse().map_err(|_| SchedulerError::invalid_time(s))?;

        Self::new(hour, minute).map_err(|_| SchedulerError::invalid_time(s))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

// ============================================================================
// Resolved Schedule
// ============================================================================

/// A [`Schedule`] with its raw strings resolved to typed values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub frequency: Frequency,
    pub time: TimeOfDay,
}

impl ResolvedSchedule {
    /// Resolve stored settings, substituting defaults for malformed values
    pub fn from_settings(schedule: &Schedule) -> Self {
        Self {
            frequency: Frequency::resolve(&schedule.frequency),
            time: TimeOfDay::resolve(&schedule.time_of_day),
        }
    }

    /// Next run strictly after `now`
    pub fn next_run(&self, now: NaiveDateTime) -> NaiveDateTime {
        next_run(self.frequency, self.time, now)
    }
}

impl fmt::Display for ResolvedSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.frequency {
            Frequency::Daily => write!(f, "daily at {}", self.time),
            Frequency::Weekly => write!(f, "weekly on Monday at {}", self.time),
            Frequency::Monthly => write!(f, "monthly on the 1st at {}", self.time),
        }
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// Next run for a frequency: weekly runs on Monday, monthly on the 1st
pub fn next_run(frequency: Frequency, time: TimeOfDay, now: NaiveDateTime) -> NaiveDateTime {
    match frequency {
        Frequency::Daily => calculate_next_run(time, None, None, now),
        Frequency::Weekly => calculate_next_run(time, None, Some(WEEKLY_RUN_WEEKDAY), now),
        Frequency::Monthly => calculate_next_run(time, Some(MONTHLY_RUN_DAY), None, now),
    }
}

/// Next instant at `time` strictly after `now`
///
/// `day` pins a day of month (clamped to the month's length), `day_of_week`
/// pins a weekday. At most one of them is expected to be set.
pub fn calculate_next_run(
    time: TimeOfDay,
    day: Option<u32>,
    day_of_week: Option<Weekday>,
    now: NaiveDateTime,
) -> NaiveDateTime {
    let at = time.as_naive_time();
    let mut next = now.date().and_time(at);

    if next <= now {
        next += Duration::days(1);
    }

    if let Some(day) = day {
        let day = day.clamp(1, 31);
        if next.day() != day {
            let (year, month) = if next.day() < day {
                (next.year(), next.month())
            } else if next.month() == 12 {
                (next.year() + 1, 1)
            } else {
                (next.year(), next.month() + 1)
            };
            if let Some(date) = clamped_date(year, month, day) {
                next = date.and_time(at);
            }
        }
    }

    if let Some(weekday) = day_of_week {
        let delta = i64::from(weekday.num_days_from_monday())
            - i64::from(next.weekday().num_days_from_monday());
        next += Duration::days(delta.rem_euclid(7));
    }

    next
}

/// `day` in the given month, or the month's last day when it is shorter
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    (1..=day)
        .rev()
        .find_map(|d| NaiveDate::from_ymd_opt(year, month, d))
}

// ============================================================================
// Tests
// ============================================================================
