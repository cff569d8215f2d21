//! Booking window gate.
//!
//! Booking opens in the evening for the next day and stays open through the
//! early morning for the current day. Everything is evaluated in the site's
//! timezone, never the host's, and re-evaluated on every call since a lease
//! countdown can cross midnight.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

/// Result of evaluating the gate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    /// Whether a booking may be started now.
    pub open: bool,
    /// The date a booking made now is for.
    pub booking_date: NaiveDate,
    /// Site-local wall-clock time, truncated to the minute.
    pub local_time: NaiveTime,
}

/// Time-of-day and weekday predicate for booking availability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGate {
    timezone: Tz,
    start: NaiveTime,
    end: NaiveTime,
    excluded_weekdays: Vec<Weekday>,
}

impl WindowGate {
    /// Build a gate open from `start` (for tomorrow) until `end` (for today).
    #[must_use]
    pub fn new(timezone: Tz, start: NaiveTime, end: NaiveTime, excluded_weekdays: Vec<Weekday>) -> Self {
        Self {
            timezone,
            start: truncate_to_minute(start),
            end: truncate_to_minute(end),
            excluded_weekdays,
        }
    }

    /// The site timezone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Evaluate the gate at `now`.
    #[must_use]
    pub fn evaluate(&self, now: DateTime<Utc>) -> WindowStatus {
        let local = now.with_timezone(&self.timezone);
        let local_time = truncate_to_minute(local.time());
        let today = local.date_naive();

        let booking_date = if local_time >= self.start {
            today.checked_add_days(Days::new(1)).unwrap_or(today)
        } else {
            today
        };

        let in_hours = local_time >= self.start || local_time <= self.end;
        let excluded = self.excluded_weekdays.contains(&booking_date.weekday());

        WindowStatus {
            open: in_hours && !excluded,
            booking_date,
            local_time,
        }
    }

    /// Whether booking is open at `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.evaluate(now).open
    }

    /// The date a booking started at `now` is for.
    #[must_use]
    pub fn target_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.evaluate(now).booking_date
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}
