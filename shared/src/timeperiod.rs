use chrono::{DateTime, Datelike, Days, Utc};

pub type TimePeriodString = String;
pub type WeekString = TimePeriodString;
pub type DayString = TimePeriodString;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePeriod {
    Day,
    Week,
}

impl TimePeriod {
    pub fn time_string(&self, timestamp: DateTime<Utc>) -> TimePeriodString {
        match self {
            TimePeriod::Day => day_string(timestamp),
            TimePeriod::Week => week_string(timestamp),
        }
    }

    pub fn previous_period(&self, timestamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimePeriod::Day => timestamp.checked_sub_days(Days::new(1)),
            TimePeriod::Week => timestamp.checked_sub_days(Days::new(7)),
        }
    }
}

/// ISO-week key, e.g. `2026W34`. Week boundaries follow the ISO calendar,
/// so a PR merged on Sunday and one merged the following Monday land in
/// different weeks.
pub fn week_string(timestamp: DateTime<Utc>) -> WeekString {
    let week = timestamp.iso_week();
    format!("{}W{:02}", week.year(), week.week())
}

/// Calendar-day key in UTC, e.g. `20260824`. Used for the daily commit cap.
pub fn day_string(timestamp: DateTime<Utc>) -> DayString {
    format!(
        "{:04}{:02}{:02}",
        timestamp.year(),
        timestamp.month(),
        timestamp.day()
    )
}
