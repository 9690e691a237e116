//! Rolling window of bookable demo dates.
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Number of bookable days offered, starting the day after today.
pub const DATE_WINDOW_DAYS: u64 = 7;

/// One selectable demo date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateOption {
    /// Machine-readable `YYYY-MM-DD`.
    pub value: String,
    /// e.g. "Saturday, October 17, 2026".
    pub label: String,
    /// e.g. "Sat, Oct 17".
    pub short_label: String,
}

impl DateOption {
    fn from_date(date: NaiveDate) -> Self {
        Self {
            value: date.format("%Y-%m-%d").to_string(),
            label: long_date_label(date),
            short_label: date.format("%a, %b %-d").to_string(),
        }
    }
}

/// Long label used by both the form and the admin grouping.
pub fn long_date_label(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Build the window of dates strictly after `today`, ascending.
pub fn available_dates(today: NaiveDate) -> Vec<DateOption> {
    (1..=DATE_WINDOW_DAYS)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(DateOption::from_date)
        .collect()
}
