//! Calendar dates and week alignment
//!
//! Everything in here works on plain year/month/day values. Callers turn
//! "now" into a [`CalendarDate`] with their own clock rules first
//! ([`CalendarDate::today_local`] for a viewer, [`CalendarDate::today_utc`]
//! for a scheduler) and only then align it to a week.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, Local, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Full English month names, January first
const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// A calendar date with no time-of-day and no timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Build a date from a literal year/month/day triple.
    ///
    /// Returns `None` when the triple does not name a real day
    /// (month 13, 31 September, 29 February outside leap years...).
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Today according to the local wall clock
    pub fn today_local() -> Self {
        Self(Local::now().date_naive())
    }

    /// Today according to UTC
    pub fn today_utc() -> Self {
        Self(Utc::now().date_naive())
    }

    /// Parse a `YYYY-MM-DD` string
    pub fn parse_iso(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok().map(Self)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Day of the week numbered Sunday = 0 ... Saturday = 6
    pub fn weekday_from_sunday(&self) -> u32 {
        self.0.weekday().num_days_from_sunday()
    }

    /// Shift by a number of days, saturating at the representable range
    pub fn add_days(self, days: i64) -> Self {
        let shifted = if days >= 0 {
            self.0
                .checked_add_days(Days::new(days.unsigned_abs()))
                .unwrap_or(NaiveDate::MAX)
        } else {
            self.0
                .checked_sub_days(Days::new(days.unsigned_abs()))
                .unwrap_or(NaiveDate::MIN)
        };
        Self(shifted)
    }

    /// Human friendly form, e.g. "Monday, September 1, 2025"
    pub fn long_format(&self) -> String {
        self.0.format("%A, %B %-d, %Y").to_string()
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for CalendarDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalendarDate::parse_iso(s)
            .ok_or_else(|| format!("Invalid date: {}. Expected YYYY-MM-DD", s))
    }
}

impl Serialize for CalendarDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The Monday that starts the week containing `date`.
///
/// Weeks run Monday to Sunday, so a Sunday maps six days back. Mondays map
/// to themselves.
pub fn monday_of(date: CalendarDate) -> CalendarDate {
    let weekday = date.weekday_from_sunday() as i64;
    let back = if weekday == 0 { 6 } else { weekday - 1 };
    date.add_days(-back)
}

/// The upcoming Monday, strictly after `date`.
///
/// On a Monday this is the following Monday, seven days later.
pub fn next_monday_from(date: CalendarDate) -> CalendarDate {
    let weekday = date.weekday_from_sunday() as i64;
    let ahead = if weekday == 1 { 7 } else { (8 - weekday) % 7 };
    date.add_days(ahead)
}

/// Month number (1-12) for a full English month name, any case
pub fn month_from_name(name: &str) -> Option<u32> {
    let lower = name.trim().to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower)
        .map(|i| i as u32 + 1)
}

/// Capitalized English name for a month number
pub fn month_name(month: u32) -> Option<&'static str> {
    const DISPLAY: [&str; 12] = [
        "January", "February", "March", "April", "May", "June",
        "July", "August", "September", "October", "November", "December",
    ];
    DISPLAY.get(month.checked_sub(1)? as usize).copied()
}
