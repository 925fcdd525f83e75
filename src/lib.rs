//! # Weekly Themes
//!
//! Keep the #MurderEveryMonday theme calendar and look up the theme for any
//! week.
//!
//! This crate provides tools to:
//! - Fetch the theme list article and extract its text lines
//! - Parse the loosely formatted list into date-keyed theme records
//! - Store the records as a sorted, deduplicated JSON file
//! - Look up the theme for the week containing any date
//! - Serve the lookups over HTTP and schedule a weekly push notification
//!
//! ## Quick Start
//!
//! ```bash
//! # Scrape the list into public/themes.json
//! weekly-themes-build
//!
//! # Serve this week's and next week's theme
//! weekly-themes-serve --port 8080
//! ```
//!
//! ## Parsing
//!
//! ```
//! use weekly_themes::{build_records, CalendarDate, ThemeParser};
//!
//! let report = ThemeParser::new().parse(["September 2025", "1st: Cover art"]);
//! let records = build_records(report.candidates);
//!
//! let wednesday = CalendarDate::from_ymd(2025, 9, 3).unwrap();
//! assert_eq!(records.for_week_of(wednesday).unwrap().theme, "Cover art");
//! ```

pub mod calendar;
pub mod config;
pub mod fetcher;
pub mod normalize;
pub mod notify;
pub mod parser;
pub mod record;
pub mod store;

pub use calendar::{monday_of, next_monday_from, CalendarDate};
pub use config::{Config, NotifyConfig, ServerConfig};
pub use fetcher::ThemeFetcher;
pub use normalize::normalize_line;
pub use notify::PushNotifier;
pub use parser::{ParseReport, ParseState, SkipReason, ThemeParser};
pub use record::{build_records, IngestStats, RecordSet, ThemeRecord};
pub use store::ThemeStore;
