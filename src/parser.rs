//! Theme list parser
//!
//! The source article is a loose list of lines such as:
//!
//! ```text
//! September 2025
//! 1st: Cover art
//! 8th – Locked rooms
//! 5th June – Cover
//! ```
//!
//! Month headers set the month and year for the entries below them; an entry
//! may also name its own month inline. Lines that cannot be resolved to a
//! full date are dropped with a [`SkipReason`] and never abort the run.

use std::collections::BTreeMap;

use regex::Regex;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::calendar::{month_from_name, month_name, CalendarDate};
use crate::normalize::normalize_line;

/// "September 2025"
static MONTH_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z]+)\s+(\d{4})$").unwrap());

/// "13th – Love", "1st January: Cover", "20th: Something"
static DATED_ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?:st|nd|rd|th)?\s*([A-Za-z]+)?\s*[:\x{2013}-]\s*(.+)$").unwrap()
});

/// Default number of lines logged by the trace preview
pub const DEFAULT_PREVIEW_LINES: usize = 30;

/// Month/year context carried across one parse run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseState {
    /// Month (1-12) of the last recognized header
    pub current_month: Option<u32>,
    /// Year of the last recognized header
    pub current_year: Option<i32>,
}

impl ParseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Shape of a normalized line, before any date resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineClass<'a> {
    MonthHeader {
        month_name: &'a str,
        year: i32,
    },
    DatedEntry {
        day: u32,
        month_name: Option<&'a str>,
        theme: &'a str,
    },
    Unrecognized,
}

/// Classify a normalized line. Headers are tried before entries.
pub fn classify_line(line: &str) -> LineClass<'_> {
    if let Some(caps) = MONTH_HEADER_RE.captures(line) {
        if let (Some(name), Some(year)) = (caps.get(1), caps.get(2)) {
            if let Ok(year) = year.as_str().parse::<i32>() {
                return LineClass::MonthHeader {
                    month_name: name.as_str(),
                    year,
                };
            }
        }
    }

    if let Some(caps) = DATED_ENTRY_RE.captures(line) {
        let day = caps
            .get(1)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let theme = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        return LineClass::DatedEntry {
            day,
            month_name: caps.get(2).map(|m| m.as_str()),
            theme,
        };
    }

    LineClass::Unrecognized
}

/// A parsed (date, theme) pair, not yet deduplicated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub date: CalendarDate,
    pub theme: String,
}

/// Why a line produced no record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("line matches no known pattern")]
    Unrecognized,
    #[error("month header names an unknown month: {0}")]
    UnknownMonthHeader(String),
    #[error("missing day")]
    MissingDay,
    #[error("missing month (no inline month and no header seen)")]
    MissingMonth,
    #[error("unknown inline month: {0}")]
    UnknownMonth(String),
    #[error("missing year (no header seen)")]
    MissingYear,
    #[error("not a calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
}

impl SkipReason {
    /// Short stable label, used for per-reason counters
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::Unrecognized => "unrecognized",
            SkipReason::UnknownMonthHeader(_) => "unknown_month_header",
            SkipReason::MissingDay => "missing_day",
            SkipReason::MissingMonth => "missing_month",
            SkipReason::UnknownMonth(_) => "unknown_month",
            SkipReason::MissingYear => "missing_year",
            SkipReason::InvalidDate { .. } => "invalid_date",
        }
    }
}

/// What a single line did to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// A recognized month header; the state now holds this month and year
    Header { month: u32, year: i32 },
    Entry(Candidate),
    Skipped(SkipReason),
}

/// Parse one normalized line against the running state.
///
/// Only recognized month headers change `state`. An inline month applies to
/// its own line and leaves the state alone.
pub fn parse_line(state: &mut ParseState, line: &str) -> LineOutcome {
    match classify_line(line) {
        LineClass::MonthHeader { month_name, year } => match month_from_name(month_name) {
            Some(month) => {
                state.current_month = Some(month);
                state.current_year = Some(year);
                LineOutcome::Header { month, year }
            }
            None => LineOutcome::Skipped(SkipReason::UnknownMonthHeader(month_name.to_string())),
        },
        LineClass::DatedEntry { day, month_name, theme } => {
            match resolve_entry(state, day, month_name, theme) {
                Ok(candidate) => LineOutcome::Entry(candidate),
                Err(reason) => LineOutcome::Skipped(reason),
            }
        }
        LineClass::Unrecognized => LineOutcome::Skipped(SkipReason::Unrecognized),
    }
}

fn resolve_entry(
    state: &ParseState,
    day: u32,
    month_name: Option<&str>,
    theme: &str,
) -> Result<Candidate, SkipReason> {
    if day == 0 {
        return Err(SkipReason::MissingDay);
    }

    let month = match month_name {
        Some(name) => month_from_name(name).ok_or_else(|| SkipReason::UnknownMonth(name.to_string()))?,
        None => state.current_month.ok_or(SkipReason::MissingMonth)?,
    };

    let year = state
        .current_year
        .filter(|year| *year > 0)
        .ok_or(SkipReason::MissingYear)?;

    let date = CalendarDate::from_ymd(year, month, day)
        .ok_or(SkipReason::InvalidDate { year, month, day })?;

    Ok(Candidate {
        date,
        theme: normalize_line(theme),
    })
}

/// A dropped line, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based position in the input
    pub line_number: usize,
    pub line: String,
    pub reason: SkipReason,
}

/// Everything one parse run produced
#[derive(Debug, Clone, Default)]
pub struct ParseReport {
    /// Candidates in document order
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedLine>,
    /// Recognized month headers
    pub headers: usize,
    pub lines_seen: usize,
}

impl ParseReport {
    /// Skipped lines counted by [`SkipReason::kind`]
    pub fn skip_summary(&self) -> BTreeMap<String, u64> {
        let mut summary = BTreeMap::new();
        for skipped in &self.skipped {
            *summary.entry(skipped.reason.kind().to_string()).or_insert(0) += 1;
        }
        summary
    }
}

/// Line-oriented theme list parser
pub struct ThemeParser {
    /// Log previews and dropped lines
    trace: bool,
    /// Number of leading lines logged when tracing
    preview_lines: usize,
}

impl ThemeParser {
    /// Create a new parser with tracing off
    pub fn new() -> Self {
        Self {
            trace: false,
            preview_lines: DEFAULT_PREVIEW_LINES,
        }
    }

    /// Log the first lines and every dropped line at debug level
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Set how many leading lines the trace preview shows
    pub fn with_preview_lines(mut self, n: usize) -> Self {
        self.preview_lines = n;
        self
    }

    /// Parse a document from a fresh state
    pub fn parse<I, S>(&self, lines: I) -> ParseReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = ParseState::new();
        self.parse_with_state(&mut state, lines)
    }

    /// Parse a document, continuing from `state`
    pub fn parse_with_state<I, S>(&self, state: &mut ParseState, lines: I) -> ParseReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ParseReport::default();

        for (index, raw) in lines.into_iter().enumerate() {
            let line = normalize_line(raw.as_ref());
            if line.is_empty() {
                continue;
            }
            report.lines_seen += 1;

            if self.trace && report.lines_seen <= self.preview_lines {
                tracing::debug!("Line {}: {}", index + 1, line);
            }

            match parse_line(state, &line) {
                LineOutcome::Header { month, year } => {
                    report.headers += 1;
                    let name = month_name(month).unwrap_or("?");
                    tracing::trace!("Month header: {} {}", name, year);
                }
                LineOutcome::Entry(candidate) => report.candidates.push(candidate),
                LineOutcome::Skipped(reason) => {
                    if self.trace {
                        tracing::debug!("Skip line {} ({}): {:?}", index + 1, reason, line);
                    }
                    report.skipped.push(SkippedLine {
                        line_number: index + 1,
                        line,
                        reason,
                    });
                }
            }
        }

        report
    }
}

impl Default for ThemeParser {
    fn default() -> Self {
        Self::new()
    }
}
