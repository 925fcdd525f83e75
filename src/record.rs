//! Theme records and the canonical record set

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::calendar::{monday_of, next_monday_from, CalendarDate};
use crate::parser::Candidate;

/// The theme for one week, keyed by the date it was listed under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRecord {
    /// Calendar date, `YYYY-MM-DD` on the wire
    pub date: CalendarDate,
    /// Theme text as written in the source
    pub theme: String,
}

impl ThemeRecord {
    pub fn new(date: CalendarDate, theme: impl Into<String>) -> Self {
        Self {
            date,
            theme: theme.into().trim().to_string(),
        }
    }
}

/// Date-sorted, duplicate-free collection of theme records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: Vec<ThemeRecord>,
}

impl RecordSet {
    /// Build from records in any order. Later records win on duplicate dates.
    pub fn from_records(records: impl IntoIterator<Item = ThemeRecord>) -> Self {
        let mut by_date = BTreeMap::new();
        for record in records {
            by_date.insert(record.date, record.theme);
        }
        Self {
            records: by_date
                .into_iter()
                .map(|(date, theme)| ThemeRecord { date, theme })
                .collect(),
        }
    }

    pub fn records(&self) -> &[ThemeRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ThemeRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact-date lookup. `None` just means no theme was listed for that date.
    pub fn get(&self, date: CalendarDate) -> Option<&ThemeRecord> {
        self.records
            .binary_search_by(|record| record.date.cmp(&date))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Record for the week containing `date`
    pub fn for_week_of(&self, date: CalendarDate) -> Option<&ThemeRecord> {
        self.get(monday_of(date))
    }

    /// Record for the upcoming week, see [`next_monday_from`]
    pub fn for_next_week_from(&self, date: CalendarDate) -> Option<&ThemeRecord> {
        self.get(next_monday_from(date))
    }

    /// First and last dates covered
    pub fn span(&self) -> Option<(CalendarDate, CalendarDate)> {
        Some((self.records.first()?.date, self.records.last()?.date))
    }
}

/// Fold candidates into the canonical record set.
///
/// Candidates are taken in document order; a later candidate for the same
/// date replaces the earlier one. The output is sorted by date.
pub fn build_records(candidates: impl IntoIterator<Item = Candidate>) -> RecordSet {
    RecordSet::from_records(
        candidates
            .into_iter()
            .map(|candidate| ThemeRecord::new(candidate.date, candidate.theme)),
    )
}

/// Statistics about one ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    /// Page the lines were scraped from
    pub source_url: String,
    /// Non-empty lines handed to the parser
    pub lines_seen: u64,
    /// Recognized month headers
    pub headers: u64,
    /// Dated entries parsed, before deduplication
    pub candidates: u64,
    /// Records written after deduplication
    pub records: u64,
    /// Dropped lines by reason
    #[serde(default)]
    pub skipped: BTreeMap<String, u64>,
    /// Run start time
    pub started_at: DateTime<Utc>,
    /// Run end time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl IngestStats {
    pub fn new(source_url: &str) -> Self {
        Self {
            source_url: source_url.to_string(),
            started_at: Utc::now(),
            ..Default::default()
        }
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_secs = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.completed_at = Some(now);
    }

    /// Candidates that were superseded by a later entry for the same date
    pub fn duplicates(&self) -> u64 {
        self.candidates.saturating_sub(self.records)
    }

    pub fn skipped_total(&self) -> u64 {
        self.skipped.values().sum()
    }
}
