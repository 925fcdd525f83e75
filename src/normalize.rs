//! Line cleanup applied before classification

use regex::Regex;
use once_cell::sync::Lazy;

/// The dash every dash variant is folded into (en dash)
pub const CANONICAL_DASH: char = '\u{2013}';

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Clean a raw text line into its canonical form.
///
/// Non-breaking spaces become spaces, en/em dashes become [`CANONICAL_DASH`],
/// whitespace runs collapse to one space and the ends are trimmed.
pub fn normalize_line(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '\u{00a0}' => ' ',
            '\u{2013}' | '\u{2014}' => CANONICAL_DASH,
            other => other,
        })
        .collect();

    WHITESPACE_RE.replace_all(&replaced, " ").trim().to_string()
}

/// Normalize every line and drop the ones left empty
pub fn normalize_lines<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| normalize_line(line.as_ref()))
        .filter(|line| !line.is_empty())
        .collect()
}
