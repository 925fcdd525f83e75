//! Theme list fetcher
//!
//! Fetches the WordPress article, pulls the text lines out of its content
//! block and runs them through the parser and record builder.

use std::fs;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;

use crate::config::Config;
use crate::normalize::normalize_lines;
use crate::parser::ThemeParser;
use crate::record::{build_records, IngestStats, RecordSet};
use crate::store::{write_json_atomic, ThemeStore};

static ARTICLE_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse("article .entry-content").unwrap());
static ENTRY_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse(".entry-content").unwrap());

/// Direct children of the content block that carry theme lines
const LINE_TAGS: &[&str] = &["p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Elements that start a new line when nested inside a block
const BREAK_TAGS: &[&str] = &["br", "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Ways the source page can fail to yield any text
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed with status {0}")]
    Status(reqwest::StatusCode),
    #[error("no .entry-content block found in page")]
    NoContentBlock,
}

/// Extract normalized, non-empty text lines from the article HTML.
///
/// Uses the first `article .entry-content`, falling back to the first
/// `.entry-content`, and walks its block children in document order.
pub fn extract_lines(html: &str) -> Result<Vec<String>, FetchError> {
    let document = Html::parse_document(html);
    let content = document
        .select(&ARTICLE_CONTENT)
        .next()
        .or_else(|| document.select(&ENTRY_CONTENT).next())
        .ok_or(FetchError::NoContentBlock)?;

    let mut lines = Vec::new();
    for child in content.children().filter_map(ElementRef::wrap) {
        if !LINE_TAGS.contains(&child.value().name()) {
            continue;
        }
        let mut text = String::new();
        collect_text(child, &mut text);
        lines.extend(normalize_lines(text.split('\n')));
    }

    Ok(lines)
}

/// Concatenate text below `element`, with a newline for each `<br>` and
/// around nested blocks
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for node in element.children() {
        match node.value() {
            // Source newlines are plain whitespace in HTML
            Node::Text(text) => out.extend(text.chars().map(|c| match c {
                '\n' | '\r' => ' ',
                c => c,
            })),
            Node::Element(el) => {
                let name = el.name();
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let breaks = BREAK_TAGS.contains(&name);
                if breaks {
                    out.push('\n');
                }
                if let Some(child) = ElementRef::wrap(node) {
                    collect_text(child, out);
                }
                if breaks {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Parse extracted lines into the canonical record set
pub fn ingest_lines(parser: &ThemeParser, lines: &[String], stats: &mut IngestStats) -> RecordSet {
    let report = parser.parse(lines);
    let records = build_records(report.candidates.iter().cloned());

    stats.lines_seen = report.lines_seen as u64;
    stats.headers = report.headers as u64;
    stats.candidates = report.candidates.len() as u64;
    stats.records = records.len() as u64;
    stats.skipped = report.skip_summary();

    records
}

/// Fetches the source page and writes the record file
pub struct ThemeFetcher {
    config: Config,
    parser: ThemeParser,
}

impl ThemeFetcher {
    /// Create a fetcher with default config
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a fetcher with custom config
    pub fn with_config(config: Config) -> Self {
        let parser = ThemeParser::new()
            .with_trace(config.debug)
            .with_preview_lines(config.preview_lines);
        Self { config, parser }
    }

    /// Get the config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download the article HTML
    pub fn fetch_html(&self) -> Result<String> {
        let url = &self.config.source_url;
        tracing::info!("Fetching theme list from {}", url);

        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .user_agent(self.config.user_agent.as_str())
            .build()?;

        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()));
        pb.set_message("Fetching theme list...");
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let result = client
            .get(url)
            .send()
            .context("Failed to fetch theme list")
            .and_then(|response| {
                let status = response.status();
                if !status.is_success() {
                    return Err(anyhow::Error::new(FetchError::Status(status)));
                }
                response.text().context("Failed to read response body")
            });

        pb.finish_and_clear();
        let html = result?;
        tracing::debug!("Fetched {} bytes", html.len());
        Ok(html)
    }

    /// Download the article and extract its text lines
    pub fn fetch_lines(&self) -> Result<Vec<String>> {
        let html = self.fetch_html()?;
        let lines = extract_lines(&html)?;
        tracing::info!("Extracted {} lines", lines.len());
        Ok(lines)
    }

    /// Parse lines into records without touching the network or disk
    pub fn ingest(&self, lines: &[String]) -> (RecordSet, IngestStats) {
        let mut stats = IngestStats::new(&self.config.source_url);
        let records = ingest_lines(&self.parser, lines, &mut stats);
        stats.finish();
        (records, stats)
    }

    /// Fetch, parse and write themes.json and stats.json
    pub fn run(&self) -> Result<IngestStats> {
        let lines = self.fetch_lines()?;
        self.write(&lines)
    }

    /// Parse `lines` and write the results to the output directory
    pub fn write(&self, lines: &[String]) -> Result<IngestStats> {
        let (records, stats) = self.ingest(lines);

        if records.is_empty() {
            tracing::warn!("No theme records parsed; writing an empty list");
        }

        fs::create_dir_all(&self.config.output_dir)
            .context("Failed to create output directory")?;

        let store = ThemeStore::new(self.config.themes_path());
        store.save(&records)?;
        write_json_atomic(&self.config.stats_path(), &stats)?;

        tracing::info!("Wrote {} records to {:?}", records.len(), store.path());
        if let Some((first, last)) = records.span() {
            tracing::info!("  Covering {} to {}", first, last);
        }
        tracing::info!("  Lines seen: {}", stats.lines_seen);
        tracing::info!("  Duplicates replaced: {}", stats.duplicates());
        tracing::info!("  Lines skipped: {}", stats.skipped_total());

        Ok(stats)
    }
}

impl Default for ThemeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarDate;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="sidebar"><p>September 1999</p></div>
<article>
  <h1 class="entry-title">#MurderEveryMonday theme list</h1>
  <div class="entry-content">
    <p>Each week has a theme. Join in!</p>
    <p><strong>September&nbsp;2025</strong></p>
    <p>1st: Cover art<br>8th &#8211; <em>Trains</em> and boats<br/>15th &#8212; Locked rooms</p>
    <figure><figcaption>22nd: Not a line</figcaption></figure>
    <ul>
      <li>22nd: Poison</li>
      <li>29th: Golden Age</li>
    </ul>
    <p>October 2025</p>
    <p>6th: Academic mysteries</p>
  </div>
</article>
</body></html>"#;

    #[test]
    fn test_wrapped_source_lines_stay_joined() {
        let html = "<article><div class=\"entry-content\">\
            <p>September\n2025</p>\
            <p>1st: Cover\r\nart<br>8th: Trains</p>\
            </div></article>";
        let lines = extract_lines(html).unwrap();
        assert_eq!(lines, vec!["September 2025", "1st: Cover art", "8th: Trains"]);

        let mut stats = IngestStats::new("test");
        let records = ingest_lines(&ThemeParser::new(), &lines, &mut stats);
        assert_eq!(records.len(), 2);
        assert_eq!(records.records()[0].date, CalendarDate::from_ymd(2025, 9, 1).unwrap());
        assert_eq!(records.records()[0].theme, "Cover art");
    }

    #[test]
    fn test_extract_lines() {
        let lines = extract_lines(PAGE).unwrap();
        assert_eq!(
            lines,
            vec![
                "Each week has a theme. Join in!",
                "September 2025",
                "1st: Cover art",
                "8th \u{2013} Trains and boats",
                "15th \u{2013} Locked rooms",
                "22nd: Poison",
                "29th: Golden Age",
                "October 2025",
                "6th: Academic mysteries",
            ]
        );
    }

    #[test]
    fn test_extract_falls_back_to_entry_content() {
        let html = r#"<html><body><div class="entry-content"><p>September 2025</p></div></body></html>"#;
        assert_eq!(extract_lines(html).unwrap(), vec!["September 2025"]);
    }

    #[test]
    fn test_extract_without_content_block() {
        let html = "<html><body><p>September 2025</p></body></html>";
        assert!(matches!(extract_lines(html), Err(FetchError::NoContentBlock)));
    }

    #[test]
    fn test_ingest_page() {
        let fetcher = ThemeFetcher::new();
        let lines = extract_lines(PAGE).unwrap();
        let (records, stats) = fetcher.ingest(&lines);

        let got: Vec<(String, &str)> = records
            .records()
            .iter()
            .map(|r| (r.date.to_string(), r.theme.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("2025-09-01".to_string(), "Cover art"),
                ("2025-09-08".to_string(), "Trains and boats"),
                ("2025-09-15".to_string(), "Locked rooms"),
                ("2025-09-22".to_string(), "Poison"),
                ("2025-09-29".to_string(), "Golden Age"),
                ("2025-10-06".to_string(), "Academic mysteries"),
            ]
        );
        assert_eq!(stats.headers, 2);
        assert_eq!(stats.records, 6);
        assert_eq!(stats.skipped.get("unrecognized"), Some(&1));
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new().with_output_dir(dir.path());
        let fetcher = ThemeFetcher::with_config(config.clone());

        let lines: Vec<String> = ["September 2025", "1st: A", "1st: B"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let stats = fetcher.write(&lines).unwrap();
        assert_eq!(stats.duplicates(), 1);

        let records = ThemeStore::new(config.themes_path()).load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records.records()[0].theme, "B");

        let saved: IngestStats =
            serde_json::from_str(&fs::read_to_string(config.stats_path()).unwrap()).unwrap();
        assert_eq!(saved.records, 1);
        assert_eq!(saved.candidates, 2);
    }
}
