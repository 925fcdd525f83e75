//! Weekly Themes Build CLI
//!
//! Scrape the theme list and write `themes.json`.
//!
//! # Examples
//!
//! Scrape into `public/themes.json`:
//! ```bash
//! weekly-themes-build
//! ```
//!
//! Show the first lines and every dropped line:
//! ```bash
//! weekly-themes-build --debug
//! ```
//!
//! Read settings from a JSON file (command-line flags still win):
//! ```bash
//! weekly-themes-build --config build.json
//! ```
//!
//! Parse a saved copy of the page instead of fetching it:
//! ```bash
//! weekly-themes-build --from-html page.html --output ./site
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use weekly_themes::fetcher::extract_lines;
use weekly_themes::{CalendarDate, Config, ThemeFetcher, ThemeStore};

#[derive(Parser)]
#[command(name = "weekly-themes-build")]
#[command(author, version, about = "Scrape the #MurderEveryMonday theme list into themes.json")]
#[command(long_about = r#"
Fetch the theme list article, parse its month headers and dated entries,
and write a sorted, deduplicated themes.json.

EXAMPLES:
  Scrape with defaults (writes public/themes.json):
    weekly-themes-build

  Use another source page (or set THEMES_SOURCE_URL):
    weekly-themes-build --source https://example.com/themes/

  Diagnose dropped lines:
    weekly-themes-build --debug

  Look up the theme for a date in an existing file:
    weekly-themes-build lookup 2025-09-03
"#)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON config file; THEMES_SOURCE_URL and flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source page (overrides THEMES_SOURCE_URL)
    #[arg(short, long)]
    source: Option<String>,

    /// Output directory for themes.json and stats.json [default: public]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parse a local HTML file instead of fetching the source page
    #[arg(long)]
    from_html: Option<PathBuf>,

    /// Log the first lines seen and every dropped line with its reason
    #[arg(long)]
    debug: bool,

    /// Number of leading lines shown with --debug [default: 30]
    #[arg(long)]
    preview_lines: Option<usize>,

    /// Fetch timeout in seconds [default: 30]
    #[arg(long)]
    timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the theme for the week containing a date
    Lookup {
        /// Date as YYYY-MM-DD (defaults to today, local time)
        date: Option<CalendarDate>,
    },

    /// Print every record in themes.json
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose || cli.debug {
        EnvFilter::new("weekly_themes=debug,weekly_themes_build=debug,info")
    } else {
        EnvFilter::new("weekly_themes=info,weekly_themes_build=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = config_from_cli(&cli)?;

    match &cli.command {
        Some(Commands::Lookup { date }) => lookup(&config, date.unwrap_or_else(CalendarDate::today_local)),
        Some(Commands::List) => list(&config),
        None => build(config, cli.from_html.as_deref()),
    }
}

/// Flags over THEMES_SOURCE_URL over the config file over defaults
fn config_from_cli(cli: &Cli) -> Result<Config> {
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(source) = &cli.source {
        config = config.with_source_url(source.clone());
    }
    if let Some(output) = &cli.output {
        config = config.with_output_dir(output);
    }
    if cli.debug {
        config = config.with_debug(true);
    }
    if let Some(lines) = cli.preview_lines {
        config.preview_lines = lines;
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    Ok(config)
}

fn build(config: Config, from_html: Option<&std::path::Path>) -> Result<()> {
    let fetcher = ThemeFetcher::with_config(config);

    let stats = match from_html {
        Some(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let lines = extract_lines(&html)?;
            tracing::info!("Extracted {} lines from {:?}", lines.len(), path);
            fetcher.write(&lines)?
        }
        None => fetcher.run()?,
    };

    println!(
        "Wrote {} records to {}",
        stats.records,
        fetcher.config().themes_path().display()
    );
    Ok(())
}

fn lookup(config: &Config, date: CalendarDate) -> Result<()> {
    let records = ThemeStore::new(config.themes_path()).load()?;
    let monday = weekly_themes::monday_of(date);

    match records.get(monday) {
        Some(record) => println!("{}: {}", record.date.long_format(), record.theme),
        None => println!("{}: No theme found.", monday.long_format()),
    }
    Ok(())
}

fn list(config: &Config) -> Result<()> {
    let records = ThemeStore::new(config.themes_path()).load()?;
    for record in records.records() {
        println!("{}  {}", record.date, record.theme);
    }
    println!("\n{} records", records.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        std::fs::write(
            &path,
            r#"{ "output_dir": "from-file", "timeout_secs": 5, "preview_lines": 10 }"#,
        )
        .unwrap();

        let cli = Cli::parse_from([
            "weekly-themes-build",
            "--config",
            path.to_str().unwrap(),
            "--timeout",
            "60",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("from-file"));
        assert_eq!(config.preview_lines, 10);
        assert_eq!(config.timeout_secs, 60);
        assert!(!config.debug);
    }

    #[test]
    fn test_defaults_without_config_file() {
        let cli = Cli::parse_from(["weekly-themes-build", "--output", "site", "--debug"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.themes_path(), PathBuf::from("site").join("themes.json"));
        assert_eq!(config.timeout_secs, 30);
        assert!(config.debug);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let cli = Cli::parse_from(["weekly-themes-build", "--config", missing.to_str().unwrap()]);
        assert!(config_from_cli(&cli).is_err());
    }
}
