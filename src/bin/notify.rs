//! Weekly Themes Notify CLI
//!
//! Schedule the Monday-morning push with this week's theme.
//!
//! Requires `ONESIGNAL_APP_ID` and `ONESIGNAL_REST_API_KEY`.
//!
//! ```bash
//! weekly-themes-notify --site-url https://themes.example/
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use weekly_themes::{CalendarDate, NotifyConfig, PushNotifier, ThemeStore};

#[derive(Parser)]
#[command(name = "weekly-themes-notify")]
#[command(author, version, about = "Schedule the weekly theme push notification")]
struct Cli {
    /// Record file written by weekly-themes-build
    #[arg(short, long, default_value = "public/themes.json")]
    themes: PathBuf,

    /// Site opened from the notification
    #[arg(long)]
    site_url: Option<String>,

    /// Delivery time; OneSignal keeps the hour and minute in each recipient's timezone
    #[arg(long)]
    send_after: Option<String>,

    /// Week to announce, as YYYY-MM-DD (defaults to today in UTC)
    #[arg(long)]
    date: Option<CalendarDate>,

    /// Print the request body instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("weekly_themes_notify=debug,weekly_themes=debug,info")
    } else {
        EnvFilter::new("weekly_themes_notify=info,weekly_themes=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = if cli.dry_run {
        NotifyConfig::from_env().unwrap_or_else(|_| NotifyConfig::new("", ""))
    } else {
        NotifyConfig::from_env()?
    };
    config = config.with_themes_path(&cli.themes);
    if let Some(url) = cli.site_url {
        config = config.with_site_url(url);
    }
    if let Some(send_after) = cli.send_after {
        config = config.with_send_after(send_after);
    }

    // The scheduler runs on UTC, so "this week" is taken from the UTC date
    let today = cli.date.unwrap_or_else(CalendarDate::today_utc);
    let notifier = PushNotifier::new(config);

    if cli.dry_run {
        let records = ThemeStore::new(&notifier.config().themes_path).load()?;
        let payload = notifier.payload(notifier.select(&records, today));
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let id = notifier.run(today)?;
    println!("OneSignal scheduled: {}", id);
    Ok(())
}
