//! Weekly Themes Web Server
//!
//! Show this week's and next week's theme, and look up the week of any date.
//!
//! # Examples
//!
//! Serve with default settings:
//! ```bash
//! weekly-themes-serve
//! ```
//!
//! Specify the record file and port:
//! ```bash
//! weekly-themes-serve --themes ./site/themes.json --port 3000
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tracing_subscriber::EnvFilter;

use weekly_themes::{monday_of, next_monday_from, CalendarDate, RecordSet, ServerConfig, ThemeRecord, ThemeStore};

#[derive(Parser)]
#[command(name = "weekly-themes-serve")]
#[command(author, version, about = "Serve the weekly theme calendar")]
#[command(long_about = r#"
Serve themes.json with a small page showing the current and next Monday's
theme, a date picker, and JSON lookups.

EXAMPLES:
  Start server with defaults:
    weekly-themes-serve

  Use a custom record file:
    weekly-themes-serve --themes ./site/themes.json

  Bind to all interfaces (for network access):
    weekly-themes-serve --host 0.0.0.0
"#)]
struct Cli {
    /// Record file written by weekly-themes-build
    #[arg(short, long, default_value = "public/themes.json")]
    themes: PathBuf,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Application state shared across handlers
struct AppState {
    /// Current record set, replaced wholesale on reload
    records: RecordSet,
    /// File the records come from
    themes_path: PathBuf,
    /// When the records were last loaded
    loaded_at: DateTime<Utc>,
}

impl AppState {
    fn load(themes_path: PathBuf) -> Result<Self> {
        tracing::info!("Loading themes from {:?}...", themes_path);
        let records = ThemeStore::new(&themes_path).load_or_empty()?;
        tracing::info!("Loaded {} themes", records.len());
        Ok(Self {
            records,
            themes_path,
            loaded_at: Utc::now(),
        })
    }
}

type SharedState = Arc<RwLock<AppState>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("weekly_themes_serve=debug,weekly_themes=debug,tower_http=debug,info")
    } else {
        EnvFilter::new("weekly_themes_serve=info,weekly_themes=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // CLI > Default
    let mut config = ServerConfig::new().with_themes_path(&cli.themes);
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }

    let state = AppState::load(config.themes_path.clone())?;
    let shared_state: SharedState = Arc::new(RwLock::new(state));

    // Rate Limiting Configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(50)
            .burst_size(100)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    let app = router(shared_state)
        .layer(GovernorLayer { config: governor_conf })
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("content-security-policy"),
            HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = config.bind_address();
    tracing::info!("Server running at http://{}", addr);
    tracing::info!("Themes file: {:?}", config.themes_path);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>()).await?;

    Ok(())
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/themes.json", get(themes_json))
        .route("/api/current", get(api_current))
        .route("/api/next", get(api_next))
        .route("/api/week", get(api_week))
        .route("/api/reload", post(api_reload))
        .with_state(state)
}

// ============================================================================
// Lookups
// ============================================================================

/// `today` lets a client send its own local calendar date
#[derive(Debug, Deserialize)]
struct TodayQuery {
    today: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WeekQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    date: Option<String>,
    today: Option<String>,
}

#[derive(Debug, Serialize)]
struct WeekResponse {
    date: CalendarDate,
    monday: CalendarDate,
    record: Option<ThemeRecord>,
}

fn parse_date_param(raw: Option<&str>, name: &str) -> Result<Option<CalendarDate>, Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => CalendarDate::parse_iso(s).map(Some).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("Invalid {}: {}. Expected YYYY-MM-DD", name, s) })),
            )
                .into_response()
        }),
    }
}

fn week_response(records: &RecordSet, date: CalendarDate, monday: CalendarDate) -> WeekResponse {
    WeekResponse {
        date,
        monday,
        record: records.get(monday).cloned(),
    }
}

async fn api_current(Query(params): Query<TodayQuery>, State(state): State<SharedState>) -> Response {
    let today = match parse_date_param(params.today.as_deref(), "today") {
        Ok(date) => date.unwrap_or_else(CalendarDate::today_local),
        Err(response) => return response,
    };
    let state = state.read().await;
    Json(week_response(&state.records, today, monday_of(today))).into_response()
}

async fn api_next(Query(params): Query<TodayQuery>, State(state): State<SharedState>) -> Response {
    let today = match parse_date_param(params.today.as_deref(), "today") {
        Ok(date) => date.unwrap_or_else(CalendarDate::today_local),
        Err(response) => return response,
    };
    let state = state.read().await;
    Json(week_response(&state.records, today, next_monday_from(today))).into_response()
}

async fn api_week(Query(params): Query<WeekQuery>, State(state): State<SharedState>) -> Response {
    let date = match parse_date_param(params.date.as_deref(), "date") {
        Ok(Some(date)) => date,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Missing date parameter" })),
            )
                .into_response()
        }
        Err(response) => return response,
    };
    let state = state.read().await;
    Json(week_response(&state.records, date, monday_of(date))).into_response()
}

async fn themes_json(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(state.records.records().to_vec()),
    )
}

async fn api_reload(State(state): State<SharedState>) -> Response {
    let path = state.read().await.themes_path.clone();

    // Load outside the lock, then swap the whole set in one step
    let loaded = tokio::task::spawn_blocking(move || ThemeStore::new(path).load()).await;
    match loaded {
        Ok(Ok(records)) => {
            let mut state = state.write().await;
            state.records = records;
            state.loaded_at = Utc::now();
            tracing::info!("Reloaded {} themes", state.records.len());
            Json(serde_json::json!({
                "status": "reloaded",
                "records": state.records.len(),
                "loaded_at": state.loaded_at,
            }))
            .into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!("Reload failed, keeping previous themes: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("{:#}", e) })),
            )
                .into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// HTML
// ============================================================================

async fn home(Query(params): Query<PageQuery>, State(state): State<SharedState>) -> Response {
    let today = match parse_date_param(params.today.as_deref(), "today") {
        Ok(date) => date.unwrap_or_else(CalendarDate::today_local),
        Err(response) => return response,
    };
    let picked = match parse_date_param(params.date.as_deref(), "date") {
        Ok(date) => date,
        Err(_) => {
            let state = state.read().await;
            let content = "<p class=\"theme\">Invalid date. Use YYYY-MM-DD.</p>";
            return (StatusCode::BAD_REQUEST, Html(base_html(content, &state))).into_response();
        }
    };

    let state = state.read().await;
    let current = monday_of(today);
    let next = next_monday_from(today);

    let mut content = format!(
        r#"<p class="zone">Your timezone: UTC{}</p>
        {}
        {}
        <form method="GET" action="/" class="picker">
            <label>Pick a date <input type="date" name="date" value="{}"></label>
            <button type="submit">Look up</button>
        </form>"#,
        Local::now().format("%:z"),
        render_block("Current Monday", current, state.records.get(current)),
        render_block("Next Monday", next, state.records.get(next)),
        picked.unwrap_or(today),
    );

    if let Some(date) = picked {
        let monday = monday_of(date);
        content.push_str(&render_block(
            "Selected date (its Monday)",
            monday,
            state.records.get(monday),
        ));
    }

    Html(base_html(&content, &state)).into_response()
}

fn render_block(label: &str, monday: CalendarDate, record: Option<&ThemeRecord>) -> String {
    match record {
        Some(record) => format!(
            r#"<div class="block"><div class="date">{}: {}</div><div class="theme">{}</div></div>"#,
            label,
            record.date.long_format(),
            html_escape(&record.theme)
        ),
        None => format!(
            r#"<div class="block"><div class="date">{}: {}</div><div class="theme">No theme found.</div></div>"#,
            label,
            monday.long_format()
        ),
    }
}

fn base_html(content: &str, state: &AppState) -> String {
    format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>#MurderEveryMonday</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 40rem; margin: 2rem auto; padding: 0 1rem; }}
        .block {{ border: 1px solid #e2e8f0; border-radius: 12px; padding: 1rem; margin: 1rem 0; }}
        .date {{ color: #475569; font-size: 0.9rem; }}
        .theme {{ font-size: 1.3rem; margin-top: 0.3rem; }}
        footer {{ color: #94a3b8; font-size: 0.8rem; margin-top: 2rem; }}
    </style>
</head>
<body>
    <h1>#MurderEveryMonday</h1>
    {}
    <footer>{} themes, loaded {}</footer>
</body>
</html>"#,
        content,
        state.records.len(),
        state.loaded_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn date(s: &str) -> CalendarDate {
        CalendarDate::parse_iso(s).unwrap()
    }

    fn test_state(dir: &std::path::Path) -> SharedState {
        let path = dir.join("themes.json");
        let records = RecordSet::from_records(vec![
            ThemeRecord::new(date("2025-09-01"), "Cover art"),
            ThemeRecord::new(date("2025-09-08"), "Trains & <boats>"),
        ]);
        ThemeStore::new(&path).save(&records).unwrap();
        Arc::new(RwLock::new(AppState::load(path).unwrap()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_week_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let (status, json) = get_json(app, "/api/week?date=2025-09-07").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["monday"], "2025-09-01");
        assert_eq!(json["record"]["theme"], "Cover art");
    }

    #[tokio::test]
    async fn test_week_without_record_is_null() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let (status, json) = get_json(app, "/api/week?date=2025-09-17").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["monday"], "2025-09-15");
        assert!(json["record"].is_null());
    }

    #[tokio::test]
    async fn test_bad_dates_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (status, _) = get_json(router(state.clone()), "/api/week?date=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get_json(router(state), "/api/week").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_current_and_next_from_client_date() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (_, current) = get_json(router(state.clone()), "/api/current?today=2025-09-01").await;
        assert_eq!(current["record"]["theme"], "Cover art");

        // next from a Monday skips a full week
        let (_, next) = get_json(router(state), "/api/next?today=2025-09-01").await;
        assert_eq!(next["monday"], "2025-09-08");
        assert_eq!(next["record"]["theme"], "Trains & <boats>");
    }

    #[tokio::test]
    async fn test_themes_json_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (_, list) = get_json(router(state.clone()), "/themes.json").await;
        assert_eq!(list.as_array().unwrap().len(), 2);
        assert_eq!(list[0]["date"], "2025-09-01");

        ThemeStore::new(dir.path().join("themes.json"))
            .save(&RecordSet::from_records(vec![ThemeRecord::new(date("2025-09-15"), "Poison")]))
            .unwrap();

        let response = router(state.clone())
            .oneshot(Request::builder().method("POST").uri("/api/reload").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (_, list) = get_json(router(state), "/themes.json").await;
        assert_eq!(list, serde_json::json!([{ "date": "2025-09-15", "theme": "Poison" }]));
    }

    #[tokio::test]
    async fn test_home_page_escapes_themes() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/?today=2025-09-03&date=2025-09-10")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(html.contains("Current Monday: Monday, September 1, 2025"));
        assert!(html.contains("Cover art"));
        assert!(html.contains("Trains &amp; &lt;boats&gt;"));
        assert!(html.contains("Selected date (its Monday): Monday, September 8, 2025"));
    }
}
