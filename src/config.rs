//! Weekly Themes Config

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::parser::DEFAULT_PREVIEW_LINES;

/// Page the theme list is published on
pub const DEFAULT_SOURCE_URL: &str =
    "https://crossexaminingcrime.wordpress.com/murdereverymonday-theme-list/";

/// Environment variable overriding the source page
pub const SOURCE_URL_ENV: &str = "THEMES_SOURCE_URL";

/// Name of the record file inside the output directory
pub const THEMES_FILE: &str = "themes.json";

/// Configuration for an ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Article to scrape
    pub source_url: String,
    /// Directory receiving themes.json and stats.json
    pub output_dir: PathBuf,
    /// User agent sent with the fetch
    pub user_agent: String,
    /// Fetch timeout in seconds
    pub timeout_secs: u64,
    /// Log the first lines and every dropped line
    pub debug: bool,
    /// Lines shown by the debug preview
    pub preview_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            output_dir: PathBuf::from("public"),
            user_agent: "gh-action-mem".to_string(),
            timeout_secs: 30,
            debug: false,
            preview_lines: DEFAULT_PREVIEW_LINES,
        }
    }
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the source URL taken from the environment when set
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(SOURCE_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.source_url = url.to_string();
            }
        }
        self
    }

    /// Set the source URL
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    /// Enable debug tracing of the parse
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Get the path to the record file
    pub fn themes_path(&self) -> PathBuf {
        self.output_dir.join(THEMES_FILE)
    }

    /// Get the path to the stats file
    pub fn stats_path(&self) -> PathBuf {
        self.output_dir.join("stats.json")
    }

    /// Save config to file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config {:?}", path))?;
        Ok(())
    }

    /// Load config from file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {:?}", path))?;
        Ok(config)
    }

    /// Config file (or defaults) with environment overrides applied
    pub fn resolve(file: Option<&Path>) -> anyhow::Result<Self> {
        let base = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }
}

/// Configuration for the lookup server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Record file to serve
    pub themes_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            themes_path: PathBuf::from("public").join(THEMES_FILE),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_themes_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.themes_path = path.into();
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the push notifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// OneSignal application id
    pub app_id: String,
    /// OneSignal REST API key
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Notifications endpoint
    pub api_url: String,
    /// Site opened when the notification is tapped
    pub site_url: String,
    /// Audience segments
    pub segments: Vec<String>,
    /// Notification title
    pub heading: String,
    /// Delivery time; only the hour and minute matter with per-timezone delivery
    pub send_after: String,
    /// Record file to read
    pub themes_path: PathBuf,
}

impl NotifyConfig {
    pub const APP_ID_ENV: &'static str = "ONESIGNAL_APP_ID";
    pub const API_KEY_ENV: &'static str = "ONESIGNAL_REST_API_KEY";

    /// Build from credentials with default delivery settings
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            api_url: "https://onesignal.com/api/v1/notifications".to_string(),
            site_url: "https://YOUR_DOMAIN_HERE/".to_string(),
            segments: vec!["Subscribed Users".to_string()],
            heading: "#MurderEveryMonday".to_string(),
            send_after: "2025-01-01 09:00:00 GMT-0700".to_string(),
            themes_path: PathBuf::from("public").join(THEMES_FILE),
        }
    }

    /// Read credentials from `ONESIGNAL_APP_ID` and `ONESIGNAL_REST_API_KEY`
    pub fn from_env() -> anyhow::Result<Self> {
        let app_id = non_empty_env(Self::APP_ID_ENV);
        let api_key = non_empty_env(Self::API_KEY_ENV);
        match (app_id, api_key) {
            (Some(app_id), Some(api_key)) => Ok(Self::new(app_id, api_key)),
            _ => anyhow::bail!(
                "Missing {} or {}",
                Self::APP_ID_ENV,
                Self::API_KEY_ENV
            ),
        }
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }

    pub fn with_themes_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.themes_path = path.into();
        self
    }

    pub fn with_send_after(mut self, send_after: impl Into<String>) -> Self {
        self.send_after = send_after.into();
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let config = Config::new().with_output_dir("out");
        assert_eq!(config.themes_path(), PathBuf::from("out").join("themes.json"));
        assert_eq!(config.stats_path(), PathBuf::from("out").join("stats.json"));
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new()
            .with_output_dir(dir.path())
            .with_source_url("https://example.com/themes")
            .with_debug(true);
        let path = dir.path().join("build.json");
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.source_url, "https://example.com/themes");
        assert!(loaded.debug);
        assert!(!dir.path().join("config.json").exists());
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.json");
        std::fs::write(&path, r#"{ "output_dir": "site", "timeout_secs": 5 }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("site"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.user_agent, "gh-action-mem");
        assert_eq!(config.preview_lines, DEFAULT_PREVIEW_LINES);
    }

    #[test]
    fn test_load_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_server_bind_address() {
        let config = ServerConfig::new().with_host("0.0.0.0").with_port(3000);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_notify_api_key_not_serialized() {
        let config = NotifyConfig::new("app", "secret");
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("Subscribed Users"));
    }
}
