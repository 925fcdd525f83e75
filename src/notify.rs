//! Weekly push notification
//!
//! Picks this week's theme (weeks aligned on the UTC calendar date) and
//! schedules a OneSignal notification delivered at the same local hour in
//! every subscriber's timezone.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calendar::{monday_of, CalendarDate};
use crate::config::NotifyConfig;
use crate::record::{RecordSet, ThemeRecord};
use crate::store::ThemeStore;

/// Body sent when no theme is listed for the week
pub const FALLBACK_MESSAGE: &str = "It\u{2019}s #MurderEveryMonday! Check today\u{2019}s theme.";

/// Notification text for the week's record, if any
pub fn message_for(record: Option<&ThemeRecord>) -> String {
    match record {
        Some(record) => format!("New #MurderEveryMonday theme: {}", record.theme),
        None => FALLBACK_MESSAGE.to_string(),
    }
}

/// OneSignal create-notification request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushPayload {
    pub app_id: String,
    pub included_segments: Vec<String>,
    pub contents: HashMap<String, String>,
    pub headings: HashMap<String, String>,
    pub url: String,
    pub delayed_option: String,
    pub send_after: String,
}

/// The parts of the OneSignal response we look at
#[derive(Debug, Clone, Deserialize)]
pub struct PushResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Builds and sends the weekly notification
pub struct PushNotifier {
    config: NotifyConfig,
}

impl PushNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }

    /// The record for the week containing `today`
    pub fn select<'a>(&self, records: &'a RecordSet, today: CalendarDate) -> Option<&'a ThemeRecord> {
        let monday = monday_of(today);
        let record = records.get(monday);
        match record {
            Some(record) => tracing::info!("Theme for week of {}: {}", monday, record.theme),
            None => tracing::warn!("No theme listed for week of {}", monday),
        }
        record
    }

    /// Request body for the given record
    pub fn payload(&self, record: Option<&ThemeRecord>) -> PushPayload {
        let en = |text: String| HashMap::from([("en".to_string(), text)]);
        PushPayload {
            app_id: self.config.app_id.clone(),
            included_segments: self.config.segments.clone(),
            contents: en(message_for(record)),
            headings: en(self.config.heading.clone()),
            url: self.config.site_url.clone(),
            delayed_option: "timezone".to_string(),
            send_after: self.config.send_after.clone(),
        }
    }

    /// Post the payload; returns the notification id
    pub fn send(&self, payload: &PushPayload) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let response = client
            .post(&self.config.api_url)
            .header(reqwest::header::AUTHORIZATION, format!("Basic {}", self.config.api_key))
            .json(payload)
            .send()
            .context("Failed to reach OneSignal")?;

        let status = response.status();
        let body = response.text().context("Failed to read OneSignal response")?;
        if !status.is_success() {
            anyhow::bail!("OneSignal error ({}): {}", status, body);
        }

        let parsed: PushResponse = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected OneSignal response: {}", body))?;
        if let Some(errors) = parsed.errors.filter(|e| !e.is_null()) {
            anyhow::bail!("OneSignal error: {}", errors);
        }
        parsed
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| anyhow::anyhow!("OneSignal response has no id: {}", body))
    }

    /// Load the record file, pick this week's theme for `today` and send
    pub fn run(&self, today: CalendarDate) -> Result<String> {
        let records = ThemeStore::new(&self.config.themes_path).load()?;
        let payload = self.payload(self.select(&records, today));
        let id = self.send(&payload)?;
        tracing::info!("OneSignal scheduled: {}", id);
        Ok(id)
    }
}
