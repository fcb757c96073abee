use chrono::Utc;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::AlertError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    fn color(self) -> &'static str {
        match self {
            AlertLevel::Info => "#00ff00",
            AlertLevel::Warning => "#ffa500",
            AlertLevel::Error => "#ff0000",
        }
    }
}

/// Operator alerting over a Slack incoming webhook.
///
/// Alerting is strictly best-effort: a missing webhook makes every call a
/// no-op, and a failed webhook call is logged and swallowed. A broken alert
/// channel must never take down a crawl sweep.
pub struct SlackNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub async fn alert(&self, title: &str, message: &str, level: AlertLevel) {
        let Some(url) = &self.webhook_url else {
            debug!(title, "no slack webhook configured, dropping alert");
            return;
        };

        let payload = json!({
            "attachments": [{
                "color": level.color(),
                "title": title,
                "text": message,
                "footer": "dealscan crawler",
                "ts": Utc::now().timestamp(),
            }]
        });

        if let Err(e) = self.send(url, &payload).await {
            warn!(error = %e, title, "slack alert failed");
        }
    }

    async fn send(&self, url: &str, payload: &Value) -> Result<(), AlertError> {
        let response = self.client.post(url).json(payload).send().await?;
        if !response.status().is_success() {
            return Err(AlertError::Rejected(response.status()));
        }
        Ok(())
    }
}
