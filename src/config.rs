use serde::Deserialize;
use std::fs;

use crate::model::SourceSite;

/// Data-only site descriptor: everything site-specific is a CSS selector
/// string or a URL template here, never code. New boards are onboarded by
/// adding a config entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardProfile {
    /// Base for resolving relative hrefs.
    pub base_url: String,
    /// List page URL with a `{page}` placeholder.
    pub page_url: String,
    /// Selector for one posting row.
    pub row: String,
    /// Selector (within a row) for the title anchor; its href becomes the
    /// product URL.
    pub title: String,
    /// Selector (within a row) for the posting-time cell.
    pub time: String,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub like: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub site: SourceSite,
    /// Termination guard against pathological data; 2–5 in practice.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Per-site override of the global freshness window.
    #[serde(default)]
    pub filter_window_minutes: Option<u64>,
    pub profile: BoardProfile,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub api_url: String,
    pub api_key: String,
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    #[serde(default = "default_filter_window")]
    pub filter_window_minutes: u64,
    #[serde(default = "default_page_timeout")]
    pub page_timeout_seconds: u64,
    #[serde(default = "default_delivery_retries")]
    pub delivery_max_retries: u32,
    pub sites: Vec<SiteConfig>,
}

fn default_filter_window() -> u64 {
    30
}

fn default_max_pages() -> u32 {
    3
}

fn default_page_timeout() -> u64 {
    30
}

fn default_delivery_retries() -> u32 {
    3
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
