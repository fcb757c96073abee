mod config;
mod crawler;
mod extract;
mod model;
mod notifier;
mod parser;
mod scraper;
mod sink;
mod timeparse;

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use futures::future::join_all;
use tracing::{error, info};

use config::{AppConfig, SiteConfig};
use crate::scraper::HttpFetcher;
use crawler::{CrawlStatus, IncrementalCrawler};
use notifier::{AlertLevel, SlackNotifier};
use sink::ApiSink;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.json".to_string());
    let config: Arc<AppConfig> = match config::load_config(&config_path) {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            error!("Config load error: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = match SlackNotifier::new(config.slack_webhook_url.clone()) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!("Failed to initialize alert channel: {e}");
            std::process::exit(1);
        }
    };
    let sink = match ApiSink::new(
        config.api_url.clone(),
        config.api_key.clone(),
        config.delivery_max_retries,
    ) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to initialize delivery sink: {e}");
            std::process::exit(1);
        }
    };
    let client = match crate::scraper::build_client(config.page_timeout_seconds) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };

    // One reference "now" for the whole sweep keeps every site's cutoff
    // consistent.
    let now = Utc::now().with_timezone(&timeparse::kst());
    info!(
        now = %timeparse::to_canonical_string(&now),
        sites = config.sites.len(),
        "🚀 starting crawl sweep"
    );

    // Sites are independent: each owns its cursor, so they crawl
    // concurrently and one site's failure never stops the others.
    let tasks: Vec<_> = config
        .sites
        .iter()
        .map(|site_cfg| {
            process_site(
                site_cfg,
                &config,
                client.clone(),
                sink.clone(),
                notifier.clone(),
                now,
            )
        })
        .collect();
    join_all(tasks).await;

    info!("crawl sweep finished");
}

/// Crawls one site, delivers whatever came back fresh, and alerts the
/// operator about anything abnormal. Never returns an error; a crawl
/// invocation does not raise past its own boundary.
async fn process_site(
    site_cfg: &SiteConfig,
    config: &AppConfig,
    client: reqwest::Client,
    sink: Arc<ApiSink>,
    notifier: Arc<SlackNotifier>,
    now: DateTime<FixedOffset>,
) {
    let site = site_cfg.site;
    let window_minutes = site_cfg
        .filter_window_minutes
        .unwrap_or(config.filter_window_minutes);

    let fetcher = HttpFetcher::new(client, site_cfg.profile.clone());
    let crawler = IncrementalCrawler::new(
        fetcher,
        site,
        site_cfg.max_pages,
        Duration::minutes(window_minutes as i64),
    );

    let report = crawler.run(now).await;

    match report.status {
        CrawlStatus::Complete => {}
        CrawlStatus::Truncated => {
            notifier
                .alert(
                    &format!("{site} crawl truncated"),
                    &format!(
                        "page bound ({}) reached while postings were still fresh, \
                         some may have been missed",
                        site_cfg.max_pages
                    ),
                    AlertLevel::Warning,
                )
                .await;
        }
        CrawlStatus::Aborted => {
            notifier
                .alert(
                    &format!("{site} crawl aborted"),
                    &format!(
                        "a page fetch failed mid-crawl; {} fresh postings were kept",
                        report.items.len()
                    ),
                    AlertLevel::Error,
                )
                .await;
        }
    }

    if report.items.is_empty() {
        info!(%site, "nothing fresh to deliver");
        return;
    }

    if let Err(e) = sink.deliver(site, &report.items).await {
        error!(%site, error = %e, "delivery failed");
        notifier
            .alert(
                &format!("{site} delivery failed"),
                &e.to_string(),
                AlertLevel::Error,
            )
            .await;
    }
}
