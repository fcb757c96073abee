use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::BoardProfile;
use crate::crawler::PageFetcher;
use crate::model::{FetchError, RawItem};
use crate::parser::parse_board;

/// Shared HTTP client for all board fetchers. The per-request timeout is
/// the crawl's only suspension point, so it doubles as the page-level
/// watchdog: a hung board aborts that site's crawl with partial results.
pub fn build_client(timeout_seconds: u64) -> Result<Client, FetchError> {
    let client = Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) dealscan/0.1")
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?;
    Ok(client)
}

/// Board-backed [`PageFetcher`]: one HTTP GET per page, rows parsed through
/// the profile's selectors.
pub struct HttpFetcher {
    client: Client,
    profile: BoardProfile,
}

impl HttpFetcher {
    pub fn new(client: Client, profile: BoardProfile) -> Self {
        Self { client, profile }
    }

    fn page_url(&self, page: u32) -> String {
        self.profile.page_url.replace("{page}", &page.to_string())
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawItem>, FetchError> {
        let url = self.page_url(page);
        debug!(%url, "fetching board page");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::BadStatus(response.status()));
        }

        let html = response.text().await?;
        parse_board(&html, &self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_placeholder_is_substituted() {
        let profile = BoardProfile {
            base_url: "https://board.example.com".to_string(),
            page_url: "https://board.example.com/deals?page={page}&sort=new".to_string(),
            row: "tr".to_string(),
            title: "a".to_string(),
            time: "td.time".to_string(),
            reply: None,
            like: None,
            store: None,
            image: None,
        };
        let fetcher = HttpFetcher::new(build_client(5).unwrap(), profile);
        assert_eq!(
            fetcher.page_url(4),
            "https://board.example.com/deals?page=4&sort=new"
        );
    }
}
