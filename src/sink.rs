// Delivery of crawled postings to the ingestion API.
use rand::Rng;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::model::{DealPosting, DeliveryError, SourceSite};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// HTTP sink for the ingestion API. Owns its retry policy: transport faults
/// and 5xx responses are retried with exponential backoff, 4xx responses
/// are terminal. Callers never retry on top.
pub struct ApiSink {
    client: Client,
    api_url: String,
    api_key: String,
    max_retries: u32,
}

impl ApiSink {
    pub fn new(api_url: String, api_key: String, max_retries: u32) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            max_retries: max_retries.max(1),
        })
    }

    /// Posts one site's batch as `{"site": ..., "items": [...]}`.
    pub async fn deliver(
        &self,
        site: SourceSite,
        items: &[DealPosting],
    ) -> Result<(), DeliveryError> {
        let payload = json!({ "site": site, "items": items });

        for attempt in 1..=self.max_retries {
            if attempt > 1 {
                sleep(backoff(attempt)).await;
            }
            info!(%site, attempt, total = self.max_retries, "delivering batch");

            let response = self
                .client
                .post(&self.api_url)
                .header("X-API-Key", &self.api_key)
                .json(&payload)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    info!(%site, count = items.len(), "batch accepted");
                    return Ok(());
                }
                Ok(resp) if resp.status().is_server_error() => {
                    warn!(%site, status = %resp.status(), attempt, "ingestion api error, will retry");
                }
                Ok(resp) => {
                    // 4xx: the batch itself is bad, retrying cannot help.
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    return Err(DeliveryError::Rejected { status, body });
                }
                Err(e) => {
                    warn!(%site, error = %e, attempt, "delivery request failed, will retry");
                }
            }
        }

        Err(DeliveryError::RetriesExhausted(self.max_retries))
    }
}

/// 1s, 2s, 4s... plus a little jitter so parallel site tasks don't
/// hammer the API in lockstep.
fn backoff(attempt: u32) -> Duration {
    let base_ms = 1_000u64 << (attempt - 2).min(6);
    let jitter_ms = rand::rng().random_range(0..250);
    Duration::from_millis(base_ms + jitter_ms)
}
