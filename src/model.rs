// Core structs: DealPosting, SourceSite, Price, error taxonomy
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::extract;
use crate::timeparse;

/// Untyped per-site extractor output. The crawler itself only ever reads
/// [`RAW_TIME_KEY`]; everything else is passed through to the boundary
/// conversion in [`DealPosting::from_raw`].
pub type RawItem = serde_json::Map<String, serde_json::Value>;

/// Key holding the raw posting timestamp inside a [`RawItem`].
pub const RAW_TIME_KEY: &str = "crawledAt";

/// Sentinel store name for postings where no seller could be extracted.
pub const UNKNOWN_STORE: &str = "기타";

/// The fixed set of boards the crawler knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceSite {
    Ppomppu,
    Ruliweb,
    Arcalive,
    Fmkorea,
    Quasarzone,
    Eomisae,
}

impl SourceSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSite::Ppomppu => "PPOMPPU",
            SourceSite::Ruliweb => "RULIWEB",
            SourceSite::Arcalive => "ARCALIVE",
            SourceSite::Fmkorea => "FMKOREA",
            SourceSite::Quasarzone => "QUASARZONE",
            SourceSite::Eomisae => "EOMISAE",
        }
    }
}

impl std::fmt::Display for SourceSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing price. Domestic prices are kept as an integer amount of won;
/// foreign-currency prices keep whatever text the board showed ("$899",
/// "¥98,000") since the ingestion API displays them verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Won(i64),
    Foreign(String),
}

/// One scraped hot-deal posting, in the shape the ingestion API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPosting {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_fee: Option<String>,
    pub store_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub product_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
    #[serde(default)]
    pub like_count: u32,
    pub source_site: SourceSite,
    #[serde(with = "timeparse::canonical")]
    pub crawled_at: DateTime<FixedOffset>,
}

impl DealPosting {
    /// Converts a raw extractor item into a typed posting. `crawled_at` is
    /// passed in already normalized; the raw timestamp text is not re-read.
    ///
    /// Returns `None` when `title` or `productUrl` is missing or empty;
    /// those two are required for identity downstream.
    pub fn from_raw(
        raw: &RawItem,
        site: SourceSite,
        crawled_at: DateTime<FixedOffset>,
    ) -> Option<Self> {
        let title = non_empty_str(raw, "title")?;
        let product_url = non_empty_str(raw, "productUrl")?;

        let price = raw
            .get("price")
            .and_then(|v| serde_json::from_value::<Price>(v.clone()).ok());

        Some(Self {
            title,
            price,
            shipping_fee: non_empty_str(raw, "shippingFee"),
            store_name: non_empty_str(raw, "storeName")
                .unwrap_or_else(|| UNKNOWN_STORE.to_string()),
            category: non_empty_str(raw, "category"),
            product_url,
            image_url: non_empty_str(raw, "imageUrl"),
            reply_count: count_field(raw, "replyCount"),
            like_count: count_field(raw, "likeCount"),
            source_site: site,
            crawled_at,
        })
    }
}

fn non_empty_str(raw: &RawItem, key: &str) -> Option<String> {
    let text = raw.get(key)?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Boards render counters either as numbers or as decorated text ("[15]",
/// "1,234"); both shapes end up as plain integers here.
fn count_field(raw: &RawItem, key: &str) -> u32 {
    match raw.get(key) {
        Some(v) => match v.as_u64() {
            Some(n) => u32::try_from(n).unwrap_or(u32::MAX),
            None => v.as_str().map(extract::extract_count).unwrap_or(0),
        },
        None => 0,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0} from board")]
    BadStatus(reqwest::StatusCode),

    #[error("invalid selector in board profile: {0}")]
    Selector(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ingestion api rejected the batch ({status}): {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("delivery gave up after {0} attempts")]
    RetriesExhausted(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook rejected the alert: {0}")]
    Rejected(reqwest::StatusCode),
}
