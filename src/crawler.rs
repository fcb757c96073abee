// Incremental page-by-page crawl with recency filtering.
//
// Boards list postings newest-first, so the last item of a page is the
// oldest thing on it. Once that trailing item falls behind the freshness
// cutoff, every later page is older still and the crawl can stop. A page
// bound caps the walk in case bad data keeps the trailing item "fresh"
// forever.
use chrono::{DateTime, Duration, FixedOffset};
use tracing::{debug, error, info, warn};

use crate::model::{DealPosting, FetchError, RAW_TIME_KEY, RawItem, SourceSite};
use crate::timeparse;

/// Source of raw board pages. Implementations own all site specifics
/// (transport, selectors); the crawler only sees raw item records.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<Vec<RawItem>, FetchError>;
}

/// How a crawl ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    /// Stale trailing edge reached, or the board ran out of pages.
    Complete,
    /// Page bound hit while the trailing item was still fresh; postings may
    /// have been missed.
    Truncated,
    /// A page fetch failed; the report carries whatever was accumulated.
    Aborted,
}

/// Result of one crawl invocation. `items` is in discovery order
/// (page-major, within-page order preserved), never re-sorted by time.
#[derive(Debug)]
pub struct CrawlReport {
    pub site: SourceSite,
    pub items: Vec<DealPosting>,
    pub status: CrawlStatus,
    pub pages_fetched: u32,
    /// Items older than the cutoff.
    pub stale: usize,
    /// Items discarded outright: unreadable timestamp or missing required
    /// fields.
    pub dropped: usize,
}

/// Transient per-crawl state. Lives for one `run` call, never persisted.
struct CrawlCursor {
    page: u32,
    pages_fetched: u32,
    items: Vec<DealPosting>,
    stale: usize,
    dropped: usize,
}

pub struct IncrementalCrawler<F> {
    fetcher: F,
    site: SourceSite,
    max_pages: u32,
    filter_window: Duration,
}

impl<F: PageFetcher> IncrementalCrawler<F> {
    pub fn new(fetcher: F, site: SourceSite, max_pages: u32, filter_window: Duration) -> Self {
        Self {
            fetcher,
            site,
            // A zero bound would never fetch anything.
            max_pages: max_pages.max(1),
            filter_window,
        }
    }

    /// Runs one crawl against the injected reference time. Never returns an
    /// error: fetch faults downgrade to an `Aborted` report carrying the
    /// partial result.
    pub async fn run(&self, now: DateTime<FixedOffset>) -> CrawlReport {
        let cutoff = now - self.filter_window;
        info!(
            site = %self.site,
            cutoff = %timeparse::to_canonical_string(&cutoff),
            max_pages = self.max_pages,
            "starting crawl"
        );

        let mut cursor = CrawlCursor {
            page: 1,
            pages_fetched: 0,
            items: Vec::new(),
            stale: 0,
            dropped: 0,
        };

        let status = loop {
            let raw_items = match self.fetcher.fetch_page(cursor.page).await {
                Ok(items) => items,
                Err(e) => {
                    error!(
                        site = %self.site,
                        page = cursor.page,
                        error = %e,
                        "page fetch failed, keeping partial results"
                    );
                    break CrawlStatus::Aborted;
                }
            };
            cursor.pages_fetched += 1;

            if raw_items.is_empty() {
                info!(site = %self.site, page = cursor.page, "empty page, no more content");
                break CrawlStatus::Complete;
            }

            let fresh_before = cursor.items.len();
            for raw in &raw_items {
                self.classify(raw, now, cutoff, &mut cursor);
            }
            debug!(
                site = %self.site,
                page = cursor.page,
                total = raw_items.len(),
                fresh = cursor.items.len() - fresh_before,
                "page filtered"
            );

            // Pagination is decided on the page's last RAW item, not the
            // filtered set: newest-first ordering makes it the oldest on
            // the page.
            let trailing = raw_items
                .last()
                .and_then(raw_timestamp)
                .map(|text| timeparse::normalize(text, now));
            match trailing {
                None | Some(Err(_)) => {
                    // Fail closed: ambiguous data must not drive an
                    // unbounded crawl.
                    warn!(
                        site = %self.site,
                        page = cursor.page,
                        "trailing item timestamp unreadable, stopping"
                    );
                    break CrawlStatus::Complete;
                }
                Some(Ok(t)) if t < cutoff => {
                    info!(
                        site = %self.site,
                        page = cursor.page,
                        trailing = %timeparse::to_canonical_string(&t),
                        "trailing item already stale, crawl finished"
                    );
                    break CrawlStatus::Complete;
                }
                Some(Ok(_)) if cursor.page >= self.max_pages => {
                    warn!(
                        site = %self.site,
                        max_pages = self.max_pages,
                        "page bound reached with a fresh trailing item, crawl may be incomplete"
                    );
                    break CrawlStatus::Truncated;
                }
                Some(Ok(_)) => {
                    cursor.page += 1;
                }
            }
        };

        info!(
            site = %self.site,
            status = ?status,
            pages = cursor.pages_fetched,
            fresh = cursor.items.len(),
            stale = cursor.stale,
            dropped = cursor.dropped,
            "crawl finished"
        );

        CrawlReport {
            site: self.site,
            items: cursor.items,
            status,
            pages_fetched: cursor.pages_fetched,
            stale: cursor.stale,
            dropped: cursor.dropped,
        }
    }

    /// Buckets one raw item: fresh (kept, converted), stale (discarded) or
    /// dropped (unusable). A bad item never affects pagination, which always
    /// looks at the trailing raw item separately.
    fn classify(
        &self,
        raw: &RawItem,
        now: DateTime<FixedOffset>,
        cutoff: DateTime<FixedOffset>,
        cursor: &mut CrawlCursor,
    ) {
        let Some(text) = raw_timestamp(raw) else {
            debug!(site = %self.site, "item without timestamp, dropping");
            cursor.dropped += 1;
            return;
        };
        let crawled_at = match timeparse::normalize(text, now) {
            Ok(t) => t,
            Err(e) => {
                debug!(site = %self.site, error = %e, "item timestamp unreadable, dropping");
                cursor.dropped += 1;
                return;
            }
        };

        // Inclusive lower bound: an item exactly at the cutoff is fresh.
        if crawled_at < cutoff {
            cursor.stale += 1;
            return;
        }

        match DealPosting::from_raw(raw, self.site, crawled_at) {
            Some(posting) => cursor.items.push(posting),
            None => {
                warn!(site = %self.site, "fresh item missing title or url, dropping");
                cursor.dropped += 1;
            }
        }
    }
}

fn raw_timestamp(raw: &RawItem) -> Option<&str> {
    let text = raw.get(RAW_TIME_KEY)?.as_str()?;
    if text.trim().is_empty() { None } else { Some(text) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeparse::{kst, to_canonical_string};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fetcher scripted with a fixed response per page number. Unscripted
    /// pages come back empty, like a board that ran out of content.
    struct ScriptedFetcher {
        pages: Mutex<HashMap<u32, Result<Vec<RawItem>, FetchError>>>,
        calls: Mutex<Vec<u32>>,
    }

    impl ScriptedFetcher {
        fn new(pages: Vec<(u32, Result<Vec<RawItem>, FetchError>)>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch_page(&self, page: u32) -> Result<Vec<RawItem>, FetchError> {
            self.calls.lock().unwrap().push(page);
            self.pages
                .lock()
                .unwrap()
                .remove(&page)
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn raw(title: &str, time: &str) -> RawItem {
        let mut item = RawItem::new();
        item.insert("title".to_string(), json!(title));
        item.insert(
            "productUrl".to_string(),
            json!(format!("https://example.com/deal/{title}")),
        );
        item.insert(RAW_TIME_KEY.to_string(), json!(time));
        item
    }

    fn now() -> DateTime<FixedOffset> {
        kst().with_ymd_and_hms(2025, 10, 23, 22, 36, 0).unwrap()
    }

    fn crawler(fetcher: ScriptedFetcher, max_pages: u32) -> IncrementalCrawler<ScriptedFetcher> {
        IncrementalCrawler::new(
            fetcher,
            SourceSite::Ppomppu,
            max_pages,
            Duration::minutes(30),
        )
    }

    #[tokio::test]
    async fn stops_when_trailing_item_is_stale() {
        // Page 1 ends with an item 40 minutes old; page 2 must never be hit.
        let fetcher = ScriptedFetcher::new(vec![
            (
                1,
                Ok(vec![
                    raw("a", "5분 전"),
                    raw("b", "10분 전"),
                    raw("c", "40분 전"),
                ]),
            ),
            (2, Ok(vec![raw("d", "1분 전")])),
        ]);
        let crawler = crawler(fetcher, 5);
        let report = crawler.run(now()).await;

        assert_eq!(report.status, CrawlStatus::Complete);
        assert_eq!(report.pages_fetched, 1);
        assert_eq!(report.items.len(), 2);
        assert_eq!(report.stale, 1);
        assert_eq!(crawler.fetcher.calls(), vec![1]);
    }

    #[tokio::test]
    async fn page_bound_yields_truncated() {
        let fetcher = ScriptedFetcher::new(vec![
            (1, Ok(vec![raw("a", "1분 전")])),
            (2, Ok(vec![raw("b", "2분 전")])),
            (3, Ok(vec![raw("c", "3분 전")])),
            (4, Ok(vec![raw("d", "4분 전")])),
        ]);
        let crawler = crawler(fetcher, 3);
        let report = crawler.run(now()).await;

        assert_eq!(report.status, CrawlStatus::Truncated);
        assert_eq!(report.pages_fetched, 3);
        assert_eq!(report.items.len(), 3);
        assert_eq!(crawler.fetcher.calls(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_partial_results() {
        let page1: Vec<RawItem> = (0..5).map(|i| raw(&format!("p{i}"), "3분 전")).collect();
        let fetcher = ScriptedFetcher::new(vec![
            (1, Ok(page1)),
            (2, Err(FetchError::BadStatus(reqwest::StatusCode::BAD_GATEWAY))),
        ]);
        let report = crawler(fetcher, 5).run(now()).await;

        assert_eq!(report.status, CrawlStatus::Aborted);
        assert_eq!(report.items.len(), 5);
        assert_eq!(report.pages_fetched, 1);
    }

    #[tokio::test]
    async fn cutoff_is_inclusive() {
        // Exactly 30 minutes old with a 30-minute window: kept.
        let boundary = now() - Duration::minutes(30);
        let fetcher = ScriptedFetcher::new(vec![(
            1,
            Ok(vec![raw("edge", &to_canonical_string(&boundary))]),
        )]);
        let report = crawler(fetcher, 2).run(now()).await;

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.stale, 0);
        // The trailing item sits exactly on the cutoff, so the crawler asks
        // for the (empty) next page before finishing.
        assert_eq!(report.status, CrawlStatus::Complete);
    }

    #[tokio::test]
    async fn empty_first_page_finishes_immediately() {
        let fetcher = ScriptedFetcher::new(vec![(1, Ok(Vec::new()))]);
        let report = crawler(fetcher, 5).run(now()).await;

        assert_eq!(report.status, CrawlStatus::Complete);
        assert!(report.items.is_empty());
        assert_eq!(report.pages_fetched, 1);
    }

    #[tokio::test]
    async fn unreadable_trailing_timestamp_stops_the_crawl() {
        let fetcher = ScriptedFetcher::new(vec![
            (
                1,
                Ok(vec![raw("a", "5분 전"), raw("b", "도대체 무슨 시간")]),
            ),
            (2, Ok(vec![raw("c", "1분 전")])),
        ]);
        let crawler = crawler(fetcher, 5);
        let report = crawler.run(now()).await;

        assert_eq!(report.status, CrawlStatus::Complete);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(crawler.fetcher.calls(), vec![1]);
    }

    #[tokio::test]
    async fn bad_item_drops_without_blocking_pagination() {
        // Middle item is garbage; the trailing item is fresh, so page 2 is
        // still fetched.
        let fetcher = ScriptedFetcher::new(vec![
            (
                1,
                Ok(vec![
                    raw("a", "5분 전"),
                    raw("broken", "???"),
                    raw("b", "10분 전"),
                ]),
            ),
            (2, Ok(vec![raw("c", "45분 전")])),
        ]);
        let crawler = crawler(fetcher, 5);
        let report = crawler.run(now()).await;

        assert_eq!(report.items.len(), 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(crawler.fetcher.calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn fresh_item_without_url_is_dropped() {
        let mut broken = raw("no-url", "5분 전");
        broken.remove("productUrl");
        let fetcher = ScriptedFetcher::new(vec![(1, Ok(vec![raw("ok", "5분 전"), broken]))]);
        let report = crawler(fetcher, 2).run(now()).await;

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.dropped, 1);
    }

    #[tokio::test]
    async fn items_stay_in_discovery_order() {
        let fetcher = ScriptedFetcher::new(vec![
            (1, Ok(vec![raw("first", "1분 전"), raw("second", "8분 전")])),
            (2, Ok(vec![raw("third", "12분 전"), raw("fourth", "50분 전")])),
        ]);
        let report = crawler(fetcher, 5).run(now()).await;

        let titles: Vec<&str> = report.items.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second", "third"]);
    }
}
