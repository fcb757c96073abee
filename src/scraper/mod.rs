pub mod fetcher;

pub use fetcher::{HttpFetcher, build_client};
