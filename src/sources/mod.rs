//! External data sources: economic series, daily prices, news metadata,
//! Reddit submissions, and article pages.
//!
//! Each concern sits behind a small async trait so the pipeline can be run
//! against in-memory fakes in tests.

pub mod article;
pub mod cleaner;
pub mod fred;
pub mod gdelt;
pub mod http_client;
pub mod reddit;
pub mod yahoo;

use crate::align::DateRange;
use crate::models::{ArticleRef, Observation, PriceBar, RedditPost};
use anyhow::Result;
use async_trait::async_trait;

pub use self::article::ArticleFetcher;
pub use self::fred::FredClient;
pub use self::gdelt::GdeltClient;
pub use self::reddit::RedditClient;
pub use self::yahoo::YahooClient;

// ── Source traits ─────────────────────────────────────────────────────────────

/// Dated observations of a named economic series.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    async fn fetch_series(&self, series_id: &str, range: DateRange) -> Result<Vec<Observation>>;
}

/// Daily OHLCV bars for a ticker symbol.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_bars(&self, symbol: &str, range: DateRange) -> Result<Vec<PriceBar>>;
}

/// Article metadata published within a date window.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn search_articles(&self, range: DateRange) -> Result<Vec<ArticleRef>>;
}

/// Readable body text of a web page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn article_text(&self, url: &str) -> Result<String>;
}

/// Submissions to one subreddit within a date window.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_posts(&self, subreddit: &str, range: DateRange) -> Result<Vec<RedditPost>>;
}
