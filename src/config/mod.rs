use crate::align::{AlignError, DateRange};
use crate::models::IndicatorClass;
use crate::sentiment::ScorerKind;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub range: RangeConfig,
    pub http: HttpConfig,
    pub fred: FredConfig,
    pub yahoo: YahooConfig,
    pub news: NewsConfig,
    pub reddit: RedditConfig,
    pub sentiment: SentimentConfig,
    pub indicators: IndicatorsConfig,
    pub storage: StorageConfig,
}

/// Calendar every daily table is aligned to
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RangeConfig {
    #[serde(default = "default_start")]
    pub start: NaiveDate,

    #[serde(default = "default_end")]
    pub end: NaiveDate,
}

/// HTTP client behaviour shared by every source
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Article pages get a shorter budget than API calls
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,

    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// One FRED series and how it is treated on the daily calendar
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SeriesSpec {
    /// Column name in the indicator tables
    pub name: String,
    pub series_id: String,
    pub class: IndicatorClass,
    #[serde(default)]
    pub scale: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FredConfig {
    /// Read from the environment (`AAPL__FRED__API_KEY`) or `.env`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_fred_url")]
    pub base_url: String,

    #[serde(default = "default_series")]
    pub series: Vec<SeriesSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YahooConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,

    #[serde(default = "default_yahoo_url")]
    pub base_url: String,
}

/// News search, article scraping and per-day sampling
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewsConfig {
    #[serde(default = "default_gdelt_url")]
    pub base_url: String,

    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,

    #[serde(default = "default_themes")]
    pub themes: Vec<String>,

    #[serde(default = "default_country")]
    pub country: Option<String>,

    #[serde(default = "default_credible_domains")]
    pub credible_domains: Vec<String>,

    #[serde(default = "default_articles_per_day")]
    pub articles_per_day: usize,

    #[serde(default = "default_max_records")]
    pub max_records: u32,

    #[serde(default = "default_batch_days")]
    pub batch_days: usize,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_article_timeout_secs")]
    pub article_timeout_secs: u64,

    #[serde(default = "default_wayback_url")]
    pub wayback_url: String,

    #[serde(default = "default_min_article_chars")]
    pub min_article_chars: usize,

    #[serde(default = "default_max_article_chars")]
    pub max_article_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedditConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_reddit_agent")]
    pub user_agent: String,

    #[serde(default = "default_reddit_token_url")]
    pub token_url: String,

    #[serde(default = "default_reddit_api")]
    pub api_base: String,

    #[serde(default = "default_subreddits")]
    pub subreddits: Vec<String>,

    #[serde(default = "default_reddit_query")]
    pub query: String,

    #[serde(default = "default_reddit_limit")]
    pub limit: u32,

    #[serde(default = "default_reddit_pages")]
    pub max_pages: u32,

    #[serde(default = "default_reddit_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SentimentConfig {
    #[serde(default)]
    pub strategy: ScorerKind,

    #[serde(default = "default_inference_url")]
    pub endpoint: String,

    /// Bearer token for the inference endpoint (`AAPL__SENTIMENT__API_TOKEN`)
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

/// Daily indicator table assembly
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorsConfig {
    /// Column holding the equity close inside the indicator tables
    #[serde(default = "default_price_column")]
    pub price_column: String,

    /// Policy for columns not named in `fred.series`
    #[serde(default = "default_class")]
    pub default_class: IndicatorClass,

    #[serde(default = "default_true")]
    pub missing_flags: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default()
}
fn default_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_page_timeout_secs() -> u64 {
    10
}
fn default_request_delay_ms() -> u64 {
    250
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    10_000
}
fn default_user_agent() -> String {
    "aapl-sentiment/0.1 (research project; daily sentiment alignment)".to_string()
}
fn default_fred_url() -> String {
    "https://api.stlouisfed.org/fred".to_string()
}
fn default_series() -> Vec<SeriesSpec> {
    let spec = |name: &str, id: &str, class, scale| SeriesSpec {
        name: name.to_string(),
        series_id: id.to_string(),
        class,
        scale,
    };
    vec![
        spec("consumer_sentiment", "UMCSENT", IndicatorClass::Indicator, true),
        spec("dollar_index", "DTWEXBGS", IndicatorClass::Indicator, false),
        spec("corp_profits", "CP", IndicatorClass::Quarterly, false),
        spec("retail_sales", "MRTSSM453USN", IndicatorClass::Indicator, false),
    ]
}
fn default_symbol() -> String {
    "AAPL".to_string()
}
fn default_yahoo_url() -> String {
    "https://query2.finance.yahoo.com/v8/finance/chart".to_string()
}
fn default_gdelt_url() -> String {
    "https://api.gdeltproject.org/api/v2/doc/doc".to_string()
}
fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_keywords() -> Vec<String> {
    strings(&[
        "Apple stock",
        "iphone sales",
        "apple sales",
        "inflation",
        "interest rates",
        "CPI",
        "Federal Reserve",
    ])
}
fn default_themes() -> Vec<String> {
    strings(&[
        "ECON_FINANCE",
        "ECON_STOCKMARKET",
        "ECON_INFLATION",
        "BUSINESS",
        "TECHNOLOGY",
    ])
}
fn default_country() -> Option<String> {
    Some("US".to_string())
}
fn default_credible_domains() -> Vec<String> {
    strings(&[
        "bloomberg.com",
        "reuters.com",
        "ft.com",
        "forbes.com",
        "fortune.com",
        "marketwatch.com",
        "finance.yahoo.com",
        "wsj.com",
        "economist.com",
        "cnbc.com",
        "cnn.com",
        "nytimes.com",
        "washingtonpost.com",
        "businessinsider.com",
        "investopedia.com",
        "seekingalpha.com",
        "fool.com",
        "npr.org",
        "bbc.com",
        "theguardian.com",
        "usatoday.com",
        "latimes.com",
        "chicagotribune.com",
        "theatlantic.com",
        "usnews.com",
        "msn.com",
        "thestreet.com",
        "morningstar.com",
        "nasdaq.com",
        "businesstech.co.za",
    ])
}
fn default_articles_per_day() -> usize {
    3
}
fn default_max_records() -> u32 {
    250
}
fn default_batch_days() -> usize {
    5
}
fn default_concurrency() -> usize {
    5
}
fn default_article_timeout_secs() -> u64 {
    30
}
fn default_wayback_url() -> String {
    "https://archive.org/wayback/available".to_string()
}
fn default_min_article_chars() -> usize {
    200
}
fn default_max_article_chars() -> usize {
    2_000
}
fn default_reddit_agent() -> String {
    "aapl-sentiment/0.1 (by /u/aapl-sentiment-research)".to_string()
}
fn default_reddit_token_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}
fn default_reddit_api() -> String {
    "https://oauth.reddit.com".to_string()
}
fn default_subreddits() -> Vec<String> {
    strings(&[
        "wallstreetbets",
        "stocks",
        "stockmarket",
        "investing",
        "personalfinance",
        "options",
        "finance",
        "securityanalysis",
        "valueinvesting",
        "apple",
        "iphone",
        "economy",
        "technology",
        "business",
    ])
}
fn default_reddit_query() -> String {
    concat!(
        r#"("apple stock" OR AAPL OR "Apple Inc" OR "Tim Cook" OR iPhone OR MacBook "#,
        r#"OR "Apple earnings" OR "Apple share price" OR "Apple revenue" OR FAANG)"#
    )
    .to_string()
}
fn default_reddit_limit() -> u32 {
    100
}
fn default_reddit_pages() -> u32 {
    10
}
fn default_reddit_concurrency() -> usize {
    2
}
fn default_inference_url() -> String {
    "https://api-inference.huggingface.co/models/ProsusAI/finbert".to_string()
}
fn default_max_chars() -> usize {
    512
}
fn default_price_column() -> String {
    "aapl_close".to_string()
}
fn default_class() -> IndicatorClass {
    IndicatorClass::Indicator
}
fn default_true() -> bool {
    true
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self {
            start: default_start(),
            end: default_end(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            page_timeout_secs: default_page_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            jitter_ms: default_jitter_ms(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FredConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_fred_url(),
            series: default_series(),
        }
    }
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            base_url: default_yahoo_url(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: default_gdelt_url(),
            keywords: default_keywords(),
            themes: default_themes(),
            country: default_country(),
            credible_domains: default_credible_domains(),
            articles_per_day: default_articles_per_day(),
            max_records: default_max_records(),
            batch_days: default_batch_days(),
            concurrency: default_concurrency(),
            article_timeout_secs: default_article_timeout_secs(),
            wayback_url: default_wayback_url(),
            min_article_chars: default_min_article_chars(),
            max_article_chars: default_max_article_chars(),
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            user_agent: default_reddit_agent(),
            token_url: default_reddit_token_url(),
            api_base: default_reddit_api(),
            subreddits: default_subreddits(),
            query: default_reddit_query(),
            limit: default_reddit_limit(),
            max_pages: default_reddit_pages(),
            concurrency: default_reddit_concurrency(),
        }
    }
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            strategy: ScorerKind::default(),
            endpoint: default_inference_url(),
            api_token: None,
            max_chars: default_max_chars(),
        }
    }
}

impl Default for IndicatorsConfig {
    fn default() -> Self {
        Self {
            price_column: default_price_column(),
            default_class: default_class(),
            missing_flags: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// ── Accessors ────────────────────────────────────────────────────────────────

impl RangeConfig {
    pub fn date_range(&self) -> Result<DateRange, AlignError> {
        DateRange::new(self.start, self.end)
    }
}

impl FredConfig {
    pub fn spec_for(&self, name: &str) -> Option<&SeriesSpec> {
        self.series.iter().find(|s| s.name == name)
    }
}

impl StorageConfig {
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::load_from(Path::new("config"))
    }

    pub fn load_from(dir: &Path) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(
                config::File::from(dir.join("default"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::from(dir.join("local"))
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("AAPL")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("news.keywords")
                    .with_list_parse_key("news.themes")
                    .with_list_parse_key("reddit.subreddits")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration sources")?;

        let app_cfg: AppConfig = cfg
            .try_deserialize()
            .context("Invalid configuration")?;
        app_cfg.range.date_range().context("Invalid [range]")?;
        Ok(app_cfg)
    }
}
