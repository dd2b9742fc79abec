use crate::config::HttpConfig;
use anyhow::{Context, Result};
use reqwest::RequestBuilder;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

/// Browser identities rotated across article fetches.
const BROWSER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl FetchError {
    /// Worth another attempt: throttling, server errors, timeouts, refused
    /// connections.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                status.as_u16() == 429 || status.is_server_error()
            }
            FetchError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            FetchError::Decode { .. } => false,
        }
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Accept cookies so session-based pages work
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// GET a URL as text, retrying transient failures.
    pub async fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        self.request_text(url, |c| c.get(url.as_str())).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        self.request_json(url, |c| c.get(url.as_str())).await
    }

    /// Fetch an HTML page the way a browser would: rotated user agent and the
    /// shorter page timeout.
    pub async fn get_page(&self, url: &Url) -> Result<String, FetchError> {
        let agent = BROWSER_AGENTS[rand::random_range(0..BROWSER_AGENTS.len())];
        let timeout = Duration::from_secs(self.config.page_timeout_secs);
        self.request_text(url, |c| {
            c.get(url.as_str())
                .header(USER_AGENT, agent)
                .header(ACCEPT, "text/html,application/xhtml+xml,application/xml")
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
                .header(REFERER, "https://www.google.com/")
                .timeout(timeout)
        })
        .await
    }

    pub async fn request_text<F>(&self, url: &Url, make: F) -> Result<String, FetchError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let resp = self.execute(url, make).await?;
        resp.text().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }

    pub async fn request_json<T, F>(&self, url: &Url, make: F) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let body = self.request_text(url, make).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    async fn execute<F>(&self, url: &Url, make: F) -> Result<reqwest::Response, FetchError>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        self.polite_delay().await;

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.config.retry_base_ms)
            .max_delay(Duration::from_millis(self.config.max_backoff_ms))
            .map(jitter)
            .take(self.config.max_retries as usize);

        let mut attempt = 0u32;
        let action = || {
            attempt += 1;
            let req = make(&self.inner);
            let url = url.to_string();
            let n = attempt;
            async move {
                debug!("{} (attempt {})", url, n);
                let resp = req.send().await.map_err(|source| FetchError::Transport {
                    url: url.clone(),
                    source,
                })?;
                let status = resp.status();
                if status.is_success() {
                    Ok(resp)
                } else {
                    Err(FetchError::Status { status, url })
                }
            }
        };
        let retry_if = |e: &FetchError| {
            let transient = e.is_transient();
            if transient {
                warn!("Transient failure, backing off: {}", e);
            }
            transient
        };

        RetryIf::start(strategy, action, retry_if).await
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        if self.config.request_delay_ms == 0 && self.config.jitter_ms == 0 {
            return;
        }
        let jitter = rand::random_range(0..=self.config.jitter_ms);
        sleep(Duration::from_millis(self.config.request_delay_ms + jitter)).await;
    }
}
