//! Article body extraction, with a Wayback Machine snapshot as fallback for
//! pages that are gone or blocked.

use super::PageSource;
use super::cleaner::{squash_whitespace, truncate_chars};
use super::http_client::HttpClient;
use crate::config::NewsConfig;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct Availability {
    #[serde(default)]
    archived_snapshots: Snapshots,
}

#[derive(Debug, Default, Deserialize)]
struct Snapshots {
    closest: Option<Snapshot>,
}

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    available: bool,
    url: String,
}

pub struct ArticleFetcher {
    http: Arc<HttpClient>,
    wayback_url: String,
    min_chars: usize,
    max_chars: usize,
}

impl ArticleFetcher {
    pub fn new(config: &NewsConfig, http: Arc<HttpClient>) -> Self {
        Self {
            http,
            wayback_url: config.wayback_url.clone(),
            min_chars: config.min_article_chars,
            max_chars: config.max_article_chars,
        }
    }

    async fn live_text(&self, url: &Url) -> Result<String> {
        let html = self.http.get_page(url).await?;
        self.usable(extract_text(&html)?)
    }

    async fn archived_text(&self, url: &Url) -> Result<String> {
        let lookup = Url::parse_with_params(&self.wayback_url, &[("url", url.as_str())])
            .context("Failed to build Wayback URL")?;
        let avail: Availability = self.http.get_json(&lookup).await?;
        let snap = avail
            .archived_snapshots
            .closest
            .filter(|s| s.available)
            .ok_or_else(|| anyhow!("no archived snapshot for {}", url))?;
        let snap_url = Url::parse(&snap.url).context("bad snapshot URL")?;
        debug!("Using snapshot {}", snap_url);
        let html = self.http.get_page(&snap_url).await?;
        self.usable(extract_text(&html)?)
    }

    fn usable(&self, text: String) -> Result<String> {
        if text.chars().count() < self.min_chars {
            bail!("page text too short ({} chars)", text.chars().count());
        }
        Ok(truncate_chars(&text, self.max_chars).to_string())
    }
}

/// Visible paragraph text; falls back to `<article>` bodies when a page has
/// no `<p>` elements.
pub fn extract_text(html: &str) -> Result<String> {
    let doc = Html::parse_document(html);
    let p_sel = Selector::parse("p").map_err(|e| anyhow!("p selector: {:?}", e))?;
    let article_sel =
        Selector::parse("article").map_err(|e| anyhow!("article selector: {:?}", e))?;

    let collect = |sel: &Selector| {
        doc.select(sel)
            .map(|el| squash_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let text = collect(&p_sel);
    if text.is_empty() {
        Ok(collect(&article_sel))
    } else {
        Ok(text)
    }
}

#[async_trait]
impl PageSource for ArticleFetcher {
    async fn article_text(&self, url: &str) -> Result<String> {
        let url = Url::parse(url).with_context(|| format!("bad article URL {:?}", url))?;
        match self.live_text(&url).await {
            Ok(text) => Ok(text),
            Err(live_err) => {
                debug!("{}: {:#}; trying archive", url, live_err);
                self.archived_text(&url)
                    .await
                    .with_context(|| format!("live fetch failed ({live_err:#}) and archive fallback failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;

    #[test]
    fn test_extract_paragraphs() {
        let html = r#"<html><head><script>var x = 1;</script></head><body>
            <nav>Menu</nav>
            <p>Apple reported   record revenue.</p>
            <p></p>
            <p>Shares rose <b>3%</b> after hours.</p>
        </body></html>"#;
        assert_eq!(
            extract_text(html).unwrap(),
            "Apple reported record revenue. Shares rose 3% after hours."
        );
    }

    #[test]
    fn test_extract_article_fallback() {
        let html = "<html><body><article><h1>Title</h1><div>Body text</div></article></body></html>";
        assert_eq!(extract_text(html).unwrap(), "TitleBody text");
    }

    #[test]
    fn test_length_rules() {
        let http = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
        let fetcher = ArticleFetcher::new(&NewsConfig::default(), http);
        assert!(fetcher.usable("too short".into()).is_err());
        let long = "word ".repeat(1_000);
        let kept = fetcher.usable(long).unwrap();
        assert_eq!(kept.chars().count(), 2_000);
    }

    #[test]
    fn test_parse_availability() {
        let json = r#"{"url":"example.com","archived_snapshots":{"closest":{"status":"200","available":true,"url":"http://web.archive.org/web/20200101000000/https://example.com/","timestamp":"20200101000000"}}}"#;
        let a: Availability = serde_json::from_str(json).unwrap();
        assert!(a.archived_snapshots.closest.unwrap().available);
        let none: Availability = serde_json::from_str(r#"{"url":"x","archived_snapshots":{}}"#).unwrap();
        assert!(none.archived_snapshots.closest.is_none());
    }
}
