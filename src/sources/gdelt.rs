//! GDELT DOC 2.0 article search (`mode=artlist`).

use super::NewsSource;
use super::cleaner::parse_date;
use super::http_client::HttpClient;
use crate::align::DateRange;
use crate::config::NewsConfig;
use crate::models::ArticleRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct ArtList {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
struct RawArticle {
    url: String,
    #[serde(default)]
    title: String,
    seendate: String,
    language: Option<String>,
}

pub struct GdeltClient {
    http: Arc<HttpClient>,
    base_url: String,
    query: String,
    max_records: u32,
}

impl GdeltClient {
    pub fn new(config: &NewsConfig, http: Arc<HttpClient>) -> Self {
        Self {
            http,
            base_url: config.base_url.clone(),
            query: build_query(&config.keywords, &config.themes, config.country.as_deref()),
            max_records: config.max_records,
        }
    }

    fn search_url(&self, range: DateRange) -> Result<Url> {
        let start = format!("{}000000", range.start().format("%Y%m%d"));
        let end = format!("{}235959", range.end().format("%Y%m%d"));
        let max = self.max_records.to_string();
        Url::parse_with_params(
            &self.base_url,
            &[
                ("query", self.query.as_str()),
                ("mode", "artlist"),
                ("format", "json"),
                ("sort", "datedesc"),
                ("startdatetime", start.as_str()),
                ("enddatetime", end.as_str()),
                ("maxrecords", max.as_str()),
            ],
        )
        .context("Failed to build GDELT URL")
    }
}

/// `("kw one" OR "kw two") (theme:A OR theme:B) sourcecountry:US`
pub fn build_query(keywords: &[String], themes: &[String], country: Option<&str>) -> String {
    let mut parts = Vec::new();
    let group = |items: Vec<String>| {
        if items.len() == 1 {
            items.into_iter().next().unwrap_or_default()
        } else {
            format!("({})", items.join(" OR "))
        }
    };
    if !keywords.is_empty() {
        parts.push(group(keywords.iter().map(|k| format!("\"{}\"", k.trim())).collect()));
    }
    if !themes.is_empty() {
        parts.push(group(themes.iter().map(|t| format!("theme:{}", t.trim())).collect()));
    }
    if let Some(c) = country.filter(|c| !c.trim().is_empty()) {
        parts.push(format!("sourcecountry:{}", c.trim()));
    }
    parts.join(" ")
}

/// GDELT answers an empty body (or a plain-text notice) when nothing matches.
fn parse_artlist(body: &str) -> Vec<ArticleRef> {
    let trimmed = body.trim();
    if trimmed.is_empty() || !trimmed.starts_with('{') {
        if !trimmed.is_empty() {
            warn!("GDELT returned a non-JSON body: {}", trimmed.lines().next().unwrap_or(""));
        }
        return Vec::new();
    }
    let list: ArtList = match serde_json::from_str(trimmed) {
        Ok(l) => l,
        Err(e) => {
            warn!("GDELT artlist could not be decoded: {}", e);
            ArtList::default()
        }
    };
    list.articles
        .into_iter()
        .filter_map(|a| {
            Some(ArticleRef {
                seen_date: parse_date(&a.seendate)?,
                url: a.url,
                title: a.title.trim().to_string(),
                language: a.language,
            })
        })
        .collect()
}

#[async_trait]
impl NewsSource for GdeltClient {
    async fn search_articles(&self, range: DateRange) -> Result<Vec<ArticleRef>> {
        let url = self.search_url(range)?;
        let body = self
            .http
            .get_text(&url)
            .await
            .with_context(|| format!("GDELT search failed for {}..{}", range.start(), range.end()))?;
        let articles = parse_artlist(&body);
        debug!("{}..{}: {} articles", range.start(), range.end(), articles.len());
        Ok(articles)
    }
}
