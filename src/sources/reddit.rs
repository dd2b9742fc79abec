//! Reddit search over the OAuth API (application-only, client credentials).

use super::PostSource;
use super::http_client::HttpClient;
use crate::align::DateRange;
use crate::config::RedditConfig;
use crate::models::RedditPost;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    after: Option<String>,
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: RawPost,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
}

pub struct RedditClient {
    http: Arc<HttpClient>,
    config: RedditConfig,
    token: OnceCell<String>,
}

impl RedditClient {
    pub fn new(config: &RedditConfig, http: Arc<HttpClient>) -> Result<Self> {
        if config.client_id.is_none() || config.client_secret.is_none() {
            bail!("Reddit credentials missing: set AAPL__REDDIT__CLIENT_ID and AAPL__REDDIT__CLIENT_SECRET");
        }
        Ok(Self {
            http,
            config: config.clone(),
            token: OnceCell::new(),
        })
    }

    async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let url = Url::parse(&self.config.token_url).context("bad Reddit token URL")?;
                let id = self.config.client_id.clone().unwrap_or_default();
                let secret = self.config.client_secret.clone();
                let resp: TokenResponse = self
                    .http
                    .request_json(&url, |c| {
                        c.post(url.as_str())
                            .basic_auth(&id, secret.as_ref())
                            .header(USER_AGENT, &self.config.user_agent)
                            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                            .body("grant_type=client_credentials")
                    })
                    .await
                    .context("Reddit token request failed")?;
                info!("Reddit access token acquired");
                Ok::<String, anyhow::Error>(resp.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    fn search_url(&self, subreddit: &str, after: Option<&str>) -> Result<Url> {
        let limit = self.config.limit.to_string();
        let mut params = vec![
            ("q", self.config.query.as_str()),
            ("sort", "new"),
            ("restrict_sr", "1"),
            ("t", "all"),
            ("limit", limit.as_str()),
        ];
        if let Some(a) = after {
            params.push(("after", a));
        }
        Url::parse_with_params(
            &format!("{}/r/{}/search", self.config.api_base.trim_end_matches('/'), subreddit),
            &params,
        )
        .context("Failed to build Reddit search URL")
    }
}

/// Posts from one listing page, plus the creation date of the oldest one.
fn parse_listing(subreddit: &str, listing: Listing) -> (Vec<RedditPost>, Option<chrono::NaiveDate>) {
    let mut oldest = None;
    let posts = listing
        .data
        .children
        .into_iter()
        .filter_map(|c| {
            let date = chrono::DateTime::from_timestamp(c.data.created_utc as i64, 0)?.date_naive();
            oldest = Some(oldest.map_or(date, |o: chrono::NaiveDate| o.min(date)));
            Some(RedditPost {
                subreddit: subreddit.to_string(),
                date,
                title: c.data.title.trim().to_string(),
                selftext: c.data.selftext.trim().to_string(),
            })
        })
        .collect();
    (posts, oldest)
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_posts(&self, subreddit: &str, range: DateRange) -> Result<Vec<RedditPost>> {
        let token = self.access_token().await?.to_string();
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        for page in 1..=self.config.max_pages {
            let url = self.search_url(subreddit, after.as_deref())?;
            let listing: Listing = self
                .http
                .request_json(&url, |c| {
                    c.get(url.as_str())
                        .header(AUTHORIZATION, format!("Bearer {token}"))
                        .header(USER_AGENT, &self.config.user_agent)
                })
                .await
                .with_context(|| format!("r/{} search page {} failed", subreddit, page))?;

            after = listing.data.after.clone();
            let (batch, oldest) = parse_listing(subreddit, listing);
            debug!("r/{} page {}: {} posts", subreddit, page, batch.len());
            posts.extend(batch.into_iter().filter(|p| range.contains(p.date)));

            // Sorted newest first, so once we are past the start nothing older helps
            if after.is_none() || oldest.is_some_and(|o| o < range.start()) {
                break;
            }
        }

        posts.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_listing() {
        let json = r#"{"kind":"Listing","data":{"after":"t3_abc","children":[
            {"kind":"t3","data":{"title":"AAPL to the moon","selftext":"","created_utc":1583020800.0}},
            {"kind":"t3","data":{"title":"Earnings thread","selftext":"Discuss here ","created_utc":1577923200.0}}
        ]}}"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_abc"));
        let (posts, oldest) = parse_listing("stocks", listing);
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].date, NaiveDate::from_ymd_opt(2020, 3, 1).unwrap());
        assert_eq!(posts[1].text(), "Earnings thread Discuss here");
        assert_eq!(oldest, NaiveDate::from_ymd_opt(2020, 1, 2));
    }

    #[test]
    fn test_requires_credentials() {
        let http = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
        assert!(RedditClient::new(&RedditConfig::default(), Arc::clone(&http)).is_err());

        let cfg = RedditConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            ..RedditConfig::default()
        };
        let client = RedditClient::new(&cfg, http).unwrap();
        let url = client.search_url("apple", Some("t3_x")).unwrap();
        assert!(url.path().ends_with("/r/apple/search"));
        assert!(url.query_pairs().any(|(k, v)| k == "after" && v == "t3_x"));
    }
}
