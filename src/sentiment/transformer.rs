//! Hosted transformer classifier (FinBERT-style) behind an inference HTTP
//! endpoint.
//!
//! Request: `POST {endpoint}` with `{"inputs": "<text>"}`.
//! Response: `[[{"label": "positive", "score": 0.93}, ...]]` (some
//! deployments drop the outer array).

use super::{Sentiment, SentimentScorer};
use crate::config::SentimentConfig;
use crate::models::SentimentLabel;
use crate::sources::cleaner::truncate_chars;
use crate::sources::http_client::HttpClient;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
    Failed { error: String },
}

pub struct TransformerScorer {
    http: Arc<HttpClient>,
    endpoint: String,
    api_token: Option<String>,
    max_chars: usize,
}

impl TransformerScorer {
    pub fn new(config: &SentimentConfig, http: Arc<HttpClient>) -> Self {
        Self {
            http,
            endpoint: config.endpoint.clone(),
            api_token: config.api_token.clone(),
            max_chars: config.max_chars,
        }
    }
}

/// Highest-confidence label of a classifier response.
pub fn top_label(candidates: &[LabelScore]) -> Result<Sentiment> {
    let best = candidates
        .iter()
        .filter(|c| c.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| anyhow!("classifier returned no labels"))?;
    let label: SentimentLabel = best.label.parse().map_err(|e: String| anyhow!(e))?;
    Ok(Sentiment::from_classification(label, best.score))
}

fn parse_response(body: InferenceResponse) -> Result<Sentiment> {
    match body {
        InferenceResponse::Nested(outer) => {
            top_label(outer.first().map(Vec::as_slice).unwrap_or_default())
        }
        InferenceResponse::Flat(labels) => top_label(&labels),
        InferenceResponse::Failed { error } => Err(anyhow!("inference endpoint: {error}")),
    }
}

#[async_trait]
impl SentimentScorer for TransformerScorer {
    fn name(&self) -> &'static str {
        "transformer"
    }

    async fn classify(&self, text: &str) -> Result<Sentiment> {
        let url = Url::parse(&self.endpoint)
            .with_context(|| format!("bad inference endpoint {:?}", self.endpoint))?;
        let payload = serde_json::json!({ "inputs": truncate_chars(text, self.max_chars) });

        let body: InferenceResponse = self
            .http
            .request_json(&url, |c| {
                let req = c.post(url.as_str()).json(&payload);
                match &self.api_token {
                    Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
                    None => req,
                }
            })
            .await?;
        parse_response(body)
    }
}
