//! FRED `series/observations` client.

use super::SeriesSource;
use super::cleaner::{parse_date, parse_value};
use super::http_client::HttpClient;
use crate::align::DateRange;
use crate::config::FredConfig;
use crate::models::Observation;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<RawObservation>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

pub struct FredClient {
    http: Arc<HttpClient>,
    base_url: String,
    api_key: String,
}

impl FredClient {
    pub fn new(config: &FredConfig, http: Arc<HttpClient>) -> Result<Self> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            bail!("FRED API key missing: set AAPL__FRED__API_KEY or fred.api_key");
        };
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn observations_url(&self, series_id: &str, range: DateRange) -> Result<Url> {
        let start = range.start().to_string();
        let end = range.end().to_string();
        Url::parse_with_params(
            &format!("{}/series/observations", self.base_url),
            &[
                ("series_id", series_id),
                ("api_key", self.api_key.as_str()),
                ("file_type", "json"),
                ("observation_start", start.as_str()),
                ("observation_end", end.as_str()),
            ],
        )
        .context("Failed to build FRED URL")
    }
}

/// Decode an observations payload. "." values are dropped; so are rows with
/// unreadable dates.
fn parse_observations(series_id: &str, body: ObservationsResponse) -> Result<Vec<Observation>> {
    if let Some(msg) = body.error_message {
        bail!("FRED rejected {}: {}", series_id, msg);
    }
    let mut out = Vec::with_capacity(body.observations.len());
    for raw in body.observations {
        let Some(date) = parse_date(&raw.date) else {
            warn!("{}: unreadable date {:?}", series_id, raw.date);
            continue;
        };
        if let Some(value) = parse_value(&raw.value) {
            out.push(Observation::new(date, value));
        }
    }
    out.sort_by_key(|o| o.date);
    Ok(out)
}

#[async_trait]
impl SeriesSource for FredClient {
    async fn fetch_series(&self, series_id: &str, range: DateRange) -> Result<Vec<Observation>> {
        let url = self.observations_url(series_id, range)?;
        let body: ObservationsResponse = self
            .http
            .get_json(&url)
            .await
            .with_context(|| format!("FRED fetch failed for {}", series_id))?;
        let obs = parse_observations(series_id, body)?;
        debug!("{}: {} observations", series_id, obs.len());
        Ok(obs)
    }
}
