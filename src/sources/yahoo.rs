//! Daily bars from Yahoo's v8 chart API.

use super::PriceSource;
use super::http_client::HttpClient;
use crate::align::DateRange;
use crate::config::YahooConfig;
use crate::models::PriceBar;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooClient {
    http: Arc<HttpClient>,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &YahooConfig, http: Arc<HttpClient>) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chart_url(&self, symbol: &str, range: DateRange) -> Result<Url> {
        let start_ts = range.start().and_hms_opt(0, 0, 0).map(|t| t.and_utc().timestamp());
        let end_ts = range.end().and_hms_opt(23, 59, 59).map(|t| t.and_utc().timestamp());
        let (Some(p1), Some(p2)) = (start_ts, end_ts) else {
            bail!("date range {:?} out of timestamp range", range);
        };
        Url::parse_with_params(
            &format!("{}/{}", self.base_url, symbol),
            &[
                ("period1", p1.to_string()),
                ("period2", p2.to_string()),
                ("interval", "1d".to_string()),
            ],
        )
        .context("Failed to build chart URL")
    }
}

/// Bars from a chart payload; days where the close is absent are skipped.
fn parse_chart(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>> {
    let data = match (resp.chart.result, resp.chart.error) {
        (_, Some(err)) => bail!("{}: {} ({})", symbol, err.code, err.description),
        (Some(result), None) => result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{}: empty chart result", symbol))?,
        (None, None) => bail!("{}: chart has neither result nor error", symbol),
    };

    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("{}: no quote data", symbol))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(date) = chrono::DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()) else {
            continue;
        };
        let Some(close) = quote.close.get(i).copied().flatten() else {
            continue;
        };
        let pick = |v: &[Option<f64>]| v.get(i).copied().flatten().unwrap_or(close);
        bars.push(PriceBar {
            date,
            open: pick(&quote.open),
            high: pick(&quote.high),
            low: pick(&quote.low),
            close,
            volume: quote.volume.get(i).copied().flatten().unwrap_or(0.0),
        });
    }
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

#[async_trait]
impl PriceSource for YahooClient {
    async fn fetch_bars(&self, symbol: &str, range: DateRange) -> Result<Vec<PriceBar>> {
        let url = self.chart_url(symbol, range)?;
        let resp: ChartResponse = self
            .http
            .get_json(&url)
            .await
            .with_context(|| format!("chart fetch failed for {}", symbol))?;
        let bars = parse_chart(symbol, resp)?;
        debug!("{}: {} bars", symbol, bars.len());
        Ok(bars)
    }
}
