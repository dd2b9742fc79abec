use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::sources::cleaner::parse_date;

// ── Series observations ───────────────────────────────────────────────────────

/// One observed value of a named indicator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// How an indicator's gaps are filled once it sits on a daily calendar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorClass {
    /// Prices: time-weighted linear, nearest value at the edges.
    Price,
    /// Sentiment proxies: linear, then a centred 7-day mean.
    Indicator,
    /// Quarterly or irregular releases: quadratic, then forward fill.
    Quarterly,
}

impl fmt::Display for IndicatorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndicatorClass::Price => "price",
            IndicatorClass::Indicator => "indicator",
            IndicatorClass::Quarterly => "quarterly",
        };
        f.write_str(s)
    }
}

// ── Equity daily bar ──────────────────────────────────────────────────────────

/// Daily OHLCV bar. Accepts both our JSON-lines layout and the
/// `orient="records"` export with capitalised keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceBar {
    #[serde(alias = "Date", deserialize_with = "flexible_date")]
    pub date: NaiveDate,
    #[serde(alias = "Open")]
    pub open: f64,
    #[serde(alias = "High")]
    pub high: f64,
    #[serde(alias = "Low")]
    pub low: f64,
    #[serde(alias = "Close")]
    pub close: f64,
    #[serde(alias = "Volume", default)]
    pub volume: f64,
}

impl PriceBar {
    /// Open→close move in percent.
    pub fn percent_diff(&self) -> Option<f64> {
        if self.open == 0.0 {
            return None;
        }
        Some((self.close - self.open) / self.open * 100.0)
    }
}

fn flexible_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("unparseable date {raw:?}")))
}

// ── News / social records ─────────────────────────────────────────────────────

/// Article metadata as returned by the news search API.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleRef {
    pub url: String,
    pub title: String,
    pub seen_date: NaiveDate,
    pub language: Option<String>,
}

/// A single Reddit submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RedditPost {
    pub subreddit: String,
    pub date: NaiveDate,
    pub title: String,
    pub selftext: String,
}

impl RedditPost {
    /// Title and body joined, the text that gets scored.
    pub fn text(&self) -> String {
        if self.selftext.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.title, self.selftext)
        }
    }
}

// ── Sentiment ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SentimentLabel {
    #[serde(alias = "positive", alias = "POSITIVE")]
    Positive,
    #[serde(alias = "neutral", alias = "NEUTRAL")]
    Neutral,
    #[serde(alias = "negative", alias = "NEGATIVE")]
    Negative,
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::Negative => "Negative",
        };
        f.write_str(s)
    }
}

impl FromStr for SentimentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "neutral" => Ok(SentimentLabel::Neutral),
            "negative" => Ok(SentimentLabel::Negative),
            other => Err(format!("unknown sentiment label {other:?}")),
        }
    }
}

/// One scored article or post. Column names follow the flat files the
/// downstream stages already consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentimentRecord {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Score")]
    pub score: f64,
    #[serde(rename = "Sentiment")]
    pub sentiment: SentimentLabel,
    #[serde(rename = "language", alias = "Language")]
    pub language: Option<String>,
}

impl SentimentRecord {
    /// Neutral filler row used when a day has too few scored articles.
    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            date,
            title: None,
            score: 0.0,
            sentiment: SentimentLabel::Neutral,
            language: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.title.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_bar_accepts_records_export() {
        let json = r#"{"Open":74.06,"High":75.15,"Low":73.8,"Close":75.09,"Volume":135480400,"Dividends":0.0,"Splits":null,"Date":"2020-01-02T00:00:00.000"}"#;
        let bar: PriceBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2020, 1, 2).unwrap());
        assert_eq!(bar.close, 75.09);
        assert_eq!(bar.volume, 135_480_400.0);
    }

    #[test]
    fn test_percent_diff() {
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            open: 100.0,
            high: 112.0,
            low: 99.0,
            close: 110.0,
            volume: 0.0,
        };
        assert!((bar.percent_diff().unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("positive".parse::<SentimentLabel>(), Ok(SentimentLabel::Positive));
        assert_eq!(" Negative ".parse::<SentimentLabel>(), Ok(SentimentLabel::Negative));
        assert!("bullish".parse::<SentimentLabel>().is_err());
    }

    #[test]
    fn test_record_csv_header_names() {
        let mut wtr = csv::Writer::from_writer(vec![]);
        wtr.serialize(SentimentRecord::placeholder(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
        ))
        .unwrap();
        let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
        assert!(out.starts_with("Date,Title,Score,Sentiment,language\n"));
        assert!(out.contains("2020-01-01,,0.0,Neutral,"));
    }
}
