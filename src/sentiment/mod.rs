//! Text sentiment scoring.
//!
//! Two strategies share one output shape ([`Sentiment`]: signed score plus
//! label) so everything downstream is indifferent to which one produced a
//! record. [`calibrate`] maps one strategy's scale onto the other's.

pub mod calibrate;
pub mod lexicon;
pub mod transformer;

use crate::align::DateRange;
use crate::align::scale::clamp_unit;
use crate::config::SentimentConfig;
use crate::frame::{DailyTable, FrameError};
use crate::models::{SentimentLabel, SentimentRecord};
use crate::sources::http_client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

pub use self::lexicon::LexiconScorer;
pub use self::transformer::TransformerScorer;

/// Polarity above which text is Positive (and below whose negation, Negative).
pub const LABEL_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    /// Signed score in [-1, 1].
    pub score: f64,
    pub label: SentimentLabel,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
        }
    }

    /// Label a signed polarity with the fixed ±0.1 thresholds.
    pub fn from_polarity(polarity: f64) -> Self {
        if !polarity.is_finite() {
            return Self::neutral();
        }
        let score = clamp_unit(polarity);
        let label = if score > LABEL_THRESHOLD {
            SentimentLabel::Positive
        } else if score < -LABEL_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        Self { score, label }
    }

    /// Turn a classifier's (label, confidence) into a signed score: the
    /// negative class negates the confidence, neutral is zero.
    pub fn from_classification(label: SentimentLabel, confidence: f64) -> Self {
        let c = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let score = match label {
            SentimentLabel::Positive => c,
            SentimentLabel::Negative => -c,
            SentimentLabel::Neutral => 0.0,
        };
        Self { score, label }
    }
}

// ── Scorer trait ──────────────────────────────────────────────────────────────

/// Swappable scoring strategy.
#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, text: &str) -> Result<Sentiment>;

    /// Never fails: empty or unscorable text is neutral.
    async fn score(&self, text: &str) -> Sentiment {
        if text.trim().is_empty() {
            return Sentiment::neutral();
        }
        match self.classify(text).await {
            Ok(s) => s,
            Err(e) => {
                warn!("{} scorer failed, using neutral: {:#}", self.name(), e);
                Sentiment::neutral()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    #[default]
    Lexicon,
    Transformer,
}

pub fn build_scorer(
    kind: ScorerKind,
    config: &SentimentConfig,
    http: Arc<HttpClient>,
) -> Arc<dyn SentimentScorer> {
    match kind {
        ScorerKind::Lexicon => Arc::new(LexiconScorer::new()),
        ScorerKind::Transformer => Arc::new(TransformerScorer::new(config, http)),
    }
}

// ── Daily aggregation ─────────────────────────────────────────────────────────

/// Mean score per calendar day of `range` in a single column. Days with no
/// records are neutral (0.0).
pub fn daily_mean(
    records: &[SentimentRecord],
    range: DateRange,
    column: &str,
) -> Result<DailyTable, FrameError> {
    let mut sums: BTreeMap<chrono::NaiveDate, (f64, usize)> = BTreeMap::new();
    for r in records {
        if range.contains(r.date) && r.score.is_finite() {
            let e = sums.entry(r.date).or_default();
            e.0 += r.score;
            e.1 += 1;
        }
    }
    let mut table = DailyTable::from_range(range);
    let values = range
        .days()
        .map(|d| {
            let mean = sums.get(&d).map(|(s, n)| s / *n as f64).unwrap_or(0.0);
            Some(mean)
        })
        .collect();
    table.add_column(column, values)?;
    Ok(table)
}
