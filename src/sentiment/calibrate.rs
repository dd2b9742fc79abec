//! Linear calibration of one scorer's output onto another's scale.
//!
//! Records scored by both strategies are paired on `(date, title)` and a
//! least-squares line `reference ≈ slope * target + intercept` is fitted.

use super::Sentiment;
use crate::models::SentimentRecord;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CalibrationError {
    #[error("need at least 2 paired records to calibrate, found {0}")]
    TooFewPairs(usize),

    #[error("target scores have no variance; the fit is undefined")]
    Degenerate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
    pub pairs: usize,
}

fn pair_key(r: &SentimentRecord) -> Option<(NaiveDate, String)> {
    let title = r.title.as_deref()?.trim().to_lowercase();
    if title.is_empty() || !r.score.is_finite() {
        return None;
    }
    Some((r.date, title))
}

impl Calibration {
    pub fn fit(
        reference: &[SentimentRecord],
        target: &[SentimentRecord],
    ) -> Result<Self, CalibrationError> {
        let by_key: HashMap<(NaiveDate, String), f64> = reference
            .iter()
            .filter_map(|r| Some((pair_key(r)?, r.score)))
            .collect();

        let pairs: Vec<(f64, f64)> = target
            .iter()
            .filter_map(|t| {
                let y = *by_key.get(&pair_key(t)?)?;
                Some((t.score, y))
            })
            .collect();

        let n = pairs.len();
        if n < 2 {
            return Err(CalibrationError::TooFewPairs(n));
        }
        let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n as f64;
        let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n as f64;
        let sxx: f64 = pairs.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
        let sxy: f64 = pairs.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
        if sxx.abs() < f64::EPSILON {
            return Err(CalibrationError::Degenerate);
        }
        let slope = sxy / sxx;
        Ok(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            pairs: n,
        })
    }

    /// Calibrated score, clamped and relabelled.
    pub fn apply(&self, score: f64) -> Sentiment {
        Sentiment::from_polarity(self.slope * score + self.intercept)
    }

    /// Calibrate every real record; placeholders stay neutral.
    pub fn apply_all(&self, records: &[SentimentRecord]) -> Vec<SentimentRecord> {
        records
            .iter()
            .map(|r| {
                if r.is_placeholder() {
                    return r.clone();
                }
                let s = self.apply(r.score);
                SentimentRecord {
                    score: s.score,
                    sentiment: s.label,
                    ..r.clone()
                }
            })
            .collect()
    }
}
