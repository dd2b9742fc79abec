//! Rule-based polarity scorer.
//!
//! Polarity is the mean score of the lexicon words found in the text. A
//! negator flips and halves the next polarity word; an intensifier scales it.

use super::{Sentiment, SentimentScorer};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

const POSITIVE: &[(&str, f64)] = &[
    ("good", 0.7),
    ("great", 0.8),
    ("excellent", 1.0),
    ("best", 1.0),
    ("better", 0.5),
    ("positive", 0.5),
    ("strong", 0.4),
    ("stronger", 0.5),
    ("gain", 0.5),
    ("gains", 0.5),
    ("growth", 0.5),
    ("grow", 0.4),
    ("growing", 0.4),
    ("profit", 0.5),
    ("profits", 0.5),
    ("profitable", 0.6),
    ("rise", 0.4),
    ("rises", 0.4),
    ("rising", 0.4),
    ("rally", 0.6),
    ("rallies", 0.6),
    ("surge", 0.6),
    ("surges", 0.6),
    ("soar", 0.7),
    ("soars", 0.7),
    ("record", 0.4),
    ("beat", 0.5),
    ("beats", 0.5),
    ("exceed", 0.5),
    ("exceeds", 0.5),
    ("outperform", 0.6),
    ("upgrade", 0.5),
    ("bullish", 0.7),
    ("optimistic", 0.6),
    ("confident", 0.5),
    ("recovery", 0.4),
    ("rebound", 0.4),
    ("improve", 0.4),
    ("improved", 0.4),
    ("success", 0.6),
    ("successful", 0.7),
    ("innovative", 0.5),
    ("robust", 0.5),
    ("healthy", 0.5),
    ("boost", 0.5),
    ("win", 0.6),
    ("happy", 0.8),
    ("love", 0.5),
    ("popular", 0.6),
    ("stable", 0.3),
];

const NEGATIVE: &[(&str, f64)] = &[
    ("bad", -0.7),
    ("worse", -0.6),
    ("worst", -1.0),
    ("poor", -0.5),
    ("negative", -0.5),
    ("weak", -0.4),
    ("weaker", -0.5),
    ("loss", -0.5),
    ("losses", -0.5),
    ("lose", -0.5),
    ("decline", -0.5),
    ("declines", -0.5),
    ("drop", -0.4),
    ("drops", -0.4),
    ("fall", -0.4),
    ("falls", -0.4),
    ("falling", -0.4),
    ("plunge", -0.7),
    ("plunges", -0.7),
    ("crash", -0.8),
    ("slump", -0.6),
    ("miss", -0.5),
    ("misses", -0.5),
    ("downgrade", -0.5),
    ("bearish", -0.7),
    ("pessimistic", -0.6),
    ("fear", -0.6),
    ("fears", -0.6),
    ("worry", -0.5),
    ("worries", -0.5),
    ("concern", -0.4),
    ("concerns", -0.4),
    ("risk", -0.3),
    ("risks", -0.3),
    ("uncertainty", -0.4),
    ("volatile", -0.3),
    ("recession", -0.7),
    ("inflation", -0.2),
    ("crisis", -0.8),
    ("lawsuit", -0.5),
    ("fraud", -0.9),
    ("fail", -0.6),
    ("failed", -0.6),
    ("failure", -0.7),
    ("cut", -0.3),
    ("cuts", -0.3),
    ("layoffs", -0.6),
    ("shortage", -0.5),
    ("disappointing", -0.7),
    ("terrible", -1.0),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "none", "cannot", "can't", "cant", "don't", "dont",
    "doesn't", "doesnt", "didn't", "didnt", "isn't", "isnt", "wasn't", "wasnt", "won't", "wont",
    "hardly", "barely",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("extremely", 1.5),
    ("highly", 1.3),
    ("really", 1.2),
    ("significantly", 1.3),
    ("sharply", 1.4),
    ("slightly", 0.5),
    ("somewhat", 0.7),
    ("marginally", 0.5),
];

/// Lexicon polarity scorer; deterministic and offline.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    words: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl LexiconScorer {
    pub fn new() -> Self {
        Self {
            words: POSITIVE.iter().chain(NEGATIVE).copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }

    /// Raw polarity in [-1, 1]; 0.0 when no lexicon word occurs.
    pub fn polarity(&self, text: &str) -> f64 {
        let mut matched = Vec::new();
        let mut negate = false;
        let mut boost = 1.0;

        for token in tokenize(text) {
            if NEGATORS.contains(&token.as_str()) {
                negate = true;
                continue;
            }
            if let Some(m) = self.intensifiers.get(token.as_str()) {
                boost = *m;
                continue;
            }
            if let Some(score) = self.words.get(token.as_str()) {
                let mut s = score * boost;
                if negate {
                    s *= -0.5;
                }
                matched.push(s);
                negate = false;
                boost = 1.0;
            }
        }

        if matched.is_empty() {
            return 0.0;
        }
        (matched.iter().sum::<f64>() / matched.len() as f64).clamp(-1.0, 1.0)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl SentimentScorer for LexiconScorer {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    async fn classify(&self, text: &str) -> Result<Sentiment> {
        Ok(Sentiment::from_polarity(self.polarity(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentLabel;

    #[test]
    fn test_polarity_signs() {
        let lex = LexiconScorer::new();
        assert!(lex.polarity("Apple posts record profits and strong growth") > 0.1);
        assert!(lex.polarity("Shares plunge as recession fears grow worse") < -0.1);
        assert_eq!(lex.polarity("The meeting is on Tuesday."), 0.0);
    }

    #[test]
    fn test_negation_and_intensifier() {
        let lex = LexiconScorer::new();
        assert!((lex.polarity("good") - 0.7).abs() < 1e-12);
        assert!((lex.polarity("not good") + 0.35).abs() < 1e-12);
        assert!((lex.polarity("very good") - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_classify_labels() {
        let lex = LexiconScorer::new();
        let s = tokio_test::block_on(lex.score("iPhone sales beat estimates, a great quarter"));
        assert_eq!(s.label, SentimentLabel::Positive);
        let s = tokio_test::block_on(lex.score("Quarterly filing released on Tuesday"));
        assert_eq!(s.label, SentimentLabel::Neutral);
    }
}
