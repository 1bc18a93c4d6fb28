//! Sentiment collaborator.
//!
//! `SentimentAnalyzer` maps text to a polarity in [-1, 1] (negative to
//! positive) and a subjectivity in [0, 1]. The built-in `LexiconSentiment`
//! averages word scores from a small review-oriented lexicon, with simple
//! handling of negations ("not good") and intensifiers ("very good").

use crate::embedding::tokenize;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
}

impl Sentiment {
    pub const NEUTRAL: Sentiment = Sentiment {
        polarity: 0.0,
        subjectivity: 0.0,
    };
}

pub trait SentimentAnalyzer: Send + Sync {
    /// Identifies the scorer in cache keys and logs
    fn name(&self) -> &str;

    fn analyze(&self, text: &str) -> Sentiment;

    /// Score many texts, preserving order
    fn analyze_batch(&self, texts: &[&str]) -> Vec<Sentiment> {
        texts.par_iter().map(|text| self.analyze(text)).collect()
    }
}

/// (word, polarity, subjectivity)
const LEXICON: &[(&str, f64, f64)] = &[
    ("amazing", 0.6, 0.9),
    ("awesome", 1.0, 1.0),
    ("awful", -1.0, 1.0),
    ("bad", -0.7, 0.67),
    ("best", 1.0, 0.3),
    ("bland", -0.5, 0.6),
    ("clean", 0.37, 0.69),
    ("cold", -0.6, 1.0),
    ("delicious", 1.0, 1.0),
    ("dirty", -0.6, 0.8),
    ("disappointing", -0.6, 0.7),
    ("excellent", 1.0, 1.0),
    ("fantastic", 0.4, 0.9),
    ("fresh", 0.3, 0.5),
    ("friendly", 0.38, 0.5),
    ("good", 0.7, 0.6),
    ("great", 0.8, 0.75),
    ("horrible", -1.0, 1.0),
    ("love", 0.5, 0.6),
    ("mediocre", -0.3, 0.6),
    ("nice", 0.6, 1.0),
    ("perfect", 1.0, 1.0),
    ("poor", -0.4, 0.6),
    ("rude", -0.3, 0.6),
    ("slow", -0.3, 0.4),
    ("tasty", 0.5, 0.5),
    ("terrible", -1.0, 1.0),
    ("worst", -1.0, 1.0),
    ("wonderful", 1.0, 1.0),
];

const NEGATIONS: &[&str] = &["not", "no", "never", "don't", "didn't", "isn't", "wasn't", "won't"];

/// (word, multiplier)
const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("extremely", 1.5),
    ("super", 1.3),
    ("so", 1.2),
    ("quite", 1.1),
    ("somewhat", 0.7),
    ("slightly", 0.5),
];

/// A negation flips words up to this many tokens after it
const NEGATION_WINDOW: usize = 3;

/// Polarity factor for a negated word
const NEGATION_FACTOR: f64 = -0.5;

/// Lexicon-based polarity and subjectivity scorer
#[derive(Debug, Clone)]
pub struct LexiconSentiment {
    lexicon: HashMap<&'static str, (f64, f64)>,
    intensifiers: HashMap<&'static str, f64>,
}

impl LexiconSentiment {
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().map(|&(w, p, s)| (w, (p, s))).collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }
}

impl Default for LexiconSentiment {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn analyze(&self, text: &str) -> Sentiment {
        let mut polarities = Vec::new();
        let mut subjectivities = Vec::new();
        let mut negation_left = 0usize;
        let mut intensity = 1.0;

        for token in tokenize(text) {
            let word = token.as_str();
            if NEGATIONS.contains(&word) {
                negation_left = NEGATION_WINDOW;
                continue;
            }
            if let Some(&factor) = self.intensifiers.get(word) {
                intensity *= factor;
                continue;
            }

            if let Some(&(polarity, subjectivity)) = self.lexicon.get(word) {
                let mut score = polarity * intensity;
                if negation_left > 0 {
                    score *= NEGATION_FACTOR;
                }
                polarities.push(score);
                subjectivities.push((subjectivity * intensity).min(1.0));
                negation_left = 0;
            } else {
                negation_left = negation_left.saturating_sub(1);
            }
            intensity = 1.0;
        }

        if polarities.is_empty() {
            return Sentiment::NEUTRAL;
        }
        let n = polarities.len() as f64;
        Sentiment {
            polarity: (polarities.iter().sum::<f64>() / n).clamp(-1.0, 1.0),
            subjectivity: (subjectivities.iter().sum::<f64>() / n).clamp(0.0, 1.0),
        }
    }
}
