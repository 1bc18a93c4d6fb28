//! Content Source - Item profiles from review text
//!
//! "Businesses people describe the same way are similar."
//!
//! ## Profile construction
//! 1. Item order is the first-seen order of the business metadata
//! 2. Each item's reviews are joined (input order, configurable separator)
//!    into one document; items without reviews get the empty document
//! 3. All documents go to the embedder in a single batch call
//! 4. All review texts go to the sentiment analyzer in a single batch call;
//!    each item gets the mean polarity of its reviews (0.0 if none)
//! 5. Profile = embedding ++ [mean polarity]
//!
//! Reviews of items missing from the metadata are ignored.

use crate::embedding::TextEmbedder;
use crate::error::{RecommendError, Result};
use crate::ranker;
use crate::sentiment::SentimentAnalyzer;
use crate::similarity::dense_cosine;
use crate::types::{Recommendation, RecommendationSource};
use data_loader::{Business, IdIndex, Review};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

pub const DEFAULT_SEPARATOR: &str = " ";

/// One fixed-length vector per item, in item order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProfiles {
    index: IdIndex,
    /// Length of every vector (embedding dimension + 1)
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl ItemProfiles {
    pub fn get(&self, item_id: &str) -> Option<&[f32]> {
        self.index
            .position(item_id)
            .map(|position| self.vectors[position].as_slice())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn item_ids(&self) -> &[String] {
        self.index.ids()
    }

    /// Items most similar to `item_id` by cosine of their profiles
    ///
    /// The query item itself is never returned; equal scores keep profile order.
    ///
    /// # Errors
    /// `UnknownItem` when the item has no profile.
    #[instrument(skip(self))]
    pub fn recommend_similar(&self, item_id: &str, top_n: usize) -> Result<Vec<Recommendation>> {
        let query = self
            .index
            .position(item_id)
            .ok_or_else(|| RecommendError::UnknownItem(item_id.to_string()))?;
        let target = &self.vectors[query];

        let scored: Vec<(usize, f64)> = self
            .vectors
            .iter()
            .enumerate()
            .filter(|(position, _)| *position != query)
            .map(|(position, vector)| (position, dense_cosine(target, vector) as f64))
            .collect();
        debug!("Compared against {} items", scored.len());

        Ok(ranker::top_n(scored, top_n)
            .into_iter()
            .filter_map(|(position, score)| {
                self.index
                    .id(position)
                    .map(|id| Recommendation::new(id, score, RecommendationSource::Content))
            })
            .collect())
    }
}

/// Fuses text embeddings and review sentiment into item profiles
#[derive(Clone)]
pub struct ContentProfileBuilder {
    embedder: Arc<dyn TextEmbedder>,
    sentiment: Arc<dyn SentimentAnalyzer>,
    separator: String,
}

impl ContentProfileBuilder {
    pub fn new(embedder: Arc<dyn TextEmbedder>, sentiment: Arc<dyn SentimentAnalyzer>) -> Self {
        Self {
            embedder,
            sentiment,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Build one profile per distinct business
    ///
    /// # Errors
    /// `Embedding` when the embedder returns the wrong number of vectors or
    /// vectors of differing length; `Sentiment` when the analyzer returns the
    /// wrong number of scores.
    pub fn build(&self, businesses: &[Business], reviews: &[Review]) -> Result<ItemProfiles> {
        let start = Instant::now();

        let mut index = IdIndex::new();
        for business in businesses {
            index.insert(&business.id);
        }

        // Group review texts by item position, keeping input order
        let mut texts: Vec<Vec<&str>> = vec![Vec::new(); index.len()];
        let mut ignored = 0usize;
        for review in reviews {
            match index.position(&review.item_id) {
                Some(position) => texts[position].push(review.text.as_str()),
                None => ignored += 1,
            }
        }
        if ignored > 0 {
            debug!("Ignored {} reviews of items without metadata", ignored);
        }

        let documents: Vec<String> = texts.iter().map(|t| t.join(&self.separator)).collect();
        let embeddings = self.embedder.embed(&documents)?;
        if embeddings.len() != documents.len() {
            return Err(RecommendError::Embedding(format!(
                "{} returned {} vectors for {} documents",
                self.embedder.name(),
                embeddings.len(),
                documents.len()
            )));
        }
        let embedding_dim = embeddings.first().map(Vec::len).unwrap_or(self.embedder.dimension());
        if let Some(bad) = embeddings.iter().position(|e| e.len() != embedding_dim) {
            return Err(RecommendError::Embedding(format!(
                "vector {} has length {}, expected {}",
                bad,
                embeddings[bad].len(),
                embedding_dim
            )));
        }

        let all_texts: Vec<&str> = texts.iter().flatten().copied().collect();
        let sentiments = self.sentiment.analyze_batch(&all_texts);
        if sentiments.len() != all_texts.len() {
            return Err(RecommendError::Sentiment(format!(
                "{} returned {} scores for {} reviews",
                self.sentiment.name(),
                sentiments.len(),
                all_texts.len()
            )));
        }

        let mut vectors = Vec::with_capacity(embeddings.len());
        let mut offset = 0;
        for (embedding, item_texts) in embeddings.into_iter().zip(&texts) {
            let count = item_texts.len();
            let mean_polarity = if count == 0 {
                0.0
            } else {
                let sum: f64 = sentiments[offset..offset + count]
                    .iter()
                    .map(|s| s.polarity)
                    .sum();
                sum / count as f64
            };
            offset += count;

            let mut vector = embedding;
            vector.push(mean_polarity as f32);
            vectors.push(vector);
        }

        info!(
            "Built {} item profiles ({} dims) with {} in {:?}",
            vectors.len(),
            embedding_dim + 1,
            self.embedder.name(),
            start.elapsed()
        );

        Ok(ItemProfiles {
            index,
            dimension: embedding_dim + 1,
            vectors,
        })
    }
}
