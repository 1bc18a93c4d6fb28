//! Text embedding collaborator.
//!
//! The content builder only needs "documents in, equally long vectors out";
//! `TextEmbedder` is that seam. `HashingEmbedder` is the built-in
//! implementation: a bag-of-words feature hasher that needs no model files.

use crate::error::{RecommendError, Result};
use rayon::prelude::*;

/// Dimension of the sentence-transformer embeddings the pipeline was sized for
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Turns documents into fixed-length vectors
///
/// Implementations must preserve input order, return one vector per input,
/// give every vector length `dimension()`, and be deterministic.
pub trait TextEmbedder: Send + Sync {
    /// Short identifier used in logs and cache keys
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed(&self, documents: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Feature-hashing embedder
///
/// Each lowercase alphanumeric token is hashed (djb2) into one of
/// `dimension` buckets with a hash-derived sign, then the vector is L2
/// normalized. The empty document maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RecommendError::invalid_parameter(
                "dimension",
                "embedding dimension must be at least 1",
            ));
        }
        Ok(Self { dimension })
    }

    /// Embed a single document
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let hash = hash_token(&token);
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimension: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl TextEmbedder for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, documents: &[String]) -> Result<Vec<Vec<f32>>> {
        // par_iter().map().collect() keeps input order
        Ok(documents.par_iter().map(|doc| self.embed_one(doc)).collect())
    }
}

/// Lowercased runs of alphanumeric characters (apostrophes kept inside words)
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|word| word.trim_matches('\'').to_lowercase())
        .filter(|word| !word.is_empty())
}

/// djb2 string hash
fn hash_token(token: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in token.bytes() {
        hash = (hash << 5).wrapping_add(hash).wrapping_add(byte as u64);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}
