//! Shared output types for all recommendation sources.

use data_loader::ItemId;
use serde::{Deserialize, Serialize};

/// Which algorithm produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationSource {
    /// Item-to-item similarity of text + sentiment profiles
    Content,
    /// User-based neighborhood collaborative filtering
    Neighborhood,
    /// Truncated-SVD latent factors
    LatentFactor,
}

/// One ranked item with the score it was ranked by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: ItemId,
    pub score: f64,
    pub source: RecommendationSource,
}

impl Recommendation {
    pub fn new(item_id: impl Into<ItemId>, score: f64, source: RecommendationSource) -> Self {
        Self {
            item_id: item_id.into(),
            score,
            source,
        }
    }
}
