//! Neighborhood Source - User-based Collaborative Filtering
//!
//! "Users whose ratings point the same way as yours also liked these items."
//!
//! ## Algorithm
//! 1. Look up the target user's row (unknown user is a recoverable error)
//! 2. Cosine similarity between the target row and every other row, over the
//!    full item dimensionality (items nobody in the pair rated count as zero)
//! 3. Rank other users by similarity (ties by row index) and keep the first
//!    `num_neighbors`
//! 4. Candidates: items rated by a neighbor and not by the target
//! 5. Score = Σ(sim × rating) / Σ(sim) over neighbors with positive similarity
//!    that rated the item; items whose denominator is not positive are dropped
//! 6. Top-N by score, ties by item index

use crate::error::{RecommendError, Result};
use crate::ranker;
use crate::similarity::cosine_with_norms;
use crate::types::{Recommendation, RecommendationSource};
use data_loader::InteractionMatrix;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default number of neighbors consulted per prediction
pub const DEFAULT_NUM_NEIGHBORS: usize = 10;

/// User-based collaborative filtering over a shared interaction matrix
#[derive(Debug, Clone)]
pub struct NeighborhoodCF {
    /// Shared reference to the matrix (read-only, so no Mutex needed)
    matrix: Arc<InteractionMatrix>,
}

impl NeighborhoodCF {
    pub fn new(matrix: Arc<InteractionMatrix>) -> Self {
        Self { matrix }
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    /// Recommend up to `top_n` unseen items for `user_id`
    ///
    /// # Errors
    /// `RecommendError::UnknownUser` when the user has no row. Zero neighbors
    /// or zero scorable candidates give an empty list, not an error.
    #[instrument(skip(self))]
    pub fn recommend(
        &self,
        user_id: &str,
        top_n: usize,
        num_neighbors: usize,
    ) -> Result<Vec<Recommendation>> {
        let target = self
            .matrix
            .user_index(user_id)
            .ok_or_else(|| RecommendError::UnknownUser(user_id.to_string()))?;

        if top_n == 0 || num_neighbors == 0 || self.matrix.row(target).is_empty() {
            return Ok(Vec::new());
        }

        let similarities = self.user_similarities(target);
        let neighbors = select_neighbors(target, &similarities, num_neighbors);
        debug!("Selected {} neighbors", neighbors.len());

        let predicted = self.predict_scores(target, &neighbors);
        debug!("Scored {} candidate items", predicted.len());

        let recommendations = ranker::top_n(predicted, top_n)
            .into_iter()
            .filter_map(|(item_index, score)| {
                self.matrix
                    .item_id(item_index)
                    .map(|id| Recommendation::new(id, score, RecommendationSource::Neighborhood))
            })
            .collect();
        Ok(recommendations)
    }

    /// Cosine similarity of `target` to every row, indexed by row
    ///
    /// The entry at `target` itself is included (it is 1.0 for any rated user)
    /// and is ignored by neighbor selection.
    pub fn user_similarities(&self, target: usize) -> Vec<f64> {
        let target_row = self.matrix.row(target);
        let target_norm = target_row.norm();

        (0..self.matrix.num_users())
            .into_par_iter()
            .map(|other| {
                let row = self.matrix.row(other);
                cosine_with_norms(target_row.dot(&row), target_norm, row.norm())
            })
            .collect()
    }

    /// Similarity-weighted average rating for every candidate item
    ///
    /// Returned in ascending item index, which is the ranker's tie-break.
    fn predict_scores(&self, target: usize, neighbors: &[(usize, f64)]) -> Vec<(usize, f64)> {
        let target_row = self.matrix.row(target);
        // item -> (Σ sim × rating, Σ sim)
        let mut sums: BTreeMap<usize, (f64, f64)> = BTreeMap::new();

        for &(neighbor, similarity) in neighbors {
            if similarity <= 0.0 {
                continue;
            }
            for (item, rating) in self.matrix.row(neighbor).iter() {
                if target_row.contains(item) {
                    continue;
                }
                let entry = sums.entry(item).or_insert((0.0, 0.0));
                entry.0 += similarity * rating;
                entry.1 += similarity;
            }
        }

        sums.into_iter()
            .filter(|(_, (_, denominator))| *denominator > 0.0)
            .map(|(item, (numerator, denominator))| (item, numerator / denominator))
            .collect()
    }
}

/// Other users by similarity descending, ties by row index ascending
fn select_neighbors(target: usize, similarities: &[f64], num_neighbors: usize) -> Vec<(usize, f64)> {
    let others: Vec<(usize, f64)> = similarities
        .iter()
        .copied()
        .enumerate()
        .filter(|(index, _)| *index != target)
        .collect();
    ranker::top_n(others, num_neighbors)
}
