//! Latent Factor Source - Truncated SVD
//!
//! Factorizes the interaction matrix A (users × items) into
//! `user_factors` = U·Σ (users × k) and `item_factors` = Vᵀ (k × items), so a
//! user's predicted affinity for an item is a single dot product.
//!
//! ## Algorithm (randomized range finder)
//! 1. Draw a seeded uniform test matrix Ω (items × l), l = k + oversamples
//! 2. Q = orth(A·Ω), refined by `n_power_iterations` rounds of
//!    Q = orth(A·orth(Aᵀ·Q))
//! 3. B = Qᵀ·A is small (l × items); eigen-decompose B·Bᵀ = W·Λ·Wᵀ
//! 4. σ = √λ, Vᵀ = Σ⁻¹·Wᵀ·B, U·Σ = Q·W·Σ, keeping the top k components
//! 5. Flip signs so the largest-magnitude entry of every Vᵀ row is positive
//!
//! The RNG is `StdRng` seeded from the config, and every kernel is
//! order-deterministic, so the same matrix and config give bit-identical
//! factors.

use crate::error::{RecommendError, Result};
use crate::linalg::{orthonormalize_columns, sparse_dot, sparse_t_dot, symmetric_eigen};
use crate::ranker;
use crate::types::{Recommendation, RecommendationSource};
use data_loader::InteractionMatrix;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument};

pub const DEFAULT_N_FACTORS: usize = 20;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_OVERSAMPLES: usize = 10;
pub const DEFAULT_POWER_ITERATIONS: usize = 5;

/// Singular values at or below this are treated as zero
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Training parameters for [`LatentFactorModel::train`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvdConfig {
    pub n_factors: usize,
    pub seed: u64,
    pub n_oversamples: usize,
    pub n_power_iterations: usize,
}

impl Default for SvdConfig {
    fn default() -> Self {
        Self {
            n_factors: DEFAULT_N_FACTORS,
            seed: DEFAULT_SEED,
            n_oversamples: DEFAULT_OVERSAMPLES,
            n_power_iterations: DEFAULT_POWER_ITERATIONS,
        }
    }
}

impl SvdConfig {
    pub fn with_n_factors(mut self, n_factors: usize) -> Self {
        self.n_factors = n_factors;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_oversamples(mut self, n_oversamples: usize) -> Self {
        self.n_oversamples = n_oversamples;
        self
    }

    pub fn with_power_iterations(mut self, n_power_iterations: usize) -> Self {
        self.n_power_iterations = n_power_iterations;
        self
    }
}

/// A trained truncated-SVD model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentFactorModel {
    config: SvdConfig,
    /// U·Σ, one row per user
    user_factors: Array2<f64>,
    singular_values: Array1<f64>,
    /// Vᵀ, one column per item
    item_factors: Array2<f64>,
}

impl LatentFactorModel {
    /// Factorize `matrix` into `config.n_factors` components
    ///
    /// # Errors
    /// `InvalidParameter` unless `1 <= n_factors < min(users, items)`.
    #[instrument(skip(matrix, config), fields(n_factors = config.n_factors, seed = config.seed))]
    pub fn train(matrix: &InteractionMatrix, config: &SvdConfig) -> Result<Self> {
        let (num_users, num_items) = matrix.shape();
        let k = config.n_factors;
        let smaller = num_users.min(num_items);
        if k == 0 || k >= smaller {
            return Err(RecommendError::invalid_parameter(
                "n_factors",
                format!(
                    "must satisfy 1 <= n_factors < min(users, items) = {}, got {}",
                    smaller, k
                ),
            ));
        }

        let start = Instant::now();
        let width = (k + config.n_oversamples).min(smaller);

        let mut rng = StdRng::seed_from_u64(config.seed);
        let omega = Array2::from_shape_simple_fn((num_items, width), || {
            rng.random_range(-1.0..1.0)
        });

        let mut q = orthonormalize_columns(sparse_dot(matrix, &omega));
        for _ in 0..config.n_power_iterations {
            let z = orthonormalize_columns(sparse_t_dot(matrix, &q));
            q = orthonormalize_columns(sparse_dot(matrix, &z));
        }
        debug!("Range basis: {} users x {} columns", q.nrows(), q.ncols());

        // B = Qᵀ A, stored as its transpose (items × width)
        let b_t = sparse_t_dot(matrix, &q);
        let b = b_t.t();
        let gram = b.dot(&b_t);
        let (eigenvalues, eigenvectors) = symmetric_eigen(&gram);

        let mut singular_values = Array1::<f64>::zeros(k);
        let mut item_factors = Array2::<f64>::zeros((k, num_items));
        let mut user_factors = Array2::<f64>::zeros((num_users, k));

        for j in 0..k {
            let sigma = eigenvalues[j].max(0.0).sqrt();
            if sigma <= SINGULAR_TOLERANCE {
                continue;
            }
            let w = eigenvectors.column(j);
            singular_values[j] = sigma;

            let mut v_row = b_t.dot(&w);
            v_row.mapv_inplace(|x| x / sigma);
            let mut u_col = q.dot(&w);
            u_col.mapv_inplace(|x| x * sigma);

            if dominant_entry_is_negative(&v_row) {
                v_row.mapv_inplace(|x| -x);
                u_col.mapv_inplace(|x| -x);
            }
            item_factors.row_mut(j).assign(&v_row);
            user_factors.column_mut(j).assign(&u_col);
        }

        info!(
            "Trained {} latent factors for {} users x {} items in {:?}",
            k,
            num_users,
            num_items,
            start.elapsed()
        );

        Ok(Self {
            config: config.clone(),
            user_factors,
            singular_values,
            item_factors,
        })
    }

    /// Recommend up to `top_n` items the user has not rated, by predicted score
    ///
    /// # Errors
    /// `UnknownUser` when the user has no row; `InvalidParameter` when the
    /// model was trained on a matrix of a different shape.
    #[instrument(skip(self, matrix))]
    pub fn recommend(
        &self,
        matrix: &InteractionMatrix,
        user_id: &str,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let (users, items) = self.shape();
        if matrix.shape() != (users, items) {
            return Err(RecommendError::invalid_parameter(
                "matrix",
                format!(
                    "model was trained on {}x{}, matrix is {}x{}",
                    users,
                    items,
                    matrix.num_users(),
                    matrix.num_items()
                ),
            ));
        }
        let u = matrix
            .user_index(user_id)
            .ok_or_else(|| RecommendError::UnknownUser(user_id.to_string()))?;

        let rated = matrix.row(u);
        let scores = self.predict_row(u);
        let candidates: Vec<(usize, f64)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| !rated.contains(*i))
            .collect();
        debug!("Scored {} unrated items", candidates.len());

        Ok(ranker::top_n(candidates, top_n)
            .into_iter()
            .filter_map(|(i, score)| {
                matrix
                    .item_id(i)
                    .map(|id| Recommendation::new(id, score, RecommendationSource::LatentFactor))
            })
            .collect())
    }

    /// Reconstructed rating of one cell
    ///
    /// # Panics
    /// If `user_index` or `item_index` is outside [`shape`](Self::shape).
    pub fn predict(&self, user_index: usize, item_index: usize) -> f64 {
        self.user_factors
            .row(user_index)
            .dot(&self.item_factors.column(item_index))
    }

    /// Reconstructed ratings of every item for one user
    ///
    /// # Panics
    /// If `user_index` is outside [`shape`](Self::shape).
    pub fn predict_row(&self, user_index: usize) -> Array1<f64> {
        self.user_factors.row(user_index).dot(&self.item_factors)
    }

    /// (users, items) this model was trained on
    pub fn shape(&self) -> (usize, usize) {
        (self.user_factors.nrows(), self.item_factors.ncols())
    }

    pub fn n_factors(&self) -> usize {
        self.singular_values.len()
    }

    /// Singular values, descending
    pub fn singular_values(&self) -> &Array1<f64> {
        &self.singular_values
    }

    pub fn user_factors(&self) -> &Array2<f64> {
        &self.user_factors
    }

    pub fn item_factors(&self) -> &Array2<f64> {
        &self.item_factors
    }

    pub fn config(&self) -> &SvdConfig {
        &self.config
    }

    /// Cache key for a model trained on the ratings with this fingerprint
    ///
    /// Every `SvdConfig` field changes the factors, so every field is part
    /// of the key.
    pub fn cache_key(fingerprint: &str, config: &SvdConfig) -> String {
        format!(
            "svd_model-{}-f{}-s{}-o{}-p{}",
            fingerprint,
            config.n_factors,
            config.seed,
            config.n_oversamples,
            config.n_power_iterations
        )
    }

    /// Fraction of the squared Frobenius norm of `matrix` that the kept
    /// components explain
    pub fn explained_energy(&self, matrix: &InteractionMatrix) -> f64 {
        let total: f64 = matrix.iter().map(|(_, _, r)| r * r).sum();
        if total == 0.0 {
            return 0.0;
        }
        self.singular_values.iter().map(|s| s * s).sum::<f64>() / total
    }
}

/// Whether the first entry of largest magnitude is negative
fn dominant_entry_is_negative(row: &Array1<f64>) -> bool {
    let mut best = 0.0f64;
    for &value in row {
        if value.abs() > best.abs() {
            best = value;
        }
    }
    best < 0.0
}
