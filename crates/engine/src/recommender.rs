//! # Recommender
//!
//! The query interface the CLI talks to. It owns one batch snapshot of the
//! data and lazily builds (or restores from the cache) whatever each
//! recommender needs:
//! - the interaction matrix, built eagerly at construction
//! - item profiles, on the first content query
//! - one SVD model per `n_factors`, on the first latent-factor query with it
//!
//! Unknown users and items are not failures here: they are logged and the
//! query answers with an empty list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{info, instrument, warn};

use cache::{CacheBackend, ComputeCache};
use data_loader::{
    fingerprint_content, fingerprint_ratings, Dataset, InteractionMatrix, ItemId,
};
use sources::{
    ContentProfileBuilder, HashingEmbedder, ItemProfiles, LatentFactorModel, LexiconSentiment,
    NeighborhoodCF, Recommendation, RecommendError, SentimentAnalyzer, TextEmbedder,
};

use crate::config::EngineConfig;

/// One trained model per factor count; training holds only its own slot
type ModelSlot = Arc<Mutex<Option<Arc<LatentFactorModel>>>>;

/// Query facade over the three recommendation sources
pub struct Recommender {
    config: EngineConfig,
    cache: CacheBackend,
    dataset: Arc<Dataset>,
    /// SHA-256 of the rating snapshot, part of every collaborative cache key
    fingerprint: String,
    matrix: Arc<InteractionMatrix>,
    neighborhood: NeighborhoodCF,
    profile_builder: ContentProfileBuilder,
    embedder_name: String,
    embedding_dim: usize,
    sentiment_name: String,
    profiles: Mutex<Option<Arc<ItemProfiles>>>,
    svd_models: Mutex<HashMap<usize, ModelSlot>>,
}

impl Recommender {
    /// Create a recommender with the built-in embedder and sentiment analyzer
    pub fn new(dataset: Dataset, config: EngineConfig, cache: CacheBackend) -> Result<Self> {
        let embedder = HashingEmbedder::new(config.content.embedding_dim)
            .context("Failed to create text embedder")?;
        Self::with_collaborators(
            dataset,
            config,
            cache,
            Arc::new(embedder),
            Arc::new(LexiconSentiment::new()),
        )
    }

    /// Create a recommender with injected text collaborators
    ///
    /// Builds (or restores) the interaction matrix right away; a malformed
    /// rating aborts construction.
    pub fn with_collaborators(
        dataset: Dataset,
        config: EngineConfig,
        cache: CacheBackend,
        embedder: Arc<dyn TextEmbedder>,
        sentiment: Arc<dyn SentimentAnalyzer>,
    ) -> Result<Self> {
        let start = Instant::now();
        let fingerprint = fingerprint_ratings(&dataset.ratings);

        let key = format!("interaction_matrix-{}", fingerprint);
        let matrix: InteractionMatrix = cache.compute_or_fetch(&key, || {
            InteractionMatrix::build(&dataset.ratings).context("Failed to build interaction matrix")
        })?;
        let (users, items) = matrix.shape();
        info!(
            "Interaction matrix ready: {} users x {} items, {} ratings ({:?})",
            users,
            items,
            matrix.nnz(),
            start.elapsed()
        );

        let matrix = Arc::new(matrix);
        let embedder_name = embedder.name().to_string();
        let embedding_dim = embedder.dimension();
        let sentiment_name = sentiment.name().to_string();
        let profile_builder = ContentProfileBuilder::new(embedder, sentiment)
            .with_separator(config.content.separator.clone());

        Ok(Self {
            neighborhood: NeighborhoodCF::new(matrix.clone()),
            config,
            cache,
            dataset: Arc::new(dataset),
            fingerprint,
            matrix,
            profile_builder,
            embedder_name,
            embedding_dim,
            sentiment_name,
            profiles: Mutex::new(None),
            svd_models: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    /// Items most similar to `item_id` by content profile
    pub fn recommend_content(&self, item_id: &str, top_n: usize) -> Result<Vec<ItemId>> {
        Ok(ids(self.recommend_content_scored(item_id, top_n)?))
    }

    #[instrument(skip(self))]
    pub fn recommend_content_scored(
        &self,
        item_id: &str,
        top_n: usize,
    ) -> Result<Vec<Recommendation>> {
        let profiles = self.item_profiles()?;
        recover(profiles.recommend_similar(item_id, top_n))
    }

    /// Unseen items for `user_id` by neighborhood collaborative filtering
    pub fn recommend_cf(
        &self,
        user_id: &str,
        top_n: usize,
        num_neighbors: usize,
    ) -> Result<Vec<ItemId>> {
        Ok(ids(self.recommend_cf_scored(user_id, top_n, num_neighbors)?))
    }

    #[instrument(skip(self))]
    pub fn recommend_cf_scored(
        &self,
        user_id: &str,
        top_n: usize,
        num_neighbors: usize,
    ) -> Result<Vec<Recommendation>> {
        recover(self.neighborhood.recommend(user_id, top_n, num_neighbors))
    }

    /// Unseen items for `user_id` by latent factors
    pub fn recommend_svd(&self, user_id: &str, top_n: usize, n_factors: usize) -> Result<Vec<ItemId>> {
        Ok(ids(self.recommend_svd_scored(user_id, top_n, n_factors)?))
    }

    #[instrument(skip(self))]
    pub fn recommend_svd_scored(
        &self,
        user_id: &str,
        top_n: usize,
        n_factors: usize,
    ) -> Result<Vec<Recommendation>> {
        // answer unknown users before paying for training
        if self.matrix.user_index(user_id).is_none() {
            return recover(Err(RecommendError::UnknownUser(user_id.to_string())));
        }
        let model = self.svd_model(n_factors)?;
        recover(model.recommend(&self.matrix, user_id, top_n))
    }

    /// Trained model for `n_factors`, memoized in memory and in the cache
    ///
    /// Concurrent callers asking for the same factor count wait for one
    /// training run; other factor counts train in parallel.
    pub fn svd_model(&self, n_factors: usize) -> Result<Arc<LatentFactorModel>> {
        let slot = {
            let mut slots = self
                .svd_models
                .lock()
                .map_err(|_| anyhow!("SVD model lock poisoned"))?;
            slots.entry(n_factors).or_default().clone()
        };
        let mut model = slot
            .lock()
            .map_err(|_| anyhow!("SVD model lock poisoned"))?;
        if let Some(existing) = model.as_ref() {
            return Ok(existing.clone());
        }

        let config = self.config.svd.clone().with_n_factors(n_factors);
        let key = LatentFactorModel::cache_key(&self.fingerprint, &config);
        let trained: LatentFactorModel = self.cache.compute_or_fetch(&key, || {
            LatentFactorModel::train(&self.matrix, &config)
                .with_context(|| format!("Failed to train SVD with {} factors", n_factors))
        })?;
        if trained.shape() != self.matrix.shape() {
            return Err(anyhow!(
                "Cached model {} does not match the interaction matrix",
                key
            ));
        }

        let trained = Arc::new(trained);
        *model = Some(trained.clone());
        Ok(trained)
    }

    /// Item profiles, built on first use
    ///
    /// There is a single profile set, so concurrent content queries wait for
    /// one build. Collaborative queries do not touch this lock.
    pub fn item_profiles(&self) -> Result<Arc<ItemProfiles>> {
        let mut profiles = self
            .profiles
            .lock()
            .map_err(|_| anyhow!("Item profile lock poisoned"))?;
        if let Some(existing) = profiles.as_ref() {
            return Ok(existing.clone());
        }

        let key = format!(
            "item_profiles-{}-{}-d{}-{}-sep{:?}",
            fingerprint_content(&self.dataset.businesses, &self.dataset.reviews),
            self.embedder_name,
            self.embedding_dim,
            self.sentiment_name,
            self.config.content.separator
        );
        let built: ItemProfiles = self.cache.compute_or_fetch(&key, || {
            self.profile_builder
                .build(&self.dataset.businesses, &self.dataset.reviews)
                .context("Failed to build item profiles")
        })?;

        let built = Arc::new(built);
        *profiles = Some(built.clone());
        Ok(built)
    }
}

/// Turn lookup misses into an empty answer; everything else stays an error
fn recover(result: sources::Result<Vec<Recommendation>>) -> Result<Vec<Recommendation>> {
    match result {
        Ok(recommendations) => Ok(recommendations),
        Err(e) if e.is_recoverable() => {
            warn!("{}, returning no recommendations", e);
            Ok(Vec::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn ids(recommendations: Vec<Recommendation>) -> Vec<ItemId> {
    recommendations.into_iter().map(|r| r.item_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{Business, RatingRecord, Review};

    fn scenario_dataset() -> Dataset {
        Dataset {
            ratings: vec![
                RatingRecord::new("u1", "i1", 5.0),
                RatingRecord::new("u1", "i2", 3.0),
                RatingRecord::new("u2", "i1", 4.0),
                RatingRecord::new("u2", "i3", 5.0),
                RatingRecord::new("u3", "i2", 5.0),
                RatingRecord::new("u3", "i3", 4.0),
                RatingRecord::new("u4", "i4", 2.0),
                RatingRecord::new("u4", "i1", 3.0),
            ],
            businesses: vec![
                Business::new("i1", "Noodle Bar"),
                Business::new("i2", "Ramen House"),
                Business::new("i3", "Steak House"),
                Business::new("i4", "Vegan Cafe"),
            ],
            reviews: vec![
                Review::new("i1", "great noodles and broth"),
                Review::new("i2", "great ramen noodles, rich broth"),
                Review::new("i3", "juicy steak"),
            ],
            users: Vec::new(),
        }
    }

    fn uncached(dataset: Dataset) -> Recommender {
        Recommender::new(dataset, EngineConfig::default(), CacheBackend::Disabled).unwrap()
    }

    #[test]
    fn test_unknown_ids_yield_empty_lists() {
        let recommender = uncached(scenario_dataset());
        assert!(recommender.recommend_content("ghost", 5).unwrap().is_empty());
        assert!(recommender.recommend_cf("ghost", 5, 10).unwrap().is_empty());
        assert!(recommender.recommend_svd("ghost", 5, 2).unwrap().is_empty());
    }

    #[test]
    fn test_cf_scenario() {
        let recommender = uncached(scenario_dataset());
        assert_eq!(recommender.recommend_cf("u1", 1, 2).unwrap(), vec!["i3"]);
    }

    #[test]
    fn test_content_query_excludes_itself() {
        let recommender = uncached(scenario_dataset());
        let ids = recommender.recommend_content("i1", 3).unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], "i2");
        assert!(!ids.contains(&"i1".to_string()));
    }

    #[test]
    fn test_svd_models_are_memoized_per_factor_count() {
        let recommender = uncached(scenario_dataset());
        let first = recommender.svd_model(2).unwrap();
        let again = recommender.svd_model(2).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let other = recommender.svd_model(1).unwrap();
        assert_eq!(other.n_factors(), 1);

        let recs = recommender.recommend_svd("u1", 5, 2).unwrap();
        assert!(!recs.contains(&"i1".to_string()));
        assert!(!recs.contains(&"i2".to_string()));
    }

    #[test]
    fn test_concurrent_factor_counts_share_memoized_models() {
        let recommender = uncached(scenario_dataset());
        let (one, two) = std::thread::scope(|scope| {
            let one = scope.spawn(|| recommender.svd_model(1).unwrap());
            let two = scope.spawn(|| recommender.svd_model(2).unwrap());
            (one.join().unwrap(), two.join().unwrap())
        });
        assert_eq!(one.n_factors(), 1);
        assert_eq!(two.n_factors(), 2);
        assert!(Arc::ptr_eq(&one, &recommender.svd_model(1).unwrap()));
        assert!(Arc::ptr_eq(&two, &recommender.svd_model(2).unwrap()));
    }

    #[test]
    fn test_invalid_factor_count_is_an_error() {
        let recommender = uncached(scenario_dataset());
        assert!(recommender.recommend_svd("u1", 5, 0).is_err());
        assert!(recommender.recommend_svd("u1", 5, 4).is_err());
    }

    #[test]
    fn test_malformed_ratings_abort_construction() {
        let mut dataset = scenario_dataset();
        dataset.ratings.push(RatingRecord::new("u5", "i1", f64::NAN));
        let result = Recommender::new(dataset, EngineConfig::default(), CacheBackend::Disabled);
        assert!(result.is_err());
    }
}
