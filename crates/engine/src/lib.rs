//! # Engine Crate
//!
//! Ties the data, the recommendation sources and the cache together behind
//! one query interface.
//!
//! ## Main Components
//!
//! - **config**: `EngineConfig`, defaults plus optional JSON overrides
//! - **recommender**: `Recommender`, the `recommend_content` / `recommend_cf` /
//!   `recommend_svd` queries
//! - **evaluation**: ranking metrics and leave-last-out evaluation
//!
//! ## Example Usage
//!
//! ```ignore
//! use engine::{EngineConfig, Recommender};
//! use data_loader::Dataset;
//!
//! let config = EngineConfig::default();
//! let dataset = Dataset::load_from_dir(Path::new("data/processed"))?;
//! let recommender = Recommender::new(dataset, config.clone(), config.cache.backend(false))?;
//!
//! let similar = recommender.recommend_content("business-1", 5)?;
//! let for_user = recommender.recommend_svd("user-1", 5, 20)?;
//! ```

pub mod config;
pub mod evaluation;
pub mod recommender;

pub use config::{CacheConfig, ContentConfig, EngineConfig};
pub use evaluation::{evaluate_holdout, HoldoutConfig, HoldoutReport, RankingMetrics};
pub use recommender::Recommender;
