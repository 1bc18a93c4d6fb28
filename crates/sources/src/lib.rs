//! # Sources Crate
//!
//! This crate implements the three recommendation sources and the pieces they share.
//!
//! ## Components
//!
//! ### Neighborhood Source (collaborative)
//! User-based collaborative filtering over the interaction matrix:
//! - "Users who rated like you also liked..."
//! - Cosine similarity between full rating rows, similarity-weighted averages
//!
//! ### Latent Factor Source (collaborative)
//! Truncated SVD of the interaction matrix:
//! - Users and items projected into `n_factors` latent dimensions
//! - Seeded randomized range finder, so training is reproducible
//!
//! ### Content Source
//! Item-to-item similarity of text profiles:
//! - Review text embedded by a `TextEmbedder`
//! - Mean review polarity from a `SentimentAnalyzer` appended to each vector
//!
//! All three rank through `ranker::top_n`, so ties always break the same way.
//!
//! ## Example Usage
//!
//! ```ignore
//! use sources::{LatentFactorModel, NeighborhoodCF, SvdConfig};
//! use data_loader::{Dataset, InteractionMatrix};
//! use std::sync::Arc;
//!
//! let dataset = Dataset::load_from_dir(Path::new("data/processed"))?;
//! let matrix = Arc::new(InteractionMatrix::build(&dataset.ratings)?);
//!
//! let cf = NeighborhoodCF::new(matrix.clone());
//! let by_neighbors = cf.recommend("user-1", 5, 10)?;
//!
//! let model = LatentFactorModel::train(&matrix, &SvdConfig::default())?;
//! let by_factors = model.recommend(&matrix, "user-1", 5)?;
//! ```

// Public modules
pub mod content;
pub mod embedding;
pub mod error;
pub mod latent;
pub mod neighborhood;
pub mod ranker;
pub mod sentiment;
pub mod similarity;
pub mod types;

mod linalg;

// Re-export commonly used types
pub use content::{ContentProfileBuilder, ItemProfiles};
pub use embedding::{HashingEmbedder, TextEmbedder};
pub use error::{RecommendError, Result};
pub use latent::{LatentFactorModel, SvdConfig};
pub use neighborhood::NeighborhoodCF;
pub use sentiment::{LexiconSentiment, Sentiment, SentimentAnalyzer};
pub use types::{Recommendation, RecommendationSource};
