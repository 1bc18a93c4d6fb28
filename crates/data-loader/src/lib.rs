//! # Data Loader Crate
//!
//! This crate handles loading the processed Yelp-style dataset and building the
//! sparse user×item interaction matrix every collaborative recommender reads.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (RatingRecord, Business, Review, IdIndex, InteractionMatrix)
//! - **parser**: Parse the processed CSV files into Rust structs
//! - **index**: Build the interaction matrix from rating records
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{Dataset, InteractionMatrix};
//! use std::path::Path;
//!
//! let dataset = Dataset::load_from_dir(Path::new("data/processed"))?;
//! let matrix = InteractionMatrix::build(&dataset.ratings)?;
//!
//! let (users, items) = matrix.shape();
//! println!("{} users rated {} businesses", users, items);
//! ```

// Public modules
pub mod error;
pub mod types;
pub mod parser;
pub mod index;

// Re-export commonly used types for convenience
pub use error::{DataLoadError, Result};
pub use types::{
    // Type aliases
    UserId,
    ItemId,
    // Core types
    RatingRecord,
    Business,
    Review,
    User,
    Dataset,
    IdIndex,
    InteractionMatrix,
    SparseRow,
};

use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{info, warn};

/// File names produced by the preprocessing step
pub const RATINGS_FILE: &str = "ratings_processed.csv";
pub const BUSINESS_FILE: &str = "business_processed.csv";
pub const REVIEWS_FILE: &str = "reviews_processed.csv";
pub const USERS_FILE: &str = "user_processed.csv";

impl Dataset {
    /// Load every processed file from a directory
    ///
    /// Ratings, businesses and reviews are required. The users file only
    /// provides display names and may be absent.
    pub fn load_from_dir(data_dir: &Path) -> Result<Self> {
        info!("Loading processed dataset from {:?}", data_dir);

        let ratings_path = data_dir.join(RATINGS_FILE);
        let business_path = data_dir.join(BUSINESS_FILE);
        let reviews_path = data_dir.join(REVIEWS_FILE);
        let users_path = data_dir.join(USERS_FILE);

        // Parse all files in parallel using nested rayon joins
        let ((ratings, businesses), (reviews, users)) = rayon::join(
            || {
                rayon::join(
                    || parser::parse_ratings(&ratings_path),
                    || parser::parse_businesses(&business_path),
                )
            },
            || {
                rayon::join(
                    || parser::parse_reviews(&reviews_path),
                    || {
                        if users_path.exists() {
                            parser::parse_users(&users_path)
                        } else {
                            warn!("No users file at {:?}, user names unavailable", users_path);
                            Ok(Vec::new())
                        }
                    },
                )
            },
        );

        let dataset = Dataset {
            ratings: ratings?,
            businesses: businesses?,
            reviews: reviews?,
            users: users?,
        };

        let (businesses, ratings, reviews, users) = dataset.counts();
        info!(
            "Loaded {} businesses, {} ratings, {} reviews, {} users",
            businesses, ratings, reviews, users
        );
        Ok(dataset)
    }
}

/// Content fingerprint of a rating snapshot (hex SHA-256)
///
/// Cached artifacts derived from the ratings are keyed on this value, so a
/// changed snapshot never reuses a stale matrix or model.
pub fn fingerprint_ratings(records: &[RatingRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.user_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.item_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.rating.to_bits().to_le_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Content fingerprint of the inputs of the item-profile stage
pub fn fingerprint_content(businesses: &[Business], reviews: &[Review]) -> String {
    let mut hasher = Sha256::new();
    for business in businesses {
        hasher.update(business.id.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([1u8]);
    for review in reviews {
        hasher.update(review.item_id.as_bytes());
        hasher.update([0u8]);
        hasher.update((review.text.len() as u64).to_le_bytes());
        hasher.update(review.text.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_dataset(dir: &Path, with_users: bool) {
        fs::write(
            dir.join(RATINGS_FILE),
            "user_id,business_id,rating\nu1,b1,5\nu1,b2,3\nu2,b1,4\n",
        )
        .unwrap();
        fs::write(
            dir.join(BUSINESS_FILE),
            "business_id,name\nb1,Pizza Place\nb2,Taco Stand\n",
        )
        .unwrap();
        fs::write(
            dir.join(REVIEWS_FILE),
            "business_id,review_text\nb1,\"Great crust, friendly staff\"\nb2,Too salty\n",
        )
        .unwrap();
        if with_users {
            fs::write(dir.join(USERS_FILE), "user_id,name\nu1,Ana\nu2,Ben\n").unwrap();
        }
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = Dataset::default();
        assert_eq!(dataset.counts(), (0, 0, 0, 0));
        assert!(dataset.business_name("b1").is_none());
    }

    #[test]
    fn test_load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), true);

        let dataset = Dataset::load_from_dir(dir.path()).unwrap();
        assert_eq!(dataset.counts(), (2, 3, 2, 2));
        assert_eq!(dataset.business_name("b2"), Some("Taco Stand"));
        assert_eq!(dataset.user_name("u1"), Some("Ana"));
        assert_eq!(dataset.reviews[0].text, "Great crust, friendly staff");
    }

    #[test]
    fn test_users_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path(), false);

        let dataset = Dataset::load_from_dir(dir.path()).unwrap();
        assert!(dataset.users.is_empty());
        assert_eq!(dataset.ratings.len(), 3);
    }

    #[test]
    fn test_missing_ratings_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Dataset::load_from_dir(dir.path()),
            Err(DataLoadError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = vec![RatingRecord::new("u1", "b1", 5.0)];
        let b = vec![RatingRecord::new("u1", "b1", 4.0)];
        assert_eq!(fingerprint_ratings(&a), fingerprint_ratings(&a.clone()));
        assert_ne!(fingerprint_ratings(&a), fingerprint_ratings(&b));
        assert_eq!(fingerprint_ratings(&a).len(), 64);
    }
}
