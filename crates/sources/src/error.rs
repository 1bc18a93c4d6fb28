//! Error types for the recommendation sources.

use data_loader::{DataLoadError, ItemId, UserId};
use thiserror::Error;

/// Errors raised by the recommenders and the content profile builder
#[derive(Error, Debug)]
pub enum RecommendError {
    /// The query user has no row in the interaction matrix
    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    /// The query item has no profile
    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    /// A numeric parameter is outside its valid range (never clamped)
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The embedding collaborator broke its contract
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The sentiment collaborator broke its contract
    #[error("Sentiment analysis failed: {0}")]
    Sentiment(String),

    #[error(transparent)]
    Data(#[from] DataLoadError),
}

impl RecommendError {
    /// Lookup misses are recoverable: a query boundary turns them into an
    /// empty result instead of failing a whole batch
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnknownUser(_) | Self::UnknownItem(_))
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
