//! Core domain types for the ratings/reviews dataset.
//!
//! This module defines the fundamental data structures used throughout the system:
//! - Type aliases for the two identifier spaces (UserId, ItemId)
//! - Flat input records (ratings, businesses, reviews, users)
//! - `IdIndex`: the ordered bijection between identifiers and matrix positions
//! - `InteractionMatrix`: the immutable sparse user×item rating matrix (CSR layout)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Type Aliases
// =============================================================================
// Identifiers are opaque strings; the aliases keep the two ID spaces readable.

/// Opaque identifier of a user
pub type UserId = String;

/// Opaque identifier of an item (a business in the Yelp data)
pub type ItemId = String;

// =============================================================================
// Input Records
// =============================================================================

/// A single (user, item, rating) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Positive, finite rating value (e.g. 1.0 - 5.0 stars)
    pub rating: f64,
}

impl RatingRecord {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, rating: f64) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            rating,
        }
    }
}

/// Item metadata (one row of the business file)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: ItemId,
    pub name: String,
    pub city: Option<String>,
    /// Average star rating published with the business, if present
    pub stars: Option<f32>,
    pub categories: Vec<String>,
}

impl Business {
    /// Minimal metadata: only the identifier and display name
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            city: None,
            stars: None,
            categories: Vec::new(),
        }
    }
}

/// Free text written about an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub item_id: ItemId,
    pub user_id: Option<UserId>,
    pub text: String,
}

impl Review {
    pub fn new(item_id: impl Into<ItemId>, text: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            user_id: None,
            text: text.into(),
        }
    }
}

/// User display data, only used by the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

/// Everything read from one processed data directory
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub businesses: Vec<Business>,
    pub ratings: Vec<RatingRecord>,
    pub reviews: Vec<Review>,
    pub users: Vec<User>,
}

impl Dataset {
    /// Get counts for debugging/validation
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (
            self.businesses.len(),
            self.ratings.len(),
            self.reviews.len(),
            self.users.len(),
        )
    }

    /// Display name of a business, if it is known
    pub fn business_name(&self, item_id: &str) -> Option<&str> {
        self.businesses
            .iter()
            .find(|b| b.id == item_id)
            .map(|b| b.name.as_str())
    }

    /// Display name of a user, if it is known
    pub fn user_name(&self, user_id: &str) -> Option<&str> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.name.as_str())
    }
}

// =============================================================================
// IdIndex - identifier <-> position bijection
// =============================================================================

/// Ordered set of identifiers with O(1) reverse lookup.
///
/// Positions are assigned in first-seen order and never change afterwards.
/// Only the ordered id list is serialized; the lookup table is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct IdIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the position of `id`, assigning the next free one on first sight
    pub fn insert(&mut self, id: &str) -> usize {
        if let Some(&position) = self.positions.get(id) {
            return position;
        }
        let position = self.ids.len();
        self.ids.push(id.to_string());
        self.positions.insert(id.to_string(), position);
        position
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn id(&self, position: usize) -> Option<&str> {
        self.ids.get(position).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in position order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

impl From<Vec<String>> for IdIndex {
    fn from(ids: Vec<String>) -> Self {
        let mut index = IdIndex::new();
        for id in &ids {
            index.insert(id);
        }
        index
    }
}

impl From<IdIndex> for Vec<String> {
    fn from(index: IdIndex) -> Self {
        index.ids
    }
}

// =============================================================================
// InteractionMatrix - the sparse user×item rating matrix
// =============================================================================

/// Immutable sparse rating matrix in compressed sparse row (CSR) layout.
///
/// Rows are users, columns are items. Only observed ratings are stored; an
/// absent cell means "no interaction" and is never materialized as zero.
/// Within a row, stored columns are strictly increasing.
///
/// Built once per batch with [`InteractionMatrix::build`] (see `index.rs`)
/// and shared read-only afterwards (it is `Send + Sync`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionMatrix {
    pub(crate) users: IdIndex,
    pub(crate) items: IdIndex,
    /// `row_offsets[u]..row_offsets[u + 1]` is the slice of row `u`
    pub(crate) row_offsets: Vec<usize>,
    pub(crate) columns: Vec<usize>,
    pub(crate) values: Vec<f64>,
}

/// Borrowed view of the stored entries of one matrix row
#[derive(Debug, Clone, Copy)]
pub struct SparseRow<'a> {
    columns: &'a [usize],
    values: &'a [f64],
}

impl<'a> SparseRow<'a> {
    pub fn new(columns: &'a [usize], values: &'a [f64]) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Iterate `(column, value)` pairs of stored entries, by ascending column
    pub fn iter(self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.columns.iter().copied().zip(self.values.iter().copied())
    }

    pub fn columns(&self) -> &'a [usize] {
        self.columns
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, column: usize) -> Option<f64> {
        self.columns
            .binary_search(&column)
            .ok()
            .map(|slot| self.values[slot])
    }

    pub fn contains(&self, column: usize) -> bool {
        self.columns.binary_search(&column).is_ok()
    }

    /// Euclidean norm over the full item dimensionality (absent cells are zero)
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Dot product with another row; merge-join over the sorted columns
    pub fn dot(&self, other: &SparseRow<'_>) -> f64 {
        let (mut a, mut b) = (0, 0);
        let mut sum = 0.0;
        while a < self.columns.len() && b < other.columns.len() {
            match self.columns[a].cmp(&other.columns[b]) {
                std::cmp::Ordering::Less => a += 1,
                std::cmp::Ordering::Greater => b += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[a] * other.values[b];
                    a += 1;
                    b += 1;
                }
            }
        }
        sum
    }
}
