//! InteractionMatrix building and lookup logic.
//!
//! This module turns a flat sequence of rating records into the sparse
//! user×item matrix:
//! - Assign each distinct user and item a zero-based position in first-seen order
//! - Validate every record (finite, positive rating; non-blank identifiers)
//! - Collapse duplicate (user, item) pairs: the last occurrence wins
//! - Flatten the rows into CSR arrays

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::collections::BTreeMap;
use tracing::debug;

impl InteractionMatrix {
    /// Build the matrix from rating records.
    ///
    /// This is a pure function of its input: building twice from the same
    /// sequence yields identical orderings and identical cells.
    ///
    /// Duplicate (user, item) pairs keep the rating of their last occurrence;
    /// the row/column positions are still those of the first occurrence.
    ///
    /// # Errors
    /// `DataLoadError::InvalidRecord` for a blank user/item id or a rating
    /// that is not a finite positive number. Construction stops at the first
    /// offending record.
    pub fn build(records: &[RatingRecord]) -> Result<Self> {
        let mut users = IdIndex::new();
        let mut items = IdIndex::new();
        // BTreeMap keeps each row sorted by column, which CSR requires
        let mut rows: Vec<BTreeMap<usize, f64>> = Vec::new();
        let mut duplicates = 0usize;

        for (position, record) in records.iter().enumerate() {
            validate_record(position, record)?;

            let row = users.insert(&record.user_id);
            let column = items.insert(&record.item_id);
            if row == rows.len() {
                rows.push(BTreeMap::new());
            }
            if rows[row].insert(column, record.rating).is_some() {
                duplicates += 1;
            }
        }

        let nnz = rows.iter().map(|row| row.len()).sum();
        let mut row_offsets = Vec::with_capacity(rows.len() + 1);
        let mut columns = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_offsets.push(0);
        for row in rows {
            for (column, value) in row {
                columns.push(column);
                values.push(value);
            }
            row_offsets.push(columns.len());
        }

        debug!(
            users = users.len(),
            items = items.len(),
            nnz,
            duplicates,
            "Built interaction matrix"
        );

        Ok(Self {
            users,
            items,
            row_offsets,
            columns,
            values,
        })
    }

    /// Split into (matrix, user id order, item id order)
    pub fn into_parts(self) -> (Self, Vec<UserId>, Vec<ItemId>) {
        let user_ids = self.users.ids().to_vec();
        let item_ids = self.items.ids().to_vec();
        (self, user_ids, item_ids)
    }

    /// (number of users, number of items)
    pub fn shape(&self) -> (usize, usize) {
        (self.users.len(), self.items.len())
    }

    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Number of stored ratings
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored entries of one user row
    ///
    /// # Panics
    /// If `user_index >= num_users()`.
    pub fn row(&self, user_index: usize) -> SparseRow<'_> {
        let start = self.row_offsets[user_index];
        let end = self.row_offsets[user_index + 1];
        SparseRow::new(&self.columns[start..end], &self.values[start..end])
    }

    /// Rating at (user, item), `None` when there was no interaction
    pub fn get(&self, user_index: usize, item_index: usize) -> Option<f64> {
        if user_index >= self.num_users() {
            return None;
        }
        self.row(user_index).get(item_index)
    }

    /// Iterate all stored entries as `(user_index, item_index, rating)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.num_users())
            .flat_map(move |u| self.row(u).iter().map(move |(i, r)| (u, i, r)))
    }

    pub fn user_index(&self, user_id: &str) -> Option<usize> {
        self.users.position(user_id)
    }

    pub fn item_index(&self, item_id: &str) -> Option<usize> {
        self.items.position(item_id)
    }

    pub fn user_id(&self, user_index: usize) -> Option<&str> {
        self.users.id(user_index)
    }

    pub fn item_id(&self, item_index: usize) -> Option<&str> {
        self.items.id(item_index)
    }

    /// User identifiers in row order
    pub fn user_ids(&self) -> &[UserId] {
        self.users.ids()
    }

    /// Item identifiers in column order
    pub fn item_ids(&self) -> &[ItemId] {
        self.items.ids()
    }
}

fn validate_record(position: usize, record: &RatingRecord) -> Result<()> {
    if record.user_id.trim().is_empty() {
        return Err(DataLoadError::InvalidRecord {
            position,
            reason: "missing user id".to_string(),
        });
    }
    if record.item_id.trim().is_empty() {
        return Err(DataLoadError::InvalidRecord {
            position,
            reason: "missing item id".to_string(),
        });
    }
    if !record.rating.is_finite() {
        return Err(DataLoadError::InvalidRecord {
            position,
            reason: format!("rating {} is not finite", record.rating),
        });
    }
    // Absence already means "no interaction"; a stored zero would be ambiguous
    if record.rating <= 0.0 {
        return Err(DataLoadError::InvalidRecord {
            position,
            reason: format!("rating {} is not positive", record.rating),
        });
    }
    Ok(())
}
