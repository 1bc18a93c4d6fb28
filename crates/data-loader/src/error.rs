//! Error types for the data-loader crate.
//!
//! Everything that can go wrong while reading the processed CSV files or
//! while turning rating records into an [`InteractionMatrix`](crate::InteractionMatrix)
//! ends up as a [`DataLoadError`]. All of these are build-time errors: they
//! abort construction and are propagated to the caller.

use thiserror::Error;

/// Errors that can occur during data loading and matrix construction
///
/// Rust concept: the `#[derive(Error)]` macro from thiserror implements
/// `std::error::Error` and `Display` from the `#[error(...)]` attributes.
#[derive(Error, Debug)]
pub enum DataLoadError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A record in a data file couldn't be parsed
    #[error("Parse error at record {record} in {file}: {reason}")]
    ParseError {
        file: String,
        record: usize,
        reason: String,
    },

    /// The header of a data file lacks a required column
    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    /// Expected number of fields in a record doesn't match the header
    #[error("Expected {expected} fields but found {found} at record {record} in {file}")]
    FieldCountMismatch {
        file: String,
        expected: usize,
        found: usize,
        record: usize,
    },

    /// A rating record cannot be placed in the interaction matrix
    ///
    /// `position` is the zero-based index of the offending record in the
    /// input sequence.
    #[error("Invalid record at position {position}: {reason}")]
    InvalidRecord { position: usize, reason: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DataLoadError>;
