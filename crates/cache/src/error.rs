//! Error types for the compute cache.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache serialization error for key {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: bincode::Error,
    },
}

pub type Result<T> = std::result::Result<T, CacheError>;
