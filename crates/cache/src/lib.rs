//! # Cache Crate
//!
//! Memoizes expensive batch stages (matrix construction, SVD training,
//! content profiles) across runs.
//!
//! ## Main Components
//!
//! - **ComputeCache**: the "compute-or-fetch" contract every stage is wrapped in
//! - **DiskCache**: bincode blobs on disk, namespaced by generation
//! - **NoCache**: always runs the producer
//! - **CacheBackend**: picks one of the two at runtime
//!
//! ## Example Usage
//!
//! ```ignore
//! use cache::{ComputeCache, DiskCache};
//!
//! let cache = DiskCache::new("cache").with_generation("test");
//! let model = cache.compute_or_fetch("svd_model-abc-f20-s42", || {
//!     LatentFactorModel::train(&matrix, &config)
//! })?;
//! ```
//!
//! Caching wraps a stage from the outside; the algorithms themselves never
//! know whether their result came from disk.

pub mod disk;
pub mod error;

pub use disk::{DiskCache, DEFAULT_GENERATION};
pub use error::{CacheError, Result};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Opaque compute-or-fetch store keyed by a string identifier
///
/// The producer runs only when no usable value is stored under `key`.
/// Producer errors are returned as-is and nothing is stored.
pub trait ComputeCache: Send + Sync {
    fn compute_or_fetch<T, E, F>(&self, key: &str, producer: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>;
}

/// Pass-through cache: every call runs the producer
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl ComputeCache for NoCache {
    fn compute_or_fetch<T, E, F>(&self, _key: &str, producer: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        producer()
    }
}

/// Runtime choice between a disk cache and no caching
#[derive(Debug, Clone)]
pub enum CacheBackend {
    Disk(DiskCache),
    Disabled,
}

impl CacheBackend {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Disk(_))
    }
}

impl ComputeCache for CacheBackend {
    fn compute_or_fetch<T, E, F>(&self, key: &str, producer: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        match self {
            Self::Disk(cache) => cache.compute_or_fetch(key, producer),
            Self::Disabled => NoCache.compute_or_fetch(key, producer),
        }
    }
}
