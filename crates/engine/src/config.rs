use anyhow::{ensure, Context, Result};
use cache::{CacheBackend, DiskCache};
use serde::{Deserialize, Serialize};
use sources::content::DEFAULT_SEPARATOR;
use sources::embedding::DEFAULT_EMBEDDING_DIM;
use sources::neighborhood::DEFAULT_NUM_NEIGHBORS;
use sources::SvdConfig;
use std::path::{Path, PathBuf};

/// Engine configuration
///
/// Every section falls back to its defaults, so a JSON file only needs the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Recommendations returned per query
    pub top_n: usize,

    /// Neighbors consulted by collaborative filtering
    pub num_neighbors: usize,

    /// Latent factor training
    pub svd: SvdConfig,

    /// Content profile construction
    pub content: ContentConfig,

    /// Disk cache
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            top_n: 5,
            num_neighbors: DEFAULT_NUM_NEIGHBORS,
            svd: SvdConfig::default(),
            content: ContentConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Dimension of the text embedding (the profile has one more)
    pub embedding_dim: usize,

    /// Joins an item's reviews into one document
    pub separator: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root directory of cached blobs
    pub dir: PathBuf,

    /// Generation used for normal runs
    pub generation: String,

    /// Generation used for test-data runs
    pub test_generation: String,

    /// Recompute and overwrite every cached stage
    pub force_recompute: bool,

    /// Disable caching entirely
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("cache"),
            generation: cache::DEFAULT_GENERATION.to_string(),
            test_generation: "test".to_string(),
            force_recompute: false,
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Cache backend for a normal or a test-data run
    pub fn backend(&self, testing: bool) -> CacheBackend {
        if !self.enabled {
            return CacheBackend::Disabled;
        }
        let generation = if testing {
            &self.test_generation
        } else {
            &self.generation
        };
        CacheBackend::Disk(
            DiskCache::new(&self.dir)
                .with_generation(generation.as_str())
                .with_force_recompute(self.force_recompute),
        )
    }
}

impl EngineConfig {
    /// Load from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no query could use
    pub fn validate(&self) -> Result<()> {
        ensure!(self.svd.n_factors >= 1, "svd.n_factors must be at least 1");
        ensure!(
            self.content.embedding_dim >= 1,
            "content.embedding_dim must be at least 1"
        );
        Ok(())
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_num_neighbors(mut self, num_neighbors: usize) -> Self {
        self.num_neighbors = num_neighbors;
        self
    }

    pub fn with_n_factors(mut self, n_factors: usize) -> Self {
        self.svd.n_factors = n_factors;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache.dir = dir.into();
        self
    }

    pub fn with_force_recompute(mut self, force: bool) -> Self {
        self.cache.force_recompute = force;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }
}
