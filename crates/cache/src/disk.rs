//! Disk-backed compute cache.
//!
//! Blobs live at `<root>/<generation>/<key>-<digest>.bin`, bincode encoded.
//! The generation is a namespace: the test run and the normal run keep
//! separate blobs under the same root.

use crate::error::{CacheError, Result};
use crate::ComputeCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_GENERATION: &str = "default";

/// Longest sanitized key prefix kept in a file name
const MAX_KEY_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct DiskCache {
    root: PathBuf,
    generation: String,
    force_recompute: bool,
}

impl DiskCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            generation: DEFAULT_GENERATION.to_string(),
            force_recompute: false,
        }
    }

    pub fn with_generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = generation.into();
        self
    }

    /// Always run the producer and overwrite whatever is stored
    pub fn with_force_recompute(mut self, force: bool) -> Self {
        self.force_recompute = force;
        self
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Directory holding this generation's blobs
    pub fn generation_dir(&self) -> PathBuf {
        self.root.join(&self.generation)
    }

    /// File that stores the value for `key`
    pub fn blob_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .take(MAX_KEY_CHARS)
            .collect();
        // distinct keys can sanitize to the same prefix
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.generation_dir()
            .join(format!("{}-{}.bin", sanitized, &digest[..8]))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.blob_path(key).is_file()
    }

    /// Delete one stored value; returns whether anything was removed
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let path = self.blob_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }

    /// Delete every blob of this generation; returns how many were removed
    pub fn clear(&self) -> Result<usize> {
        let dir = self.generation_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(CacheError::Io { path: dir, source }),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|source| CacheError::Io {
                    path: dir.clone(),
                    source,
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == "bin") {
                fs::remove_file(&path).map_err(|source| CacheError::Io {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        info!("Removed {} cached blobs from {:?}", removed, dir);
        Ok(removed)
    }

    /// Stored value for `key`, or None when absent or unreadable
    fn read<T: DeserializeOwned>(&self, key: &str, path: &Path) -> Option<T> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read cached {} at {:?}: {}", key, path, e);
                return None;
            }
        };
        match bincode::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Discarding corrupt cache entry {} at {:?}: {}", key, path, e);
                None
            }
        }
    }

    /// Write through a temp file and rename so readers never see half a blob
    fn write<T: Serialize>(&self, key: &str, path: &Path, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value).map_err(|source| CacheError::Serialization {
            key: key.to_string(),
            source,
        })?;

        let dir = self.generation_dir();
        fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
            path: dir.clone(),
            source,
        })?;

        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        fs::write(&tmp, &bytes).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Stored {} ({} bytes) at {:?}", key, bytes.len(), path);
        Ok(())
    }
}

impl ComputeCache for DiskCache {
    #[instrument(skip(self, producer), fields(generation = %self.generation))]
    fn compute_or_fetch<T, E, F>(&self, key: &str, producer: F) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let path = self.blob_path(key);

        if !self.force_recompute {
            if let Some(value) = self.read(key, &path) {
                info!("Loaded cached {}", key);
                return Ok(value);
            }
        }

        let start = Instant::now();
        let value = producer()?;
        info!("Computed {} in {:?}", key, start.elapsed());

        self.write(key, &path, &value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug)]
    enum TestError {
        Cache(CacheError),
        Producer(&'static str),
    }

    impl From<CacheError> for TestError {
        fn from(e: CacheError) -> Self {
            TestError::Cache(e)
        }
    }

    #[test]
    fn test_producer_runs_once_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let calls = Cell::new(0);

        for _ in 0..3 {
            let value: Vec<u32> = cache
                .compute_or_fetch("numbers", || {
                    calls.set(calls.get() + 1);
                    Ok::<_, TestError>(vec![1, 2, 3])
                })
                .unwrap();
            assert_eq!(value, vec![1, 2, 3]);
        }
        assert_eq!(calls.get(), 1);
        assert!(cache.contains("numbers"));
    }

    #[test]
    fn test_value_survives_new_cache_instance() {
        let dir = tempfile::tempdir().unwrap();
        let first = DiskCache::new(dir.path());
        let _: String = first
            .compute_or_fetch("greeting", || Ok::<_, TestError>("hello".to_string()))
            .unwrap();

        let second = DiskCache::new(dir.path());
        let value: String = second
            .compute_or_fetch("greeting", || Err(TestError::Producer("should not run")))
            .unwrap();
        assert_eq!(value, "hello");
    }

    #[test]
    fn test_generations_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let normal = DiskCache::new(dir.path());
        let test = DiskCache::new(dir.path()).with_generation("test");

        let _: u64 = normal.compute_or_fetch("k", || Ok::<_, TestError>(1)).unwrap();
        let value: u64 = test.compute_or_fetch("k", || Ok::<_, TestError>(2)).unwrap();
        assert_eq!(value, 2);
        assert_ne!(normal.blob_path("k"), test.blob_path("k"));
    }

    #[test]
    fn test_force_recompute_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let _: u64 = cache.compute_or_fetch("k", || Ok::<_, TestError>(1)).unwrap();

        let forced = cache.clone().with_force_recompute(true);
        let value: u64 = forced.compute_or_fetch("k", || Ok::<_, TestError>(2)).unwrap();
        assert_eq!(value, 2);

        let value: u64 = cache.compute_or_fetch("k", || Ok::<_, TestError>(3)).unwrap();
        assert_eq!(value, 2);
    }

    #[test]
    fn test_corrupt_blob_is_recomputed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let path = cache.blob_path("k");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"\x01").unwrap();

        let value: Vec<String> = cache
            .compute_or_fetch("k", || Ok::<_, TestError>(vec!["fresh".to_string()]))
            .unwrap();
        assert_eq!(value, vec!["fresh".to_string()]);
    }

    #[test]
    fn test_producer_error_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let result: std::result::Result<u8, TestError> =
            cache.compute_or_fetch("k", || Err(TestError::Producer("boom")));
        assert!(matches!(result, Err(TestError::Producer("boom"))));
        assert!(!cache.contains("k"));
    }

    #[test]
    fn test_blob_paths_distinguish_similar_keys() {
        let cache = DiskCache::new("/tmp/unused");
        assert_ne!(cache.blob_path("a/b"), cache.blob_path("a_b"));
        let name = cache.blob_path("svd_model-abc-f20-s42");
        let file = name.file_name().unwrap().to_string_lossy().to_string();
        assert!(file.starts_with("svd_model-abc-f20-s42-"));
        assert!(file.ends_with(".bin"));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        for key in ["a", "b", "c"] {
            let _: u8 = cache.compute_or_fetch(key, || Ok::<_, TestError>(0)).unwrap();
        }
        assert!(cache.invalidate("a").unwrap());
        assert!(!cache.invalidate("a").unwrap());
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(!cache.contains("b"));
        assert_eq!(DiskCache::new(dir.path()).with_generation("empty").clear().unwrap(), 0);
    }
}
