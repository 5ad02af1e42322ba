// src/image_cache.rs
// Thumbnail cache: decoded bytes in an LRU, files on disk, network as the last resort

use crate::config::Settings;
use crate::error::AppError;
use crate::security::{validate_path_safety, validate_stream_url};
use base64::{engine::general_purpose, Engine as _};
use log::{debug, info, warn};
use lru::LruCache;
use reqwest::Client;
use ring::digest;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const IMAGE_DIR: &str = "images";
const FETCH_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub disk_bytes: u64,
}

pub struct ImageCache {
    dir: PathBuf,
    max_age: Duration,
    memory: Mutex<LruCache<String, Arc<Vec<u8>>>>,
    client: Client,
}

impl ImageCache {
    /// Cache writing into `<root>/images`
    pub fn new(root: &Path, memory_entries: usize, max_age: Duration) -> Result<Self, AppError> {
        let dir = root.join(IMAGE_DIR);
        validate_path_safety(&dir)?;

        let capacity = NonZeroUsize::new(memory_entries.max(1))
            .ok_or_else(|| AppError::CacheError("memory capacity must be positive".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            dir,
            max_age,
            memory: Mutex::new(LruCache::new(capacity)),
            client,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let root = settings.cache_root()?;
        let max_age_secs = settings
            .image_cache_max_age_days
            .checked_mul(24 * 60 * 60)
            .ok_or_else(|| {
                AppError::CacheError(format!(
                    "Image cache max age out of range: {} days",
                    settings.image_cache_max_age_days
                ))
            })?;
        Self::new(&root, settings.image_memory_entries, Duration::from_secs(max_age_secs))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Disk location for a URL, whether or not it exists yet
    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(cache_key(url))
    }

    /// Memory, then disk, then the network
    pub async fn get(&self, url: &str) -> Result<Arc<Vec<u8>>, AppError> {
        if let Some(bytes) = self.memory.lock().unwrap().get(url) {
            return Ok(Arc::clone(bytes));
        }

        if let Some(bytes) = self.read_disk(url)? {
            debug!("Image disk hit for {}", url);
            let bytes = Arc::new(bytes);
            self.memory
                .lock()
                .unwrap()
                .put(url.to_string(), Arc::clone(&bytes));
            return Ok(bytes);
        }

        let bytes = self.fetch(url).await?;
        self.insert(url, bytes.clone())?;
        Ok(Arc::new(bytes))
    }

    /// Store bytes in both tiers
    pub fn insert(&self, url: &str, bytes: Vec<u8>) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(url);
        fs::write(&path, &bytes)
            .map_err(|e| AppError::CacheError(format!("Failed to write {:?}: {}", path, e)))?;

        self.memory
            .lock()
            .unwrap()
            .put(url.to_string(), Arc::new(bytes));
        Ok(())
    }

    pub fn contains_in_memory(&self, url: &str) -> bool {
        self.memory.lock().unwrap().contains(url)
    }

    /// Delete disk entries past the maximum age
    pub fn purge_expired(&self) -> Result<usize, AppError> {
        let mut removed = 0;
        for (path, _) in self.disk_entries()? {
            if self.is_expired(&path) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Removed {} expired images", removed);
        }
        Ok(removed)
    }

    pub fn clear(&self) -> Result<(), AppError> {
        self.memory.lock().unwrap().clear();
        for (path, _) in self.disk_entries()? {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats, AppError> {
        let entries = self.disk_entries()?;
        Ok(CacheStats {
            memory_entries: self.memory.lock().unwrap().len(),
            disk_entries: entries.len(),
            disk_bytes: entries.iter().map(|(_, size)| size).sum(),
        })
    }

    fn read_disk(&self, url: &str) -> Result<Option<Vec<u8>>, AppError> {
        let path = self.path_for(url);
        if !path.is_file() {
            return Ok(None);
        }

        if self.is_expired(&path) {
            debug!("Image on disk expired: {:?}", path);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not remove expired image {:?}: {}", path, e);
            }
            return Ok(None);
        }

        Ok(Some(fs::read(&path)?))
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        validate_stream_url(url)?;
        debug!("Fetching image {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::HttpStatus(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }

    fn is_expired(&self, path: &Path) -> bool {
        let modified = match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(m) => m,
            Err(_) => return true,
        };
        match modified.elapsed() {
            Ok(age) => age >= self.max_age,
            // Modified in the future: clock skew, treat as fresh
            Err(_) => false,
        }
    }

    fn disk_entries(&self) -> Result<Vec<(PathBuf, u64)>, AppError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                entries.push((entry.path(), metadata.len()));
            }
        }
        Ok(entries)
    }
}

/// File name for a URL: URL-safe base64 of its SHA-256
pub fn cache_key(url: &str) -> String {
    let hash = digest::digest(&digest::SHA256, url.as_bytes());
    general_purpose::URL_SAFE_NO_PAD.encode(hash.as_ref())
}
