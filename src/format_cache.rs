// src/format_cache.rs
// Format lists keyed by video ID, persisted as one JSON file

use crate::error::AppError;
use crate::models::{FormatRecord, Video};
use crate::security::validate_path_safety;
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const CACHE_FILE: &str = "formats.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedFormats {
    pub fetched_at: DateTime<Utc>,
    pub video: Video,
    pub formats: Vec<FormatRecord>,
}

/// Format lists expire well before YouTube's stream URLs do
pub struct FormatCache {
    path: PathBuf,
    ttl: Duration,
    entries: HashMap<String, CachedFormats>,
}

impl FormatCache {
    /// Empty cache that will persist to `<dir>/formats.json`
    pub fn new(dir: &Path, ttl_minutes: i64) -> Result<Self, AppError> {
        let ttl = Duration::try_minutes(ttl_minutes.max(0)).ok_or_else(|| {
            AppError::CacheError(format!("Format cache TTL out of range: {} minutes", ttl_minutes))
        })?;

        Ok(Self {
            path: dir.join(CACHE_FILE),
            ttl,
            entries: HashMap::new(),
        })
    }

    /// Read the cache file; a missing or corrupt file yields an empty cache
    pub fn load(dir: &Path, ttl_minutes: i64) -> Result<Self, AppError> {
        let mut cache = Self::new(dir, ttl_minutes)?;

        let contents = match fs::read_to_string(&cache.path) {
            Ok(c) => c,
            Err(_) => {
                debug!("No format cache at {:?}", cache.path);
                return Ok(cache);
            }
        };

        match serde_json::from_str::<HashMap<String, CachedFormats>>(&contents) {
            Ok(entries) => {
                debug!("Loaded {} cached format lists", entries.len());
                cache.entries = entries;
            }
            Err(e) => warn!("Discarding corrupt format cache {:?}: {}", cache.path, e),
        }

        Ok(cache)
    }

    pub fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            validate_path_safety(parent)?;
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.entries)?;
        fs::write(&self.path, json)
            .map_err(|e| AppError::CacheError(format!("Failed to write {:?}: {}", self.path, e)))?;
        Ok(())
    }

    /// Fresh entry for a video; expired entries count as misses
    pub fn get(&self, video_id: &str) -> Option<&CachedFormats> {
        self.get_at(video_id, Utc::now())
    }

    pub fn get_at(&self, video_id: &str, now: DateTime<Utc>) -> Option<&CachedFormats> {
        self.entries
            .get(video_id)
            .filter(|entry| !self.is_expired(entry, now))
    }

    pub fn insert(&mut self, video: Video, formats: Vec<FormatRecord>) {
        self.insert_at(video, formats, Utc::now());
    }

    pub fn insert_at(&mut self, video: Video, formats: Vec<FormatRecord>, fetched_at: DateTime<Utc>) {
        self.entries.insert(
            video.id.clone(),
            CachedFormats {
                fetched_at,
                video,
                formats,
            },
        );
    }

    pub fn remove(&mut self, video_id: &str) -> Option<CachedFormats> {
        self.entries.remove(video_id)
    }

    /// Drop expired entries, returning how many were removed
    pub fn prune(&mut self) -> usize {
        self.prune_at(Utc::now())
    }

    pub fn prune_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.fetched_at < ttl);
        let removed = before - self.entries.len();
        if removed > 0 {
            info!("Pruned {} expired format lists", removed);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, entry: &CachedFormats, now: DateTime<Utc>) -> bool {
        now - entry.fetched_at >= self.ttl
    }
}
