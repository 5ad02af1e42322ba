// src/config.rs
// User settings persisted as JSON in the platform config directory

use crate::error::AppError;
use dirs_next as dirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PROGRAM_NAME: &str = "tubeview";
const SETTINGS_FILE: &str = "settings.json";

/// One week
pub const MAX_FORMAT_CACHE_TTL_MINUTES: i64 = 7 * 24 * 60;
pub const MAX_IMAGE_CACHE_AGE_DAYS: u64 = 365;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Explicit path to yt-dlp; looked up on PATH when unset
    pub ytdlp_path: Option<String>,
    /// Media player executable used for playback
    pub player: String,
    /// Extra arguments passed to the player before the stream URL
    pub player_args: Vec<String>,
    /// Resolution ceiling for stream selection
    pub max_height: u32,
    /// Preferred audio language (primary subtag, e.g. "en")
    pub preferred_audio_language: Option<String>,
    /// Skip dubbed and audio-description tracks while others exist
    pub avoid_dubbed_audio: bool,
    /// Video codec families the player can decode, in preference order
    pub supported_video_codecs: Vec<String>,
    /// Audio codec families the player can decode, in preference order
    pub supported_audio_codecs: Vec<String>,
    /// Browsers tried in order when YouTube asks for sign-in
    pub cookie_browsers: Vec<String>,
    /// Items requested per page of search results and feeds
    pub page_size: usize,
    /// Delay before search-as-you-type fires, in milliseconds
    pub search_debounce_ms: u64,
    /// Lifetime of cached format lists, in minutes
    pub format_cache_ttl_minutes: i64,
    /// Number of decoded images kept in memory
    pub image_memory_entries: usize,
    /// Lifetime of images on disk, in days
    pub image_cache_max_age_days: u64,
    /// Override for the cache directory
    pub cache_dir: Option<String>,
    /// Start on a muxed stream and upgrade to composed when available
    pub adaptive_upgrade: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            player: "mpv".to_string(),
            player_args: Vec::new(),
            max_height: 1080,
            preferred_audio_language: None,
            avoid_dubbed_audio: true,
            supported_video_codecs: vec![
                "avc1".to_string(),
                "vp9".to_string(),
                "hevc".to_string(),
                "av01".to_string(),
            ],
            supported_audio_codecs: vec!["mp4a".to_string(), "opus".to_string()],
            cookie_browsers: vec![
                "firefox".to_string(),
                "chrome".to_string(),
                "safari".to_string(),
            ],
            page_size: 20,
            search_debounce_ms: 350,
            format_cache_ttl_minutes: 180,
            image_memory_entries: 200,
            image_cache_max_age_days: 7,
            cache_dir: None,
            adaptive_upgrade: true,
        }
    }
}

impl Settings {
    /// Load settings from disk, then apply environment overrides
    pub fn load() -> Result<Self, AppError> {
        let path = settings_path()?;
        let mut settings = Self::load_from(&path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a specific file; missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            debug!("No settings file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
            AppError::ConfigError(format!("Invalid settings file {:?}: {}", path, e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Write settings as pretty JSON to the default location
    pub fn save(&self) -> Result<(), AppError> {
        let path = settings_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the rest of the program cannot work with
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_height < 144 {
            return Err(AppError::ConfigError(format!(
                "max_height must be at least 144, got {}",
                self.max_height
            )));
        }
        if self.page_size == 0 || self.page_size > 100 {
            return Err(AppError::ConfigError(
                "page_size must be between 1 and 100".to_string(),
            ));
        }
        if self.supported_video_codecs.is_empty() || self.supported_audio_codecs.is_empty() {
            return Err(AppError::ConfigError(
                "at least one video and one audio codec must be supported".to_string(),
            ));
        }
        if self.player.trim().is_empty() {
            return Err(AppError::ConfigError("player must not be empty".to_string()));
        }
        if !(0..=MAX_FORMAT_CACHE_TTL_MINUTES).contains(&self.format_cache_ttl_minutes) {
            return Err(AppError::ConfigError(format!(
                "format_cache_ttl_minutes must be between 0 and {}, got {}",
                MAX_FORMAT_CACHE_TTL_MINUTES, self.format_cache_ttl_minutes
            )));
        }
        if self.image_cache_max_age_days > MAX_IMAGE_CACHE_AGE_DAYS {
            return Err(AppError::ConfigError(format!(
                "image_cache_max_age_days must be at most {}, got {}",
                MAX_IMAGE_CACHE_AGE_DAYS, self.image_cache_max_age_days
            )));
        }
        Ok(())
    }

    /// Apply TUBEVIEW_* environment variables on top of the loaded values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TUBEVIEW_YTDLP") {
            if !path.trim().is_empty() {
                self.ytdlp_path = Some(path);
            }
        }

        if let Ok(player) = std::env::var("TUBEVIEW_PLAYER") {
            if !player.trim().is_empty() {
                self.player = player;
            }
        }

        if let Ok(height) = std::env::var("TUBEVIEW_MAX_HEIGHT") {
            match height.trim().trim_end_matches('p').parse::<u32>() {
                Ok(h) if h >= 144 => self.max_height = h,
                _ => warn!("Ignoring invalid TUBEVIEW_MAX_HEIGHT: {}", height),
            }
        }

        if let Ok(lang) = std::env::var("TUBEVIEW_AUDIO_LANG") {
            let lang = lang.trim();
            self.preferred_audio_language = if lang.is_empty() {
                None
            } else {
                Some(lang.to_string())
            };
        }

        if let Ok(browsers) = std::env::var("TUBEVIEW_COOKIE_BROWSERS") {
            self.cookie_browsers = browsers
                .split(',')
                .map(|b| b.trim().to_lowercase())
                .filter(|b| !b.is_empty())
                .collect();
        }
    }

    /// Directory holding the format cache and image files
    pub fn cache_root(&self) -> Result<PathBuf, AppError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(PathBuf::from(dir));
        }

        let mut path = dirs::cache_dir()
            .ok_or_else(|| AppError::PathError("Could not find cache directory".to_string()))?;
        path.push(PROGRAM_NAME);
        Ok(path)
    }
}

/// Path to the settings file
pub fn settings_path() -> Result<PathBuf, AppError> {
    let mut path = dirs::config_dir()
        .ok_or_else(|| AppError::PathError("Could not find config directory".to_string()))?;

    path.push(PROGRAM_NAME);
    path.push(SETTINGS_FILE);
    Ok(path)
}
