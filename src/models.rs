// src/models.rs
// Records mapped from the extraction tool's JSON output

use serde::{Deserialize, Serialize};
use serde_json::Value;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// A single video as listed in search results, feeds or playlists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// YouTube video ID
    pub id: String,
    /// Video title
    pub title: String,
    /// Name of the uploading channel
    pub channel_name: Option<String>,
    /// ID of the uploading channel (UC...)
    pub channel_id: Option<String>,
    /// Length in seconds, absent for live streams and some flat entries
    pub duration_seconds: Option<f64>,
    /// View counter at extraction time
    pub view_count: Option<u64>,
    /// Upload date as YYYYMMDD
    pub upload_date: Option<String>,
    /// Best thumbnail URL the tool reported
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub is_live: bool,
}

impl Video {
    /// Build a video from one JSON object, returning None when it has no ID
    pub fn from_json(json: &Value) -> Option<Self> {
        let id = str_field(json, "id")?;
        if id.is_empty() {
            return None;
        }

        // Flat playlist entries for channels and playlists have "url" pointing elsewhere
        if let Some(kind) = json.get("ie_key").and_then(|v| v.as_str()) {
            if kind == "YoutubeTab" {
                return None;
            }
        }

        let title = str_field(json, "title")
            .or_else(|| str_field(json, "fulltitle"))
            .unwrap_or_else(|| "Untitled".to_string());

        let channel_name = str_field(json, "channel")
            .or_else(|| str_field(json, "uploader"))
            .filter(|s| !s.is_empty());

        let channel_id = str_field(json, "channel_id").or_else(|| str_field(json, "uploader_id"));

        let is_live = json
            .get("is_live")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
            || json.get("live_status").and_then(|v| v.as_str()) == Some("is_live");

        Some(Self {
            id,
            title,
            channel_name,
            channel_id,
            duration_seconds: json.get("duration").and_then(|v| v.as_f64()),
            view_count: json.get("view_count").and_then(|v| v.as_u64()),
            upload_date: str_field(json, "upload_date"),
            thumbnail_url: best_thumbnail(json),
            description: str_field(json, "description"),
            is_live,
        })
    }

    /// Canonical watch page URL
    pub fn watch_url(&self) -> String {
        format!("{}{}", WATCH_URL, self.id)
    }
}

/// A playlist as listed on a channel page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub channel_name: Option<String>,
    pub video_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl Playlist {
    pub fn from_json(json: &Value) -> Option<Self> {
        let id = str_field(json, "id")?;
        // Playlist IDs start with PL, OL, UU, FL, RD...; anything 11 chars is a video
        if id.len() <= 11 {
            return None;
        }

        Some(Self {
            id,
            title: str_field(json, "title").unwrap_or_else(|| "Untitled playlist".to_string()),
            channel_name: str_field(json, "channel").or_else(|| str_field(json, "uploader")),
            video_count: json
                .get("playlist_count")
                .or_else(|| json.get("video_count"))
                .and_then(|v| v.as_u64()),
            thumbnail_url: best_thumbnail(json),
        })
    }

    pub fn url(&self) -> String {
        format!("https://www.youtube.com/playlist?list={}", self.id)
    }
}

/// Channel header information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID (UC...)
    pub id: String,
    pub name: String,
    /// Handle including the leading @, when known
    pub handle: Option<String>,
    pub subscriber_count: Option<u64>,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl Channel {
    /// Build channel info from a single-document tab dump
    pub fn from_json(json: &Value) -> Option<Self> {
        let id = str_field(json, "channel_id").or_else(|| str_field(json, "id"))?;
        let name = str_field(json, "channel")
            .or_else(|| str_field(json, "uploader"))
            .or_else(|| str_field(json, "title"))
            .unwrap_or_else(|| id.clone());

        let handle = str_field(json, "uploader_id").filter(|h| h.starts_with('@'));

        Some(Self {
            id,
            name,
            handle,
            subscriber_count: json.get("channel_follower_count").and_then(|v| v.as_u64()),
            description: str_field(json, "description"),
            thumbnail_url: best_thumbnail(json),
        })
    }

    pub fn url(&self) -> String {
        match &self.handle {
            Some(handle) => format!("https://www.youtube.com/{}", handle),
            None => format!("https://www.youtube.com/channel/{}", self.id),
        }
    }
}

/// One encoding from the tool's "formats" array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatRecord {
    pub format_id: String,
    pub ext: String,
    /// Direct media URL, absent for some manifest-only entries
    pub url: Option<String>,
    /// Delivery protocol (https, m3u8_native, http_dash_segments, ...)
    pub protocol: Option<String>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    /// Total bitrate in kbit/s
    pub tbr: Option<f64>,
    /// Audio bitrate in kbit/s
    pub abr: Option<f64>,
    /// Video bitrate in kbit/s
    pub vbr: Option<f64>,
    pub filesize: Option<u64>,
    /// Audio language tag (en, en-US, de, ...)
    pub language: Option<String>,
    /// Higher means closer to the original audio; the tool uses 10 for the original track
    pub language_preference: Option<i64>,
    pub format_note: Option<String>,
}

impl FormatRecord {
    pub fn from_json(json: &Value) -> Option<Self> {
        let format_id = str_field(json, "format_id")?;

        Some(Self {
            format_id,
            ext: str_field(json, "ext").unwrap_or_default(),
            url: str_field(json, "url"),
            protocol: str_field(json, "protocol"),
            vcodec: str_field(json, "vcodec"),
            acodec: str_field(json, "acodec"),
            width: json.get("width").and_then(|v| v.as_u64()).map(|v| v as u32),
            height: json.get("height").and_then(|v| v.as_u64()).map(|v| v as u32),
            fps: json.get("fps").and_then(|v| v.as_f64()),
            tbr: json.get("tbr").and_then(|v| v.as_f64()),
            abr: json.get("abr").and_then(|v| v.as_f64()),
            vbr: json.get("vbr").and_then(|v| v.as_f64()),
            filesize: json
                .get("filesize")
                .and_then(|v| v.as_u64())
                .or_else(|| json.get("filesize_approx").and_then(|v| v.as_u64())),
            language: str_field(json, "language"),
            language_preference: json.get("language_preference").and_then(|v| v.as_i64()),
            format_note: str_field(json, "format_note"),
        })
    }

    /// Parse the "formats" array of a whole-document dump
    pub fn list_from_json(json: &Value) -> Vec<Self> {
        json.get("formats")
            .and_then(|v| v.as_array())
            .map(|formats| formats.iter().filter_map(Self::from_json).collect())
            .unwrap_or_default()
    }

    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    pub fn is_muxed(&self) -> bool {
        self.has_video() && self.has_audio()
    }

    pub fn is_video_only(&self) -> bool {
        self.has_video() && !self.has_audio()
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    /// A direct progressive URL the player can open without a manifest
    pub fn is_streamable(&self) -> bool {
        if self.url.is_none() {
            return false;
        }
        match self.protocol.as_deref() {
            None => true,
            Some(p) => p == "https" || p == "http",
        }
    }

    /// Best-effort bitrate used for ranking
    pub fn bitrate(&self) -> f64 {
        self.tbr
            .or(self.vbr)
            .or(self.abr)
            .unwrap_or(0.0)
    }

    pub fn audio_bitrate(&self) -> f64 {
        self.abr.or(self.tbr).unwrap_or(0.0)
    }
}

/// Entry of the user-facing quality menu
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFormatOption {
    /// Display label such as 1080p or 720p60
    pub label: String,
    pub height: u32,
    pub fps: Option<f64>,
    pub video_format_id: String,
    /// Paired audio track; None when the option is a muxed stream
    pub audio_format_id: Option<String>,
    pub vcodec: String,
    /// Combined size of the video and audio tracks when known
    pub filesize: Option<u64>,
}

/// URLs handed to the media player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamUrls {
    /// Single URL with audio and video
    Muxed { url: String },
    /// Separate tracks combined by the player
    Composed { video_url: String, audio_url: String },
}

impl StreamUrls {
    pub fn is_composed(&self) -> bool {
        matches!(self, StreamUrls::Composed { .. })
    }

    /// URL passed as the player's main input
    pub fn primary_url(&self) -> &str {
        match self {
            StreamUrls::Muxed { url } => url,
            StreamUrls::Composed { video_url, .. } => video_url,
        }
    }
}

/// One page of a paginated listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number
    pub page: usize,
    /// Whether requesting page + 1 may return more items
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty(page: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            has_more: false,
        }
    }
}

fn str_field(json: &Value, key: &str) -> Option<String> {
    json.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn codec_present(codec: Option<&str>) -> bool {
    match codec {
        Some(c) => !c.is_empty() && c != "none",
        None => false,
    }
}

/// Pick the widest thumbnail, falling back to the single "thumbnail" field
fn best_thumbnail(json: &Value) -> Option<String> {
    let from_list = json
        .get("thumbnails")
        .and_then(|v| v.as_array())
        .and_then(|thumbs| {
            thumbs
                .iter()
                .filter(|t| t.get("url").and_then(|u| u.as_str()).is_some())
                .max_by_key(|t| t.get("width").and_then(|w| w.as_u64()).unwrap_or(0))
        })
        .and_then(|t| t.get("url"))
        .and_then(|u| u.as_str())
        .map(|s| s.to_string());

    from_list.or_else(|| str_field(json, "thumbnail"))
}
