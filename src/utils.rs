// src/utils.rs

use crate::error::AppError;
use chrono::NaiveDate;
use humansize::{format_size, BINARY};
use once_cell::sync::Lazy;
use regex::Regex;

static VIDEO_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

static VIDEO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.|m\.|music\.)?(?:youtube\.com/(?:watch\?(?:.*&)?v=|shorts/|embed/|live/|v/)|youtu\.be/|youtube-nocookie\.com/embed/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

static PLAYLIST_PARAM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]list=([A-Za-z0-9_-]{12,64})").unwrap());

static PLAYLIST_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:PL|OL|UU|FL|RD|LL|WL)[A-Za-z0-9_-]{10,62}$").unwrap());

static CHANNEL_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{22}$").unwrap());

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@[A-Za-z0-9._-]{3,100}$").unwrap());

static CHANNEL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^https?://(?:www\.|m\.)?youtube\.com/((?:@[A-Za-z0-9._-]+)|(?:channel/UC[A-Za-z0-9_-]{22})|(?:c/[^/?#]+)|(?:user/[^/?#]+))",
    )
    .unwrap()
});

/// Extract the 11-character video ID from an ID or any common YouTube URL form
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if VIDEO_ID_RE.is_match(input) {
        return Some(input.to_string());
    }

    VIDEO_URL_RE
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Like `extract_video_id`, but as a validation step
pub fn require_video_id(input: &str) -> Result<String, AppError> {
    extract_video_id(input).ok_or_else(|| {
        AppError::ValidationError(format!("Not a YouTube video ID or URL: {}", input))
    })
}

/// Extract a playlist ID from a bare ID or a URL carrying list=
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();

    if PLAYLIST_ID_RE.is_match(input) {
        return Some(input.to_string());
    }

    PLAYLIST_PARAM_RE
        .captures(input)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Normalise a channel reference (@handle, UC... ID or channel URL) to its base URL
pub fn channel_url(reference: &str) -> Result<String, AppError> {
    let reference = reference.trim().trim_end_matches('/');

    if HANDLE_RE.is_match(reference) {
        return Ok(format!("https://www.youtube.com/{}", reference));
    }

    if CHANNEL_ID_RE.is_match(reference) {
        return Ok(format!("https://www.youtube.com/channel/{}", reference));
    }

    if let Some(path) = CHANNEL_URL_RE.captures(reference).and_then(|c| c.get(1)) {
        return Ok(format!("https://www.youtube.com/{}", path.as_str()));
    }

    Err(AppError::ValidationError(format!(
        "Not a YouTube channel handle, ID or URL: {}",
        reference
    )))
}

/// Format seconds as H:MM:SS or M:SS
pub fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--".to_string();
    }

    let total = seconds.round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

/// Compact view/subscriber counts: 950, 12K, 1.2M, 3.4B
pub fn format_count(count: u64) -> String {
    let scaled = |value: f64, suffix: &str| {
        if value < 10.0 {
            let text = format!("{:.1}", value);
            format!("{}{}", text.trim_end_matches(".0"), suffix)
        } else {
            format!("{}{}", value.floor() as u64, suffix)
        }
    };

    match count {
        0..=999 => count.to_string(),
        1_000..=999_999 => scaled(count as f64 / 1_000.0, "K"),
        1_000_000..=999_999_999 => scaled(count as f64 / 1_000_000.0, "M"),
        _ => scaled(count as f64 / 1_000_000_000.0, "B"),
    }
}

/// Human readable byte size
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// Turn the tool's YYYYMMDD upload date into YYYY-MM-DD
pub fn format_upload_date(date: &str) -> Option<String> {
    NaiveDate::parse_from_str(date, "%Y%m%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Collapse whitespace and cut a line to at most `max` characters
pub fn truncate_line(text: &str, max: usize) -> String {
    let single: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single.chars().count() <= max {
        return single;
    }
    let cut: String = single.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}
