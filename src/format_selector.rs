// src/format_selector.rs
// Ranking of the format list: which tracks to play and which qualities to offer

use crate::config::Settings;
use crate::error::AppError;
use crate::models::{FormatRecord, StreamUrls, VideoFormatOption};
use log::debug;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// yt-dlp marks the original audio track with this language_preference
const ORIGINAL_LANGUAGE_PREFERENCE: i64 = 10;
/// yt-dlp marks audio-description tracks at or below this value
const DESCRIPTIVE_LANGUAGE_PREFERENCE: i64 = -10;

/// What the player supports and what the user prefers
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPreferences {
    /// Resolution ceiling
    pub max_height: u32,
    /// Primary language subtag, lowercase
    pub preferred_audio_language: Option<String>,
    /// Codec families in preference order
    pub supported_video_codecs: Vec<String>,
    pub supported_audio_codecs: Vec<String>,
    pub avoid_dubs: bool,
}

impl Default for SelectionPreferences {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl SelectionPreferences {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_height: settings.max_height,
            preferred_audio_language: settings
                .preferred_audio_language
                .as_deref()
                .map(primary_subtag),
            supported_video_codecs: codec_families(&settings.supported_video_codecs),
            supported_audio_codecs: codec_families(&settings.supported_audio_codecs),
            avoid_dubs: settings.avoid_dubbed_audio,
        }
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = max_height;
        self
    }

    // Lower rank is better; None means unsupported
    fn video_codec_rank(&self, format: &FormatRecord) -> Option<usize> {
        let family = codec_family(format.vcodec.as_deref()?)?;
        self.supported_video_codecs.iter().position(|c| c == family)
    }

    fn audio_codec_rank(&self, format: &FormatRecord) -> Option<usize> {
        let family = codec_family(format.acodec.as_deref()?)?;
        self.supported_audio_codecs.iter().position(|c| c == family)
    }
}

/// Separate video and audio tracks played together
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPair {
    pub video: FormatRecord,
    pub audio: FormatRecord,
}

impl ComposedPair {
    pub fn height(&self) -> u32 {
        self.video.height.unwrap_or(0)
    }

    /// yt-dlp format selector for this pair
    pub fn selector(&self) -> String {
        format!("{}+{}", self.video.format_id, self.audio.format_id)
    }

    pub fn stream_urls(&self) -> Option<StreamUrls> {
        Some(StreamUrls::Composed {
            video_url: self.video.url.clone()?,
            audio_url: self.audio.url.clone()?,
        })
    }
}

/// Fast-start stream plus the optional upgrade target
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackPlan {
    pub muxed: Option<FormatRecord>,
    pub composed: Option<ComposedPair>,
}

impl PlaybackPlan {
    pub fn muxed_urls(&self) -> Option<StreamUrls> {
        let url = self.muxed.as_ref()?.url.clone()?;
        Some(StreamUrls::Muxed { url })
    }

    pub fn composed_urls(&self) -> Option<StreamUrls> {
        self.composed.as_ref()?.stream_urls()
    }

    /// Whether playback will switch streams after starting
    pub fn has_upgrade(&self) -> bool {
        self.muxed.is_some() && self.composed.is_some()
    }
}

/// Map a codec string (avc1.64001F, vp09.00.40.08, mp4a.40.2, ...) to its family
pub fn codec_family(codec: &str) -> Option<&'static str> {
    let lower = codec.trim().to_ascii_lowercase();
    let prefix = lower.split('.').next().unwrap_or("");

    match prefix {
        "avc1" | "avc3" | "h264" | "avc" => Some("avc1"),
        "vp09" | "vp9" => Some("vp9"),
        "vp8" => Some("vp8"),
        "av01" | "av1" => Some("av01"),
        "hev1" | "hvc1" | "h265" | "hevc" => Some("hevc"),
        "mp4a" | "aac" => Some("mp4a"),
        "opus" => Some("opus"),
        "vorbis" => Some("vorbis"),
        "ac-3" | "ac3" | "ec-3" | "eac3" => Some("ac3"),
        _ => None,
    }
}

/// Normalise configured codec names to families, dropping unknowns and duplicates
pub fn codec_families(codecs: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for codec in codecs {
        if let Some(family) = codec_family(codec) {
            if !out.iter().any(|f| f == family) {
                out.push(family.to_string());
            }
        }
    }
    out
}

/// Primary language subtag in lowercase: "en-US" -> "en"
pub fn primary_subtag(language: &str) -> String {
    language
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Best video-only track under the resolution ceiling
///
/// Falls back to the smallest supported track above the ceiling when nothing fits.
pub fn select_video_track(formats: &[FormatRecord], prefs: &SelectionPreferences) -> Option<FormatRecord> {
    let candidates: Vec<&FormatRecord> = formats
        .iter()
        .filter(|f| f.is_video_only() && f.is_streamable() && f.height.is_some())
        .filter(|f| prefs.video_codec_rank(f).is_some())
        .collect();

    let best = candidates
        .iter()
        .filter(|f| f.height.unwrap_or(0) <= prefs.max_height)
        .max_by(|a, b| compare_video(a, b, prefs))
        .or_else(|| {
            candidates
                .iter()
                .min_by(|a, b| a.height.cmp(&b.height).then_with(|| compare_video(b, a, prefs)))
        });

    best.map(|f| (*f).clone())
}

/// Best audio-only track after dub avoidance and language preference
pub fn select_audio_track(formats: &[FormatRecord], prefs: &SelectionPreferences) -> Option<FormatRecord> {
    let candidates: Vec<&FormatRecord> = formats
        .iter()
        .filter(|f| f.is_audio_only() && f.is_streamable())
        .filter(|f| prefs.audio_codec_rank(f).is_some())
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let original_language = candidates
        .iter()
        .find(|f| is_original(f))
        .and_then(|f| f.language.as_deref())
        .map(primary_subtag);

    let mut pool = keep_if_any(candidates, |f| !is_descriptive(f));

    if prefs.avoid_dubs {
        pool = keep_if_any(pool, |f| !is_dub(f, original_language.as_deref()));
    }

    if let Some(wanted) = &prefs.preferred_audio_language {
        pool = keep_if_any(pool, |f| {
            f.language
                .as_deref()
                .map(|l| primary_subtag(l) == *wanted)
                .unwrap_or(false)
        });
    }

    pool.into_iter()
        .max_by(|a, b| compare_audio(a, b, prefs))
        .cloned()
}

/// Best muxed (audio+video) track under the ceiling, for fast start
pub fn select_muxed_track(formats: &[FormatRecord], prefs: &SelectionPreferences) -> Option<FormatRecord> {
    let candidates: Vec<&FormatRecord> = formats
        .iter()
        .filter(|f| f.is_muxed() && f.is_streamable())
        .filter(|f| prefs.video_codec_rank(f).is_some() && prefs.audio_codec_rank(f).is_some())
        .collect();

    let by_height_then_bitrate = |a: &&&FormatRecord, b: &&&FormatRecord| {
        a.height
            .unwrap_or(0)
            .cmp(&b.height.unwrap_or(0))
            .then_with(|| a.bitrate().total_cmp(&b.bitrate()))
    };

    candidates
        .iter()
        .filter(|f| f.height.unwrap_or(0) <= prefs.max_height)
        .max_by(by_height_then_bitrate)
        .map(|f| (*f).clone())
}

/// Decide the fast-start stream and the upgrade target
pub fn plan_playback(formats: &[FormatRecord], prefs: &SelectionPreferences) -> Result<PlaybackPlan, AppError> {
    let muxed = select_muxed_track(formats, prefs);

    let composed = match (select_video_track(formats, prefs), select_audio_track(formats, prefs)) {
        (Some(video), Some(audio)) => Some(ComposedPair { video, audio }),
        _ => None,
    };

    // Only worth switching when the composed stream is sharper than the muxed one
    let composed = match (&muxed, composed) {
        (Some(m), Some(c)) if c.height() <= m.height.unwrap_or(0) => None,
        (_, c) => c,
    };

    if muxed.is_none() && composed.is_none() {
        return Err(AppError::NoPlayableFormat(format!(
            "none of {} formats match the supported codecs",
            formats.len()
        )));
    }

    debug!(
        "Playback plan: muxed={:?} composed={:?}",
        muxed.as_ref().map(|f| &f.format_id),
        composed.as_ref().map(|c| c.selector())
    );

    Ok(PlaybackPlan { muxed, composed })
}

/// Best composed pair at or below `height`, for a user quality override
pub fn composed_for_height(
    formats: &[FormatRecord],
    prefs: &SelectionPreferences,
    height: u32,
) -> Result<ComposedPair, AppError> {
    let capped = prefs.clone().with_max_height(height.min(prefs.max_height));
    match (select_video_track(formats, &capped), select_audio_track(formats, &capped)) {
        (Some(video), Some(audio)) => Ok(ComposedPair { video, audio }),
        _ => Err(AppError::NoPlayableFormat(format!("no separate tracks at {}p", height))),
    }
}

/// One menu entry per distinct height (and high frame rate), best first
pub fn quality_options(formats: &[FormatRecord], prefs: &SelectionPreferences) -> Vec<VideoFormatOption> {
    let audio = select_audio_track(formats, prefs);
    let mut best_per_key: BTreeMap<(u32, bool), &FormatRecord> = BTreeMap::new();

    if let Some(audio) = &audio {
        for format in formats
            .iter()
            .filter(|f| f.is_video_only() && f.is_streamable())
            .filter(|f| prefs.video_codec_rank(f).is_some())
            .filter(|f| matches!(f.height, Some(h) if h <= prefs.max_height))
        {
            let key = (format.height.unwrap_or(0), is_high_frame_rate(format));
            let replace = match best_per_key.get(&key) {
                Some(current) => compare_video(format, current, prefs) == Ordering::Greater,
                None => true,
            };
            if replace {
                best_per_key.insert(key, format);
            }
        }

        let mut options: Vec<VideoFormatOption> = best_per_key
            .values()
            .map(|video| option_for(video, Some(audio)))
            .collect();

        if !options.is_empty() {
            options.sort_by(|a, b| {
                b.height
                    .cmp(&a.height)
                    .then_with(|| b.fps.unwrap_or(0.0).total_cmp(&a.fps.unwrap_or(0.0)))
            });
            return options;
        }
    }

    // No composable pair: offer the muxed stream alone
    select_muxed_track(formats, prefs)
        .map(|m| vec![option_for(&m, None)])
        .unwrap_or_default()
}

/// Stream URLs for a quality menu entry
pub fn stream_urls_for_option(formats: &[FormatRecord], option: &VideoFormatOption) -> Result<StreamUrls, AppError> {
    let find = |id: &str| {
        formats
            .iter()
            .find(|f| f.format_id == id)
            .and_then(|f| f.url.clone())
            .ok_or_else(|| AppError::NoPlayableFormat(format!("format {} has no URL", id)))
    };

    let video_url = find(&option.video_format_id)?;
    match &option.audio_format_id {
        Some(audio_id) => Ok(StreamUrls::Composed {
            video_url,
            audio_url: find(audio_id)?,
        }),
        None => Ok(StreamUrls::Muxed { url: video_url }),
    }
}

fn option_for(video: &FormatRecord, audio: Option<&FormatRecord>) -> VideoFormatOption {
    let height = video.height.unwrap_or(0);
    let label = if is_high_frame_rate(video) {
        format!("{}p{}", height, video.fps.unwrap_or(0.0).round() as u32)
    } else {
        format!("{}p", height)
    };

    let filesize = match audio {
        Some(a) => match (video.filesize, a.filesize) {
            (Some(v), Some(s)) => Some(v + s),
            _ => None,
        },
        None => video.filesize,
    };

    VideoFormatOption {
        label,
        height,
        fps: video.fps,
        video_format_id: video.format_id.clone(),
        audio_format_id: audio.map(|a| a.format_id.clone()),
        vcodec: video
            .vcodec
            .as_deref()
            .and_then(codec_family)
            .unwrap_or("unknown")
            .to_string(),
        filesize,
    }
}

fn is_high_frame_rate(format: &FormatRecord) -> bool {
    format.fps.map(|fps| fps > 30.5).unwrap_or(false)
}

fn compare_video(a: &FormatRecord, b: &FormatRecord, prefs: &SelectionPreferences) -> Ordering {
    let rank = |f: &FormatRecord| prefs.video_codec_rank(f).unwrap_or(usize::MAX);

    a.height
        .unwrap_or(0)
        .cmp(&b.height.unwrap_or(0))
        // lower codec rank is preferred, so compare reversed
        .then_with(|| rank(b).cmp(&rank(a)))
        .then_with(|| a.fps.unwrap_or(0.0).total_cmp(&b.fps.unwrap_or(0.0)))
        .then_with(|| a.bitrate().total_cmp(&b.bitrate()))
}

fn compare_audio(a: &FormatRecord, b: &FormatRecord, prefs: &SelectionPreferences) -> Ordering {
    let rank = |f: &FormatRecord| prefs.audio_codec_rank(f).unwrap_or(usize::MAX);

    is_original(a)
        .cmp(&is_original(b))
        .then_with(|| a.audio_bitrate().total_cmp(&b.audio_bitrate()))
        // equal bitrate: earlier codec in the supported list wins
        .then_with(|| rank(b).cmp(&rank(a)))
}

fn note_contains(format: &FormatRecord, needle: &str) -> bool {
    format
        .format_note
        .as_deref()
        .map(|n| n.to_lowercase().contains(needle))
        .unwrap_or(false)
}

fn is_original(format: &FormatRecord) -> bool {
    note_contains(format, "original")
        || format
            .language_preference
            .map(|p| p >= ORIGINAL_LANGUAGE_PREFERENCE)
            .unwrap_or(false)
}

fn is_descriptive(format: &FormatRecord) -> bool {
    note_contains(format, "descriptive")
        || note_contains(format, "audio description")
        || format
            .language_preference
            .map(|p| p <= DESCRIPTIVE_LANGUAGE_PREFERENCE)
            .unwrap_or(false)
}

/// A track is a dub when labelled so, or when its language differs from the original's
fn is_dub(format: &FormatRecord, original_language: Option<&str>) -> bool {
    if note_contains(format, "dubbed") {
        return true;
    }
    if is_original(format) {
        return false;
    }
    match (original_language, format.language.as_deref()) {
        (Some(original), Some(lang)) => primary_subtag(lang) != original,
        _ => false,
    }
}

/// Apply a filter unless it would leave nothing
fn keep_if_any<'a, F>(pool: Vec<&'a FormatRecord>, keep: F) -> Vec<&'a FormatRecord>
where
    F: Fn(&FormatRecord) -> bool,
{
    let filtered: Vec<&FormatRecord> = pool.iter().copied().filter(|f| keep(*f)).collect();
    if filtered.is_empty() {
        pool
    } else {
        filtered
    }
}
