// src/extractor.rs
// Process wrapper around yt-dlp: builds argument lists, runs the tool and maps its JSON output

use crate::config::Settings;
use crate::dependency_validator::locate_ytdlp;
use crate::error::AppError;
use crate::models::{Channel, FormatRecord, Page, Playlist, Video};
use crate::security::{sanitize_command_arg, sanitize_search_query};
use crate::utils::{channel_url, require_video_id};
use async_trait::async_trait;
use log::{debug, info, trace, warn};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::process::Command as AsyncCommand;

const TRENDING_URL: &str = "https://www.youtube.com/feed/trending";
const SOCKET_TIMEOUT_SECS: &str = "15";

/// Captured result of one extractor invocation
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs an external program to completion and captures its output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, AppError>;
}

/// Runner backed by tokio::process
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ProcessOutput, AppError> {
        trace!("Running {:?} {:?}", program, args);

        // kill_on_drop lets an aborted task take its child process down with it
        let output = AsyncCommand::new(program)
            .args(args)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    AppError::MissingDependency(format!("{}", program.display()))
                } else {
                    AppError::IoError(e)
                }
            })?;

        Ok(ProcessOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Where yt-dlp takes its YouTube cookies from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookieSource {
    /// Anonymous request
    None,
    /// --cookies-from-browser <name>
    Browser(String),
}

impl CookieSource {
    pub fn args(&self) -> Vec<String> {
        match self {
            CookieSource::None => Vec::new(),
            CookieSource::Browser(name) => {
                vec!["--cookies-from-browser".to_string(), name.clone()]
            }
        }
    }

    /// Anonymous first, then each configured browser
    pub fn fallback_chain(browsers: &[String]) -> Vec<CookieSource> {
        let mut chain = vec![CookieSource::None];
        chain.extend(
            browsers
                .iter()
                .filter(|b| !b.trim().is_empty())
                .map(|b| CookieSource::Browser(b.trim().to_lowercase())),
        );
        chain
    }
}

/// Client for every metadata and stream query
pub struct Extractor {
    ytdlp: PathBuf,
    runner: Arc<dyn ProcessRunner>,
    cookie_sources: Vec<CookieSource>,
    // Index of the cookie source that last worked
    active_source: AtomicUsize,
}

impl Extractor {
    pub fn new(ytdlp: PathBuf, runner: Arc<dyn ProcessRunner>, cookie_sources: Vec<CookieSource>) -> Self {
        let cookie_sources = if cookie_sources.is_empty() {
            vec![CookieSource::None]
        } else {
            cookie_sources
        };

        Self {
            ytdlp,
            runner,
            cookie_sources,
            active_source: AtomicUsize::new(0),
        }
    }

    /// Build an extractor that runs the real yt-dlp binary
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let ytdlp = locate_ytdlp(settings)?;
        info!("Using yt-dlp at {:?}", ytdlp);
        Ok(Self::new(
            ytdlp,
            Arc::new(SystemRunner),
            CookieSource::fallback_chain(&settings.cookie_browsers),
        ))
    }

    /// The cookie source subsequent invocations start with
    pub fn active_cookie_source(&self) -> &CookieSource {
        let idx = self.active_source.load(Ordering::SeqCst);
        &self.cookie_sources[idx.min(self.cookie_sources.len() - 1)]
    }

    /// Search YouTube; page is 1-based
    pub async fn search(&self, query: &str, page: usize, page_size: usize) -> Result<Page<Video>, AppError> {
        let query = sanitize_search_query(query)?;
        if query.is_empty() {
            return Ok(Page::empty(page.max(1)));
        }

        let (page, page_size) = normalize_paging(page, page_size);
        let term = format!("ytsearch{}:{}", page * page_size, query);
        info!("Searching for \"{}\" (page {})", query, page);

        let entries = self.fetch_listing(&term, page, page_size).await?;
        Ok(video_page(&entries, page, page_size))
    }

    /// Trending feed
    pub async fn trending(&self, page: usize, page_size: usize) -> Result<Page<Video>, AppError> {
        let (page, page_size) = normalize_paging(page, page_size);
        let entries = self.fetch_listing(TRENDING_URL, page, page_size).await?;
        Ok(video_page(&entries, page, page_size))
    }

    /// Uploads tab of a channel
    pub async fn channel_videos(&self, channel_ref: &str, page: usize, page_size: usize) -> Result<Page<Video>, AppError> {
        let url = format!("{}/videos", channel_url(channel_ref)?);
        let (page, page_size) = normalize_paging(page, page_size);
        let entries = self.fetch_listing(&url, page, page_size).await?;
        Ok(video_page(&entries, page, page_size))
    }

    /// Playlists tab of a channel
    pub async fn channel_playlists(&self, channel_ref: &str, page: usize, page_size: usize) -> Result<Page<Playlist>, AppError> {
        let url = format!("{}/playlists", channel_url(channel_ref)?);
        let (page, page_size) = normalize_paging(page, page_size);
        let entries = self.fetch_listing(&url, page, page_size).await?;

        Ok(Page {
            items: entries.iter().filter_map(Playlist::from_json).collect(),
            page,
            has_more: entries.len() >= page_size,
        })
    }

    /// Channel header (name, handle, follower count)
    pub async fn channel_info(&self, channel_ref: &str) -> Result<Channel, AppError> {
        let url = channel_url(channel_ref)?;
        let args = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--playlist-items".to_string(),
            "0".to_string(),
            "--".to_string(),
            url.clone(),
        ];

        let stdout = self.run_with_fallback(args).await?;
        let json = parse_document(&stdout)?;
        Channel::from_json(&json)
            .ok_or_else(|| AppError::General(format!("No channel information for {}", url)))
    }

    /// Videos of a playlist
    pub async fn playlist_videos(&self, playlist_id: &str, page: usize, page_size: usize) -> Result<Page<Video>, AppError> {
        let playlist_id = sanitize_command_arg(playlist_id)?;
        let url = format!("https://www.youtube.com/playlist?list={}", playlist_id);
        let (page, page_size) = normalize_paging(page, page_size);
        let entries = self.fetch_listing(&url, page, page_size).await?;
        Ok(video_page(&entries, page, page_size))
    }

    /// Full metadata and the format list of one video
    pub async fn video_details(&self, video_id: &str) -> Result<(Video, Vec<FormatRecord>), AppError> {
        let video_id = require_video_id(video_id)?;
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let args = vec![
            "--dump-single-json".to_string(),
            "--no-playlist".to_string(),
            "--".to_string(),
            url,
        ];

        info!("Fetching formats for {}", video_id);
        let stdout = self.run_with_fallback(args).await?;
        let json = parse_document(&stdout)?;

        let video = Video::from_json(&json)
            .ok_or_else(|| AppError::General(format!("yt-dlp returned no metadata for {}", video_id)))?;
        let formats = FormatRecord::list_from_json(&json);
        debug!("{} formats for {}", formats.len(), video_id);

        Ok((video, formats))
    }

    /// Ask yt-dlp for the direct URLs of a format selector (e.g. "137+140")
    pub async fn resolve_stream_urls(&self, video_id: &str, format_selector: &str) -> Result<Vec<String>, AppError> {
        let video_id = require_video_id(video_id)?;
        let format_selector = sanitize_command_arg(format_selector)?;
        let args = vec![
            "-g".to_string(),
            "-f".to_string(),
            format_selector.clone(),
            "--no-playlist".to_string(),
            "--".to_string(),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ];

        let stdout = self.run_with_fallback(args).await?;
        let urls: Vec<String> = String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("http"))
            .map(|l| l.to_string())
            .collect();

        if urls.is_empty() {
            return Err(AppError::NoPlayableFormat(format!(
                "yt-dlp resolved no URL for format {}",
                format_selector
            )));
        }
        Ok(urls)
    }

    async fn fetch_listing(&self, target: &str, page: usize, page_size: usize) -> Result<Vec<Value>, AppError> {
        let args = vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--playlist-items".to_string(),
            playlist_items_range(page, page_size),
            "--".to_string(),
            target.to_string(),
        ];

        let stdout = self.run_with_fallback(args).await?;
        Ok(parse_json_lines(&stdout))
    }

    /// Run yt-dlp, moving to the next cookie source while failures look like sign-in walls
    async fn run_with_fallback(&self, args: Vec<String>) -> Result<Vec<u8>, AppError> {
        let start = self
            .active_source
            .load(Ordering::SeqCst)
            .min(self.cookie_sources.len() - 1);
        let mut last_error = None;

        for idx in start..self.cookie_sources.len() {
            let source = &self.cookie_sources[idx];
            let mut full_args = vec![
                "--ignore-config".to_string(),
                "--no-warnings".to_string(),
                "--socket-timeout".to_string(),
                SOCKET_TIMEOUT_SECS.to_string(),
            ];
            full_args.extend(source.args());
            full_args.extend(args.iter().cloned());

            debug!("yt-dlp attempt {} with cookie source {:?}", idx + 1, source);
            let output = self.runner.run(&self.ytdlp, &full_args).await?;

            if output.success {
                if idx != start {
                    info!("Cookie source {:?} worked, keeping it for this session", source);
                }
                self.active_source.store(idx, Ordering::SeqCst);
                return Ok(output.stdout);
            }

            let error = AppError::ExtractorFailed {
                code: output.code,
                message: stderr_message(&output.stderr),
            };

            if error.is_auth_related() && idx + 1 < self.cookie_sources.len() {
                warn!(
                    "yt-dlp needs authentication with {:?}, retrying with {:?}",
                    source,
                    self.cookie_sources[idx + 1]
                );
                last_error = Some(error);
                continue;
            }

            return Err(error);
        }

        Err(last_error.unwrap_or_else(|| AppError::General("No cookie source available".to_string())))
    }
}

/// 1-based inclusive item window for --playlist-items
pub fn playlist_items_range(page: usize, page_size: usize) -> String {
    let (page, page_size) = normalize_paging(page, page_size);
    let start = (page - 1) * page_size + 1;
    let end = page * page_size;
    format!("{}-{}", start, end)
}

/// Parse line-delimited JSON, skipping blank and malformed lines
pub fn parse_json_lines(stdout: &[u8]) -> Vec<Value> {
    let text = String::from_utf8_lossy(stdout);
    let mut values = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => values.push(value),
            Err(e) => debug!("Skipping malformed yt-dlp line: {}", e),
        }
    }

    values
}

/// Parse a whole-document JSON dump
pub fn parse_document(stdout: &[u8]) -> Result<Value, AppError> {
    let value: Value = serde_json::from_slice(stdout)?;
    Ok(value)
}

/// Last meaningful stderr line, without yt-dlp's "ERROR:" prefix
pub fn stderr_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let line = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.starts_with("WARNING:"))
        .last()
        .or_else(|| text.lines().map(str::trim).filter(|l| !l.is_empty()).last())
        .unwrap_or("unknown error");

    line.strip_prefix("ERROR:").unwrap_or(line).trim().to_string()
}

fn normalize_paging(page: usize, page_size: usize) -> (usize, usize) {
    (page.max(1), page_size.max(1))
}

fn video_page(entries: &[Value], page: usize, page_size: usize) -> Page<Video> {
    Page {
        items: entries.iter().filter_map(Video::from_json).collect(),
        page,
        has_more: entries.len() >= page_size,
    }
}
