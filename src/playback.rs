// src/playback.rs
// Fast start on a muxed stream, then a seamless move to separate video and audio tracks

use crate::config::Settings;
use crate::error::AppError;
use crate::extractor::Extractor;
use crate::format_cache::FormatCache;
use crate::format_selector::{plan_playback, quality_options, stream_urls_for_option, SelectionPreferences};
use crate::models::{FormatRecord, StreamUrls, Video, VideoFormatOption};
use crate::security::{detect_command_injection, validate_stream_url};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::process::{Child, Command as AsyncCommand};
use tokio::task::JoinHandle;

/// Something that plays stream URLs
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Replace whatever is playing with `urls`, starting `start_at` seconds in
    async fn load(&self, urls: &StreamUrls, start_at: f64, title: &str) -> Result<(), AppError>;
    /// Current playback position in seconds, None when nothing plays
    async fn position(&self) -> Option<f64>;
    async fn is_running(&self) -> bool;
    async fn stop(&self) -> Result<(), AppError>;
}

struct RunningPlayer {
    child: Child,
    launched: Instant,
    start_at: f64,
}

/// External player process (mpv by default)
///
/// Each load relaunches the process; the position is estimated from the
/// launch time plus the requested start offset.
pub struct MpvPlayer {
    program: PathBuf,
    extra_args: Vec<String>,
    running: Mutex<Option<RunningPlayer>>,
}

impl MpvPlayer {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>) -> Self {
        let extra_args = extra_args
            .into_iter()
            .filter(|arg| {
                let unsafe_arg = detect_command_injection(arg);
                if unsafe_arg {
                    warn!("Ignoring suspicious player argument: {}", arg);
                }
                !unsafe_arg
            })
            .collect();

        Self {
            program: program.into(),
            extra_args,
            running: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.player, settings.player_args.clone())
    }

    /// Arguments for one launch
    pub fn build_args(&self, urls: &StreamUrls, start_at: f64, title: &str) -> Result<Vec<String>, AppError> {
        let title: String = title.chars().filter(|c| !c.is_control()).collect();

        let mut args = self.extra_args.clone();
        args.push(format!("--force-media-title={}", title));
        if start_at > 0.0 {
            args.push(format!("--start={:.1}", start_at));
        }

        match urls {
            StreamUrls::Muxed { url } => {
                validate_stream_url(url)?;
                args.push("--".to_string());
                args.push(url.clone());
            }
            StreamUrls::Composed { video_url, audio_url } => {
                validate_stream_url(video_url)?;
                validate_stream_url(audio_url)?;
                args.push(format!("--audio-file={}", audio_url));
                args.push("--".to_string());
                args.push(video_url.clone());
            }
        }

        Ok(args)
    }

    fn kill_running(running: &mut Option<RunningPlayer>) {
        if let Some(mut previous) = running.take() {
            if let Err(e) = previous.child.start_kill() {
                debug!("Player already gone: {}", e);
            }
        }
    }
}

#[async_trait]
impl PlayerBackend for MpvPlayer {
    async fn load(&self, urls: &StreamUrls, start_at: f64, title: &str) -> Result<(), AppError> {
        let args = self.build_args(urls, start_at, title)?;
        let mut running = self.running.lock().unwrap();
        Self::kill_running(&mut running);

        info!(
            "Starting player ({}) at {:.1}s",
            if urls.is_composed() { "composed" } else { "muxed" },
            start_at
        );

        let child = AsyncCommand::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::PlayerError(format!("Failed to start {:?}: {}", self.program, e)))?;

        *running = Some(RunningPlayer {
            child,
            launched: Instant::now(),
            start_at,
        });
        Ok(())
    }

    async fn position(&self) -> Option<f64> {
        let running = self.running.lock().unwrap();
        running
            .as_ref()
            .map(|r| r.start_at + r.launched.elapsed().as_secs_f64())
    }

    async fn is_running(&self) -> bool {
        let mut running = self.running.lock().unwrap();
        match running.as_mut() {
            Some(r) => matches!(r.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn stop(&self) -> Result<(), AppError> {
        let mut running = self.running.lock().unwrap();
        Self::kill_running(&mut running);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackPhase {
    Idle,
    /// Fetching formats and choosing streams
    Resolving,
    PlayingMuxed,
    /// Muxed stream playing while the composed one is prepared
    Upgrading,
    PlayingComposed,
    Failed(String),
}

struct SessionState {
    phase: PlaybackPhase,
    video: Option<Video>,
    formats: Vec<FormatRecord>,
    options: Vec<VideoFormatOption>,
    current: Option<StreamUrls>,
    // Bumped on every start/stop so a late upgrade can tell it is stale
    token: u64,
}

/// Playback of one video at a time
pub struct PlaybackSession {
    extractor: Arc<Extractor>,
    player: Arc<dyn PlayerBackend>,
    cache: Option<Arc<Mutex<FormatCache>>>,
    prefs: SelectionPreferences,
    adaptive_upgrade: bool,
    state: Arc<Mutex<SessionState>>,
    upgrade: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackSession {
    pub fn new(extractor: Arc<Extractor>, player: Arc<dyn PlayerBackend>, prefs: SelectionPreferences) -> Self {
        Self {
            extractor,
            player,
            cache: None,
            prefs,
            adaptive_upgrade: true,
            state: Arc::new(Mutex::new(SessionState {
                phase: PlaybackPhase::Idle,
                video: None,
                formats: Vec::new(),
                options: Vec::new(),
                current: None,
                token: 0,
            })),
            upgrade: Mutex::new(None),
        }
    }

    pub fn with_cache(mut self, cache: Arc<Mutex<FormatCache>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_adaptive_upgrade(mut self, enabled: bool) -> Self {
        self.adaptive_upgrade = enabled;
        self
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.state.lock().unwrap().phase.clone()
    }

    pub fn video(&self) -> Option<Video> {
        self.state.lock().unwrap().video.clone()
    }

    /// Quality menu for the current video
    pub fn options(&self) -> Vec<VideoFormatOption> {
        self.state.lock().unwrap().options.clone()
    }

    pub fn current_streams(&self) -> Option<StreamUrls> {
        self.state.lock().unwrap().current.clone()
    }

    /// Resolve a video and start playing it
    pub async fn start(&self, video_id: &str) -> Result<(), AppError> {
        self.stop().await?;

        let token = {
            let mut state = self.state.lock().unwrap();
            state.token += 1;
            state.phase = PlaybackPhase::Resolving;
            state.token
        };

        match self.start_inner(video_id, token).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut state = self.state.lock().unwrap();
                if state.token == token {
                    state.phase = PlaybackPhase::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    async fn start_inner(&self, video_id: &str, token: u64) -> Result<(), AppError> {
        let (video, formats) = self.formats_for(video_id).await?;
        let plan = plan_playback(&formats, &self.prefs)?;
        let options = quality_options(&formats, &self.prefs);

        {
            let mut state = self.state.lock().unwrap();
            if state.token != token {
                return Err(AppError::Cancelled);
            }
            state.video = Some(video.clone());
            state.formats = formats;
            state.options = options;
        }

        if let Some(muxed) = plan.muxed_urls() {
            self.player.load(&muxed, 0.0, &video.title).await?;

            let upgrade_to = if self.adaptive_upgrade {
                plan.composed.as_ref().map(|c| c.selector())
            } else {
                None
            };

            let mut state = self.state.lock().unwrap();
            state.current = Some(muxed);
            match upgrade_to {
                Some(selector) => {
                    state.phase = PlaybackPhase::Upgrading;
                    drop(state);
                    self.spawn_upgrade(video, selector, token);
                }
                None => state.phase = PlaybackPhase::PlayingMuxed,
            }
            return Ok(());
        }

        // No muxed track: go straight to the composed pair
        let composed = plan
            .composed_urls()
            .ok_or_else(|| AppError::NoPlayableFormat(format!("no stream URL for {}", video.id)))?;
        self.player.load(&composed, 0.0, &video.title).await?;

        let mut state = self.state.lock().unwrap();
        state.current = Some(composed);
        state.phase = PlaybackPhase::PlayingComposed;
        Ok(())
    }

    async fn formats_for(&self, video_id: &str) -> Result<(Video, Vec<FormatRecord>), AppError> {
        if let Some(cache) = &self.cache {
            if let Some(entry) = cache.lock().unwrap().get(video_id) {
                debug!("Format cache hit for {}", video_id);
                return Ok((entry.video.clone(), entry.formats.clone()));
            }
        }

        let (video, formats) = self.extractor.video_details(video_id).await?;
        if let Some(cache) = &self.cache {
            cache.lock().unwrap().insert(video.clone(), formats.clone());
        }
        Ok((video, formats))
    }

    fn spawn_upgrade(&self, video: Video, selector: String, token: u64) {
        let extractor = Arc::clone(&self.extractor);
        let player = Arc::clone(&self.player);
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            match upgrade(&extractor, player.as_ref(), &state, &video, &selector, token).await {
                Ok(()) => info!("Upgraded {} to {}", video.id, selector),
                Err(AppError::Cancelled) => debug!("Upgrade of {} superseded", video.id),
                Err(e) => {
                    warn!("Staying on the muxed stream for {}: {}", video.id, e);
                    let mut state = state.lock().unwrap();
                    if state.token == token && state.phase == PlaybackPhase::Upgrading {
                        state.phase = PlaybackPhase::PlayingMuxed;
                    }
                }
            }
        });

        *self.upgrade.lock().unwrap() = Some(handle);
    }

    /// Wait until the background upgrade, if any, has finished
    pub async fn wait_for_upgrade(&self) {
        let handle = self.upgrade.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Switch to a quality menu entry at the current position
    pub async fn select_quality(&self, option: &VideoFormatOption) -> Result<(), AppError> {
        let (urls, title) = {
            let state = self.state.lock().unwrap();
            if matches!(state.phase, PlaybackPhase::Idle | PlaybackPhase::Failed(_)) {
                return Err(AppError::PlayerError("Nothing is playing".to_string()));
            }
            let video = state
                .video
                .as_ref()
                .ok_or_else(|| AppError::PlayerError("Nothing is playing".to_string()))?;
            (stream_urls_for_option(&state.formats, option)?, video.title.clone())
        };

        if let Some(handle) = self.upgrade.lock().unwrap().take() {
            handle.abort();
        }

        let position = self.player.position().await.unwrap_or(0.0);
        info!("Switching to {} at {:.1}s", option.label, position);
        self.player.load(&urls, position, &title).await?;

        let mut state = self.state.lock().unwrap();
        state.phase = if urls.is_composed() {
            PlaybackPhase::PlayingComposed
        } else {
            PlaybackPhase::PlayingMuxed
        };
        state.current = Some(urls);
        Ok(())
    }

    /// Stop playback and any pending upgrade
    pub async fn stop(&self) -> Result<(), AppError> {
        if let Some(handle) = self.upgrade.lock().unwrap().take() {
            handle.abort();
        }

        {
            let mut state = self.state.lock().unwrap();
            state.token += 1;
            state.phase = PlaybackPhase::Idle;
            state.current = None;
        }

        self.player.stop().await
    }

    pub async fn is_playing(&self) -> bool {
        self.player.is_running().await
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if let Ok(mut upgrade) = self.upgrade.lock() {
            if let Some(handle) = upgrade.take() {
                handle.abort();
            }
        }
    }
}

async fn upgrade(
    extractor: &Extractor,
    player: &dyn PlayerBackend,
    state: &Mutex<SessionState>,
    video: &Video,
    selector: &str,
    token: u64,
) -> Result<(), AppError> {
    let urls = extractor.resolve_stream_urls(&video.id, selector).await?;
    let composed = match urls.as_slice() {
        [video_url, audio_url] => StreamUrls::Composed {
            video_url: video_url.clone(),
            audio_url: audio_url.clone(),
        },
        _ => {
            return Err(AppError::NoPlayableFormat(format!(
                "expected 2 URLs for {}, got {}",
                selector,
                urls.len()
            )))
        }
    };

    if state.lock().unwrap().token != token {
        return Err(AppError::Cancelled);
    }

    let position = player.position().await.unwrap_or(0.0);
    player.load(&composed, position, &video.title).await?;

    let mut state = state.lock().unwrap();
    if state.token != token {
        return Err(AppError::Cancelled);
    }
    state.current = Some(composed);
    state.phase = PlaybackPhase::PlayingComposed;
    Ok(())
}
