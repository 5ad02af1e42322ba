// tests/common/mod.rs
// Fakes for the process and player seams
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tubeview::error::AppError;
use tubeview::extractor::{CookieSource, Extractor, ProcessOutput, ProcessRunner};
use tubeview::models::StreamUrls;
use tubeview::playback::PlayerBackend;

type Responder = Box<dyn Fn(&[String]) -> ProcessOutput + Send + Sync>;

/// Records every invocation and answers with a canned response
pub struct MockRunner {
    calls: Mutex<Vec<Vec<String>>>,
    respond: Responder,
}

impl MockRunner {
    pub fn new(respond: impl Fn(&[String]) -> ProcessOutput + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_with(&self, flag: &str) -> usize {
        self.calls()
            .iter()
            .filter(|args| args.iter().any(|a| a == flag))
            .count()
    }
}

#[async_trait]
impl ProcessRunner for MockRunner {
    async fn run(&self, _program: &Path, args: &[String]) -> Result<ProcessOutput, AppError> {
        self.calls.lock().unwrap().push(args.to_vec());
        Ok((self.respond)(args))
    }
}

pub fn ok(stdout: &str) -> ProcessOutput {
    ProcessOutput {
        success: true,
        code: Some(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

pub fn fail(stderr: &str) -> ProcessOutput {
    ProcessOutput {
        success: false,
        code: Some(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

pub fn has(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub fn extractor(runner: Arc<MockRunner>) -> Extractor {
    Extractor::new(
        PathBuf::from("yt-dlp"),
        runner,
        CookieSource::fallback_chain(&["firefox".to_string(), "chrome".to_string()]),
    )
}

/// Flat listing lines for `count` videos starting at `first`
pub fn video_lines(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| {
            serde_json::json!({
                "id": format!("vid{:08}", i),
                "title": format!("Video {}", i),
                "channel": "Test Channel",
                "duration": 60.0 + i as f64,
                "view_count": 1000 * i,
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whole-document dump with a 360p muxed stream and 1080p/720p composable tracks
pub fn details_json(video_id: &str) -> String {
    serde_json::json!({
        "id": video_id,
        "title": "Big Buck Bunny",
        "channel": "Blender",
        "channel_id": "UCSMOQeBJ2RAnuFungnQOxLg",
        "duration": 596,
        "view_count": 1234567,
        "upload_date": "20140522",
        "thumbnails": [
            {"url": "https://i.ytimg.com/vi/x/default.jpg", "width": 120},
            {"url": "https://i.ytimg.com/vi/x/maxresdefault.jpg", "width": 1280}
        ],
        "formats": [
            {"format_id": "18", "ext": "mp4", "protocol": "https", "url": "https://media.example.com/18",
             "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "fps": 30, "tbr": 500.0},
            {"format_id": "136", "ext": "mp4", "protocol": "https", "url": "https://media.example.com/136",
             "vcodec": "avc1.4d401f", "acodec": "none", "height": 720, "fps": 30, "tbr": 2500.0},
            {"format_id": "137", "ext": "mp4", "protocol": "https", "url": "https://media.example.com/137",
             "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 30, "tbr": 4500.0},
            {"format_id": "140", "ext": "m4a", "protocol": "https", "url": "https://media.example.com/140",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.0, "language": "en"},
            {"format_id": "hls-1080", "ext": "mp4", "protocol": "m3u8_native",
             "url": "https://manifest.example.com/hls.m3u8",
             "vcodec": "avc1.640028", "acodec": "mp4a.40.2", "height": 1080}
        ]
    })
    .to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadCall {
    pub urls: StreamUrls,
    pub start_at: f64,
    pub title: String,
}

/// Player that remembers what it was asked to play
pub struct MockPlayer {
    pub loads: Mutex<Vec<LoadCall>>,
    pub running: Mutex<bool>,
    pub stops: Mutex<usize>,
    pub position: f64,
}

impl MockPlayer {
    pub fn new(position: f64) -> Arc<Self> {
        Arc::new(Self {
            loads: Mutex::new(Vec::new()),
            running: Mutex::new(false),
            stops: Mutex::new(0),
            position,
        })
    }

    pub fn loads(&self) -> Vec<LoadCall> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlayerBackend for MockPlayer {
    async fn load(&self, urls: &StreamUrls, start_at: f64, title: &str) -> Result<(), AppError> {
        self.loads.lock().unwrap().push(LoadCall {
            urls: urls.clone(),
            start_at,
            title: title.to_string(),
        });
        *self.running.lock().unwrap() = true;
        Ok(())
    }

    async fn position(&self) -> Option<f64> {
        if *self.running.lock().unwrap() {
            Some(self.position)
        } else {
            None
        }
    }

    async fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    async fn stop(&self) -> Result<(), AppError> {
        *self.running.lock().unwrap() = false;
        *self.stops.lock().unwrap() += 1;
        Ok(())
    }
}
