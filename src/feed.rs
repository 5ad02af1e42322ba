// src/feed.rs
// Paginated listings and the view models built on them

use crate::config::Settings;
use crate::error::AppError;
use crate::extractor::Extractor;
use crate::models::{Channel, Page, Playlist, Video};
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Anything that can produce numbered pages of items
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    /// Fetch a 1-based page
    async fn fetch(&self, page: usize) -> Result<Page<T>, AppError>;
}

/// Snapshot of a feed for display
#[derive(Debug, Clone, PartialEq)]
pub struct FeedState<T> {
    pub items: Vec<T>,
    /// Page requested by the next `load_more`
    pub next_page: usize,
    pub has_more: bool,
    pub is_loading: bool,
    /// Message of the last failed load
    pub error: Option<String>,
    /// Bumped whenever earlier results become stale
    pub generation: u64,
}

impl<T> Default for FeedState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page: 1,
            has_more: false,
            is_loading: false,
            error: None,
            generation: 0,
        }
    }
}

/// Paginated list with refresh and append
pub struct Feed<T> {
    source: Mutex<Arc<dyn PageSource<T>>>,
    state: Mutex<FeedState<T>>,
}

impl<T: Clone + Send + 'static> Feed<T> {
    pub fn new(source: Arc<dyn PageSource<T>>) -> Self {
        Self {
            source: Mutex::new(source),
            state: Mutex::new(FeedState::default()),
        }
    }

    pub fn state(&self) -> FeedState<T> {
        self.state.lock().unwrap().clone()
    }

    /// Swap the source; results still in flight from the old one are discarded
    pub fn replace_source(&self, source: Arc<dyn PageSource<T>>) {
        *self.source.lock().unwrap() = source;
        self.state.lock().unwrap().generation += 1;
    }

    /// Forget everything and stop accepting in-flight results
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        let generation = state.generation + 1;
        *state = FeedState {
            generation,
            ..FeedState::default()
        };
    }

    /// Load page 1, replacing the current items
    ///
    /// Returns `Cancelled` when a newer refresh or reset superseded this one.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let generation = {
            let mut state = self.state.lock().unwrap();
            state.generation += 1;
            state.is_loading = true;
            state.error = None;
            state.generation
        };

        let source = Arc::clone(&*self.source.lock().unwrap());
        let result = source.fetch(1).await;

        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            debug!("Discarding stale page 1 (generation {})", generation);
            return Err(AppError::Cancelled);
        }

        state.is_loading = false;
        match result {
            Ok(page) => {
                state.items = page.items;
                state.next_page = page.page + 1;
                state.has_more = page.has_more;
                Ok(())
            }
            Err(e) => {
                state.items.clear();
                state.has_more = false;
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Append the next page
    ///
    /// Ignored while any load is running or when the listing is exhausted, so
    /// repeated scroll-to-bottom triggers collapse into one request.
    pub async fn load_more(&self) -> Result<(), AppError> {
        let (generation, page) = {
            let mut state = self.state.lock().unwrap();
            if state.is_loading || !state.has_more {
                return Ok(());
            }
            state.is_loading = true;
            state.error = None;
            (state.generation, state.next_page)
        };

        let source = Arc::clone(&*self.source.lock().unwrap());
        let result = source.fetch(page).await;

        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            debug!("Discarding stale page {} (generation {})", page, generation);
            return Err(AppError::Cancelled);
        }

        state.is_loading = false;
        match result {
            Ok(fetched) => {
                state.items.extend(fetched.items);
                state.next_page = page + 1;
                state.has_more = fetched.has_more;
                Ok(())
            }
            Err(e) => {
                // Keep what is already shown; the next scroll retries this page
                state.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

/// Video listings served by the extractor
pub enum VideoListing {
    Search(String),
    Trending,
    ChannelVideos(String),
    PlaylistVideos(String),
}

pub struct ExtractorVideoSource {
    extractor: Arc<Extractor>,
    listing: VideoListing,
    page_size: usize,
}

impl ExtractorVideoSource {
    pub fn new(extractor: Arc<Extractor>, listing: VideoListing, page_size: usize) -> Self {
        Self {
            extractor,
            listing,
            page_size,
        }
    }
}

#[async_trait]
impl PageSource<Video> for ExtractorVideoSource {
    async fn fetch(&self, page: usize) -> Result<Page<Video>, AppError> {
        match &self.listing {
            VideoListing::Search(query) => self.extractor.search(query, page, self.page_size).await,
            VideoListing::Trending => self.extractor.trending(page, self.page_size).await,
            VideoListing::ChannelVideos(channel) => {
                self.extractor
                    .channel_videos(channel, page, self.page_size)
                    .await
            }
            VideoListing::PlaylistVideos(id) => {
                self.extractor
                    .playlist_videos(id, page, self.page_size)
                    .await
            }
        }
    }
}

pub struct ChannelPlaylistSource {
    extractor: Arc<Extractor>,
    channel_ref: String,
    page_size: usize,
}

#[async_trait]
impl PageSource<Playlist> for ChannelPlaylistSource {
    async fn fetch(&self, page: usize) -> Result<Page<Playlist>, AppError> {
        self.extractor
            .channel_playlists(&self.channel_ref, page, self.page_size)
            .await
    }
}

/// Search-as-you-type
pub struct SearchViewModel {
    extractor: Arc<Extractor>,
    feed: Arc<Feed<Video>>,
    page_size: usize,
    debounce: Duration,
    query: Mutex<String>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchViewModel {
    pub fn new(extractor: Arc<Extractor>, page_size: usize, debounce: Duration) -> Self {
        let initial = ExtractorVideoSource::new(
            Arc::clone(&extractor),
            VideoListing::Search(String::new()),
            page_size,
        );
        Self {
            extractor,
            feed: Arc::new(Feed::new(Arc::new(initial) as Arc<dyn PageSource<Video>>)),
            page_size,
            debounce,
            query: Mutex::new(String::new()),
            pending: Mutex::new(None),
        }
    }

    pub fn from_settings(extractor: Arc<Extractor>, settings: &Settings) -> Self {
        Self::new(
            extractor,
            settings.page_size,
            Duration::from_millis(settings.search_debounce_ms),
        )
    }

    pub fn query(&self) -> String {
        self.query.lock().unwrap().clone()
    }

    pub fn state(&self) -> FeedState<Video> {
        self.feed.state()
    }

    /// Update the query text
    ///
    /// Cancels the search in flight, then searches after the debounce interval.
    /// An empty query clears the results at once. Must be called inside a
    /// Tokio runtime.
    pub fn set_query(&self, text: &str) {
        let text = text.trim().to_string();
        {
            let mut query = self.query.lock().unwrap();
            if *query == text {
                return;
            }
            *query = text.clone();
        }

        if let Some(handle) = self.pending.lock().unwrap().take() {
            handle.abort();
        }

        if text.is_empty() {
            self.feed.reset();
            return;
        }

        let feed = Arc::clone(&self.feed);
        let source = Arc::new(ExtractorVideoSource::new(
            Arc::clone(&self.extractor),
            VideoListing::Search(text.clone()),
            self.page_size,
        ));
        let debounce = self.debounce;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            feed.replace_source(source);
            match feed.refresh().await {
                Ok(()) | Err(AppError::Cancelled) => {}
                Err(e) => warn!("Search for \"{}\" failed: {}", text, e),
            }
        });

        *self.pending.lock().unwrap() = Some(handle);
    }

    /// Wait for the debounced search, if any, to finish
    pub async fn wait_pending(&self) {
        let handle = self.pending.lock().unwrap().take();
        if let Some(handle) = handle {
            // An aborted task is the expected outcome of a superseded query
            let _ = handle.await;
        }
    }

    pub async fn load_more(&self) -> Result<(), AppError> {
        self.feed.load_more().await
    }
}

impl Drop for SearchViewModel {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }
}

/// Header, uploads and playlists of one channel
pub struct ChannelViewModel {
    extractor: Arc<Extractor>,
    channel_ref: String,
    info: Mutex<Option<Channel>>,
    videos: Feed<Video>,
    playlists: Feed<Playlist>,
}

impl ChannelViewModel {
    pub fn new(extractor: Arc<Extractor>, channel_ref: &str, page_size: usize) -> Self {
        let videos = Feed::new(Arc::new(ExtractorVideoSource::new(
            Arc::clone(&extractor),
            VideoListing::ChannelVideos(channel_ref.to_string()),
            page_size,
        )) as Arc<dyn PageSource<Video>>);
        let playlists = Feed::new(Arc::new(ChannelPlaylistSource {
            extractor: Arc::clone(&extractor),
            channel_ref: channel_ref.to_string(),
            page_size,
        }) as Arc<dyn PageSource<Playlist>>);

        Self {
            extractor,
            channel_ref: channel_ref.to_string(),
            info: Mutex::new(None),
            videos,
            playlists,
        }
    }

    /// Fetch the header and the first page of uploads together
    pub async fn load(&self) -> Result<(), AppError> {
        let (info, videos) = tokio::join!(
            self.extractor.channel_info(&self.channel_ref),
            self.videos.refresh()
        );

        *self.info.lock().unwrap() = Some(info?);
        videos
    }

    /// Playlists tab, loaded on demand
    pub async fn load_playlists(&self) -> Result<(), AppError> {
        self.playlists.refresh().await
    }

    pub async fn load_more_videos(&self) -> Result<(), AppError> {
        self.videos.load_more().await
    }

    pub async fn load_more_playlists(&self) -> Result<(), AppError> {
        self.playlists.load_more().await
    }

    pub fn info(&self) -> Option<Channel> {
        self.info.lock().unwrap().clone()
    }

    pub fn videos(&self) -> FeedState<Video> {
        self.videos.state()
    }

    pub fn playlists(&self) -> FeedState<Playlist> {
        self.playlists.state()
    }
}

pub struct PlaylistViewModel {
    playlist_id: String,
    feed: Feed<Video>,
}

impl PlaylistViewModel {
    pub fn new(extractor: Arc<Extractor>, playlist_id: &str, page_size: usize) -> Self {
        Self {
            playlist_id: playlist_id.to_string(),
            feed: Feed::new(Arc::new(ExtractorVideoSource::new(
                extractor,
                VideoListing::PlaylistVideos(playlist_id.to_string()),
                page_size,
            )) as Arc<dyn PageSource<Video>>),
        }
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        self.feed.refresh().await
    }

    pub async fn load_more(&self) -> Result<(), AppError> {
        self.feed.load_more().await
    }

    pub fn state(&self) -> FeedState<Video> {
        self.feed.state()
    }
}

pub struct TrendingViewModel {
    feed: Feed<Video>,
}

impl TrendingViewModel {
    pub fn new(extractor: Arc<Extractor>, page_size: usize) -> Self {
        Self {
            feed: Feed::new(Arc::new(ExtractorVideoSource::new(
                extractor,
                VideoListing::Trending,
                page_size,
            )) as Arc<dyn PageSource<Video>>),
        }
    }

    pub async fn refresh(&self) -> Result<(), AppError> {
        self.feed.refresh().await
    }

    pub async fn load_more(&self) -> Result<(), AppError> {
        self.feed.load_more().await
    }

    pub fn state(&self) -> FeedState<Video> {
        self.feed.state()
    }
}
