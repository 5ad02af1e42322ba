// src/main.rs

use clap::ArgMatches;
use colored::*;
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, LevelFilter};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tubeview::cli::build_cli;
use tubeview::config::Settings;
use tubeview::dependency_validator::validate_dependencies;
use tubeview::error::AppError;
use tubeview::extractor::Extractor;
use tubeview::feed::{ChannelViewModel, PlaylistViewModel, SearchViewModel, TrendingViewModel};
use tubeview::format_cache::FormatCache;
use tubeview::format_selector::{plan_playback, quality_options, SelectionPreferences};
use tubeview::image_cache::ImageCache;
use tubeview::models::{Playlist, Video};
use tubeview::playback::{MpvPlayer, PlaybackPhase, PlaybackSession};
use tubeview::utils::{
    extract_playlist_id, format_bytes, format_count, format_duration, format_upload_date,
    require_video_id, truncate_line,
};

const TITLE_WIDTH: usize = 60;

#[tokio::main]
async fn main() {
    init_logger();
    info!("tubeview starting up - version {}", env!("CARGO_PKG_VERSION"));

    let matches = build_cli().get_matches();

    if let Err(e) = run(&matches).await {
        error!("{}", e);
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(matches: &ArgMatches) -> Result<(), AppError> {
    let settings = Settings::load()?;
    debug!("Settings: {:?}", settings);

    match matches.subcommand() {
        Some(("deps", _)) => {
            validate_dependencies(&settings)?;
            Ok(())
        }
        Some(("cache", sub)) => run_cache(sub, &settings),
        Some((name, sub)) => {
            let extractor = Arc::new(Extractor::from_settings(&settings)?);
            match name {
                "search" => run_search(sub, extractor, &settings).await,
                "trending" => run_trending(sub, extractor, &settings).await,
                "channel" => run_channel(sub, extractor, &settings).await,
                "playlist" => run_playlist(sub, extractor, &settings).await,
                "info" => run_info(sub, &extractor).await,
                "formats" => run_formats(sub, &extractor, &settings).await,
                "play" => run_play(sub, extractor, &settings).await,
                "thumbnail" => run_thumbnail(sub, &extractor, &settings).await,
                other => Err(AppError::ValidationError(format!("Unknown command: {}", other))),
            }
        }
        None => Err(AppError::ValidationError("No command given".to_string())),
    }
}

fn page_of(sub: &ArgMatches) -> usize {
    sub.get_one::<usize>("page").copied().unwrap_or(1).max(1)
}

/// Skip forward so `load_more` lands on the requested page
async fn advance_to<F, Fut>(page: usize, mut load_more: F) -> Result<(), AppError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), AppError>>,
{
    for _ in 1..page {
        load_more().await?;
    }
    Ok(())
}

async fn run_search(sub: &ArgMatches, extractor: Arc<Extractor>, settings: &Settings) -> Result<(), AppError> {
    let query = sub
        .get_many::<String>("query")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let page = page_of(sub);

    let spinner = spinner(&format!("Searching for \"{}\"...", query));
    // No typing to debounce on the command line
    let model = SearchViewModel::new(extractor, settings.page_size, Duration::ZERO);
    model.set_query(&query);
    model.wait_pending().await;
    advance_to(page, || model.load_more()).await?;
    spinner.finish_and_clear();

    let state = model.state();
    if let Some(message) = state.error {
        return Err(AppError::General(message));
    }
    print_videos(&state.items, page, settings.page_size, state.has_more);
    Ok(())
}

async fn run_trending(sub: &ArgMatches, extractor: Arc<Extractor>, settings: &Settings) -> Result<(), AppError> {
    let page = page_of(sub);
    let spinner = spinner("Loading trending videos...");
    let model = TrendingViewModel::new(extractor, settings.page_size);
    model.refresh().await?;
    advance_to(page, || model.load_more()).await?;
    spinner.finish_and_clear();

    let state = model.state();
    print_videos(&state.items, page, settings.page_size, state.has_more);
    Ok(())
}

async fn run_channel(sub: &ArgMatches, extractor: Arc<Extractor>, settings: &Settings) -> Result<(), AppError> {
    let channel_ref = sub
        .get_one::<String>("channel")
        .ok_or_else(|| AppError::ValidationError("Channel is required".to_string()))?;
    let page = page_of(sub);
    let model = ChannelViewModel::new(extractor, channel_ref, settings.page_size);

    let spinner = spinner("Loading channel...");
    model.load().await?;

    if sub.get_flag("playlists") {
        model.load_playlists().await?;
        advance_to(page, || model.load_more_playlists()).await?;
    } else {
        advance_to(page, || model.load_more_videos()).await?;
    }
    spinner.finish_and_clear();

    if let Some(info) = model.info() {
        println!("{}", info.name.bright_cyan().bold());
        let mut details = vec![info.url()];
        if let Some(subs) = info.subscriber_count {
            details.push(format!("{} subscribers", format_count(subs)));
        }
        println!("{}\n", details.join(" | ").dimmed());
    }

    if sub.get_flag("playlists") {
        let state = model.playlists();
        print_playlists(&state.items, page, settings.page_size, state.has_more);
    } else {
        let state = model.videos();
        print_videos(&state.items, page, settings.page_size, state.has_more);
    }
    Ok(())
}

async fn run_playlist(sub: &ArgMatches, extractor: Arc<Extractor>, settings: &Settings) -> Result<(), AppError> {
    let input = sub
        .get_one::<String>("playlist")
        .ok_or_else(|| AppError::ValidationError("Playlist is required".to_string()))?;
    let playlist_id = extract_playlist_id(input)
        .ok_or_else(|| AppError::ValidationError(format!("Not a playlist ID or URL: {}", input)))?;
    let page = page_of(sub);

    let spinner = spinner("Loading playlist...");
    let model = PlaylistViewModel::new(extractor, &playlist_id, settings.page_size);
    model.refresh().await?;
    advance_to(page, || model.load_more()).await?;
    spinner.finish_and_clear();

    let state = model.state();
    print_videos(&state.items, page, settings.page_size, state.has_more);
    Ok(())
}

async fn run_info(sub: &ArgMatches, extractor: &Extractor) -> Result<(), AppError> {
    let video_id = video_id_of(sub)?;
    let spinner = spinner("Fetching video details...");
    let (video, formats) = extractor.video_details(&video_id).await?;
    spinner.finish_and_clear();

    println!("{}", video.title.bright_cyan().bold());
    println!("{}", video.watch_url());
    if let Some(channel) = &video.channel_name {
        println!("{}: {}", "Channel".green(), channel);
    }
    if video.is_live {
        println!("{}: {}", "Duration".green(), "LIVE".red());
    } else if let Some(duration) = video.duration_seconds {
        println!("{}: {}", "Duration".green(), format_duration(duration));
    }
    if let Some(views) = video.view_count {
        println!("{}: {}", "Views".green(), format_count(views));
    }
    if let Some(date) = video.upload_date.as_deref().and_then(format_upload_date) {
        println!("{}: {}", "Uploaded".green(), date);
    }
    println!("{}: {}", "Formats".green(), formats.len());
    if let Some(description) = &video.description {
        println!("\n{}", truncate_line(description, 400));
    }
    Ok(())
}

async fn run_formats(sub: &ArgMatches, extractor: &Extractor, settings: &Settings) -> Result<(), AppError> {
    let video_id = video_id_of(sub)?;
    let spinner = spinner("Fetching formats...");
    let (video, formats) = extractor.video_details(&video_id).await?;
    spinner.finish_and_clear();

    let prefs = SelectionPreferences::from_settings(settings);
    println!("{}", video.title.bright_cyan().bold());

    let options = quality_options(&formats, &prefs);
    if options.is_empty() {
        println!("{}", "No quality options for the supported codecs".yellow());
    }
    for option in &options {
        let size = option.filesize.map(format_bytes).unwrap_or_else(|| "?".to_string());
        let audio = option.audio_format_id.as_deref().unwrap_or("muxed");
        println!(
            "  {:<8} {:<5} {}+{:<6} {}",
            option.label.green(),
            option.vcodec,
            option.video_format_id,
            audio,
            size
        );
    }

    let plan = plan_playback(&formats, &prefs)?;
    if let Some(muxed) = &plan.muxed {
        println!(
            "\n{}: {} ({}p)",
            "Fast start".blue(),
            muxed.format_id,
            muxed.height.unwrap_or(0)
        );
    }
    if let Some(composed) = &plan.composed {
        println!("{}: {} ({}p)", "Upgrade".blue(), composed.selector(), composed.height());
    }
    Ok(())
}

async fn run_play(sub: &ArgMatches, extractor: Arc<Extractor>, settings: &Settings) -> Result<(), AppError> {
    let video_id = video_id_of(sub)?;
    let mut prefs = SelectionPreferences::from_settings(settings);
    if let Some(height) = sub.get_one::<u32>("quality") {
        prefs = prefs.with_max_height(*height);
    }

    let cache_root = settings.cache_root()?;
    let cache = Arc::new(Mutex::new(FormatCache::load(
        &cache_root,
        settings.format_cache_ttl_minutes,
    )?));

    let player = Arc::new(MpvPlayer::from_settings(settings));
    let session = PlaybackSession::new(extractor, player, prefs)
        .with_cache(Arc::clone(&cache))
        .with_adaptive_upgrade(settings.adaptive_upgrade && !sub.get_flag("no-upgrade"));

    let spinner = spinner("Resolving streams...");
    let started = session.start(&video_id).await;
    spinner.finish_and_clear();

    // Keep whatever was fetched even if playback failed
    if let Err(e) = cache.lock().unwrap().save() {
        debug!("Could not save format cache: {}", e);
    }
    started?;

    if let Some(video) = session.video() {
        println!("{} {}", "Playing".green().bold(), video.title);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping playback");
                session.stop().await?;
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                let phase = session.phase();
                if phase == PlaybackPhase::PlayingComposed || phase == PlaybackPhase::PlayingMuxed {
                    if !session.is_playing().await {
                        break;
                    }
                }
            }
        }
    }

    session.wait_for_upgrade().await;
    println!("{}", "Playback finished".blue());
    Ok(())
}

async fn run_thumbnail(sub: &ArgMatches, extractor: &Extractor, settings: &Settings) -> Result<(), AppError> {
    let video_id = video_id_of(sub)?;
    let spinner = spinner("Fetching thumbnail...");
    let (video, _) = extractor.video_details(&video_id).await?;
    let url = video
        .thumbnail_url
        .ok_or_else(|| AppError::General(format!("{} has no thumbnail", video_id)))?;

    let images = ImageCache::from_settings(settings)?;
    let bytes = images.get(&url).await?;
    spinner.finish_and_clear();

    println!(
        "{} ({})",
        images.path_for(&url).display(),
        format_bytes(bytes.len() as u64)
    );
    Ok(())
}

fn run_cache(sub: &ArgMatches, settings: &Settings) -> Result<(), AppError> {
    let root = settings.cache_root()?;
    let mut formats = FormatCache::load(&root, settings.format_cache_ttl_minutes)?;
    let images = ImageCache::from_settings(settings)?;

    match sub.subcommand_name() {
        Some("stats") => {
            let stats = images.stats()?;
            println!("{}: {}", "Cache directory".green(), root.display());
            println!("{}: {}", "Format lists".green(), formats.len());
            println!(
                "{}: {} ({})",
                "Images".green(),
                stats.disk_entries,
                format_bytes(stats.disk_bytes)
            );
        }
        Some("clear") => {
            formats.clear();
            formats.save()?;
            images.clear()?;
            println!("{}", "Caches cleared".green());
        }
        Some("prune") => {
            let removed_formats = formats.prune();
            formats.save()?;
            let removed_images = images.purge_expired()?;
            println!(
                "{} {} format lists and {} images",
                "Removed".green(),
                removed_formats,
                removed_images
            );
        }
        _ => return Err(AppError::ValidationError("Unknown cache command".to_string())),
    }
    Ok(())
}

fn video_id_of(sub: &ArgMatches) -> Result<String, AppError> {
    let input = sub
        .get_one::<String>("video")
        .ok_or_else(|| AppError::ValidationError("Video is required".to_string()))?;
    require_video_id(input)
}

fn print_videos(videos: &[Video], page: usize, page_size: usize, has_more: bool) {
    // The view model accumulates pages; show only the requested one
    let first = (page - 1) * page_size;
    if videos.len() <= first {
        println!("{}", "No videos found".yellow());
        return;
    }

    for (offset, video) in videos.iter().enumerate().skip(first) {
        let duration = if video.is_live {
            "LIVE".red().to_string()
        } else {
            video
                .duration_seconds
                .map(format_duration)
                .unwrap_or_else(|| "--:--".to_string())
        };
        let views = video
            .view_count
            .map(|v| format!("{} views", format_count(v)))
            .unwrap_or_default();

        println!(
            "{:>3}. {} {} [{}]",
            offset + 1,
            video.id.dimmed(),
            truncate_line(&video.title, TITLE_WIDTH),
            duration
        );
        println!(
            "     {} {}",
            video.channel_name.as_deref().unwrap_or("").cyan(),
            views.dimmed()
        );
    }

    if has_more {
        println!("\n{}", format!("More results: --page {}", page + 1).dimmed());
    }
}

fn print_playlists(playlists: &[Playlist], page: usize, page_size: usize, has_more: bool) {
    let first = (page - 1) * page_size;
    if playlists.len() <= first {
        println!("{}", "No playlists found".yellow());
        return;
    }

    for (offset, playlist) in playlists.iter().enumerate().skip(first) {
        let count = playlist
            .video_count
            .map(|c| format!("{} videos", c))
            .unwrap_or_default();
        println!(
            "{:>3}. {} {} {}",
            offset + 1,
            playlist.id.dimmed(),
            truncate_line(&playlist.title, TITLE_WIDTH),
            count.dimmed()
        );
    }

    if has_more {
        println!("\n{}", format!("More results: --page {}", page + 1).dimmed());
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn init_logger() {
    let mut builder = Builder::from_default_env();

    // Set the default level based on debug/release mode
    if cfg!(debug_assertions) {
        builder.filter_level(LevelFilter::Debug);
    } else {
        builder.filter_level(LevelFilter::Info);
    }

    // Timestamp, level, module, message
    builder.format(|buf, record| {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(
            buf,
            "[{} {} {}] {}",
            timestamp,
            record.level().to_string().to_uppercase(),
            record.module_path().unwrap_or("unknown"),
            record.args()
        )
    });

    // Allow override through RUST_LOG environment variable
    builder.parse_env("RUST_LOG");
    builder.init();
}
