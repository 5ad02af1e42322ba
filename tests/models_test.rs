// tests/models_test.rs
use serde_json::json;
use tubeview::models::{Channel, FormatRecord, Page, Playlist, StreamUrls, Video};

#[test]
fn test_video_from_flat_entry() {
    let entry = json!({
        "id": "dQw4w9WgXcQ",
        "title": "Never Gonna Give You Up",
        "uploader": "Rick Astley",
        "channel_id": "UCuAXFkgsw1L7xaCfnd5JJOw",
        "duration": 212.0,
        "view_count": 1_500_000_000u64,
        "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg",
    });

    let video = Video::from_json(&entry).unwrap();
    assert_eq!(video.channel_name.as_deref(), Some("Rick Astley"));
    assert_eq!(video.duration_seconds, Some(212.0));
    assert_eq!(
        video.thumbnail_url.as_deref(),
        Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/hqdefault.jpg")
    );
    assert!(!video.is_live);
    assert_eq!(video.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
}

#[test]
fn test_video_edge_cases() {
    // Channel and playlist links inside a listing are not videos
    let tab = json!({"id": "UCuAXFkgsw1L7xaCfnd5JJOw", "ie_key": "YoutubeTab", "title": "A channel"});
    assert!(Video::from_json(&tab).is_none());
    assert!(Video::from_json(&json!({"title": "no id"})).is_none());
    assert!(Video::from_json(&json!({"id": ""})).is_none());

    let live = Video::from_json(&json!({"id": "jfKfPfyJRdk", "live_status": "is_live"})).unwrap();
    assert!(live.is_live);
    assert_eq!(live.title, "Untitled");
    assert_eq!(live.duration_seconds, None);
}

#[test]
fn test_playlist_and_channel() {
    let playlist = Playlist::from_json(&json!({
        "id": "PLBCF2DAC6FFB574DE",
        "title": "Mix",
        "video_count": 25,
    }))
    .unwrap();
    assert_eq!(playlist.video_count, Some(25));
    assert_eq!(playlist.url(), "https://www.youtube.com/playlist?list=PLBCF2DAC6FFB574DE");
    assert!(Playlist::from_json(&json!({"id": "dQw4w9WgXcQ"})).is_none());

    let channel = Channel::from_json(&json!({
        "id": "UCuAXFkgsw1L7xaCfnd5JJOw",
        "title": "Rick Astley",
        "uploader_id": "UCuAXFkgsw1L7xaCfnd5JJOw",
    }))
    .unwrap();
    assert_eq!(channel.name, "Rick Astley");
    assert_eq!(channel.handle, None);
    assert_eq!(channel.url(), "https://www.youtube.com/channel/UCuAXFkgsw1L7xaCfnd5JJOw");
}

#[test]
fn test_format_record_kinds() {
    let formats = FormatRecord::list_from_json(&json!({
        "formats": [
            {"format_id": "18", "url": "https://x/18", "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "filesize_approx": 1000},
            {"format_id": "137", "url": "https://x/137", "vcodec": "avc1.640028", "acodec": "none", "protocol": "https"},
            {"format_id": "140", "url": "https://x/140", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5},
            {"format_id": "sb0", "url": "https://x/sb", "vcodec": "none", "acodec": "none", "protocol": "mhtml"},
            {"format_id": "hls", "url": "https://x/hls.m3u8", "vcodec": "avc1", "acodec": "mp4a", "protocol": "m3u8_native"},
            {"url": "https://x/no-id"}
        ]
    }));
    assert_eq!(formats.len(), 5);

    assert!(formats[0].is_muxed());
    assert_eq!(formats[0].filesize, Some(1000));
    assert!(formats[1].is_video_only());
    assert!(formats[2].is_audio_only());
    assert_eq!(formats[2].audio_bitrate(), 129.5);

    // Storyboards carry neither track
    assert!(!formats[3].has_video() && !formats[3].has_audio());
    assert!(formats[0].is_streamable());
    assert!(!formats[4].is_streamable());

    assert!(FormatRecord::list_from_json(&json!({"id": "x"})).is_empty());
}

#[test]
fn test_stream_urls_and_pages() {
    let composed = StreamUrls::Composed {
        video_url: "https://v".to_string(),
        audio_url: "https://a".to_string(),
    };
    assert!(composed.is_composed());
    assert_eq!(composed.primary_url(), "https://v");

    let empty: Page<Video> = Page::empty(3);
    assert_eq!(empty.page, 3);
    assert!(empty.items.is_empty());
    assert!(!empty.has_more);
}
