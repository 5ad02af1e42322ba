// tests/format_selector_test.rs
use tubeview::error::AppError;
use tubeview::format_selector::{
    codec_family, codec_families, composed_for_height, plan_playback, primary_subtag, quality_options,
    select_audio_track, select_muxed_track, select_video_track, stream_urls_for_option,
    SelectionPreferences,
};
use tubeview::models::{FormatRecord, StreamUrls};

fn base(id: &str) -> FormatRecord {
    FormatRecord {
        format_id: id.to_string(),
        ext: "mp4".to_string(),
        url: Some(format!("https://media.example.com/{}", id)),
        protocol: Some("https".to_string()),
        vcodec: None,
        acodec: None,
        width: None,
        height: None,
        fps: None,
        tbr: None,
        abr: None,
        vbr: None,
        filesize: None,
        language: None,
        language_preference: None,
        format_note: None,
    }
}

fn video(id: &str, vcodec: &str, height: u32, fps: f64, tbr: f64) -> FormatRecord {
    FormatRecord {
        vcodec: Some(vcodec.to_string()),
        acodec: Some("none".to_string()),
        height: Some(height),
        fps: Some(fps),
        tbr: Some(tbr),
        ..base(id)
    }
}

fn audio(id: &str, acodec: &str, abr: f64, language: Option<&str>, preference: Option<i64>) -> FormatRecord {
    FormatRecord {
        vcodec: Some("none".to_string()),
        acodec: Some(acodec.to_string()),
        abr: Some(abr),
        language: language.map(|l| l.to_string()),
        language_preference: preference,
        ..base(id)
    }
}

fn muxed(id: &str, height: u32) -> FormatRecord {
    FormatRecord {
        vcodec: Some("avc1.42001E".to_string()),
        acodec: Some("mp4a.40.2".to_string()),
        height: Some(height),
        fps: Some(30.0),
        tbr: Some(500.0),
        ..base(id)
    }
}

fn typical_formats() -> Vec<FormatRecord> {
    vec![
        muxed("18", 360),
        video("134", "avc1.4d401e", 360, 30.0, 600.0),
        video("136", "avc1.4d401f", 720, 30.0, 2500.0),
        video("247", "vp09.00.31.08", 720, 30.0, 2000.0),
        video("298", "avc1.4d4020", 720, 60.0, 3500.0),
        video("137", "avc1.640028", 1080, 30.0, 4500.0),
        video("401", "av01.0.12M.08", 2160, 30.0, 18000.0),
        audio("140", "mp4a.40.2", 129.0, Some("en"), None),
        audio("251", "opus", 118.0, Some("en"), None),
    ]
}

#[test]
fn test_codec_family() {
    assert_eq!(codec_family("avc1.640028"), Some("avc1"));
    assert_eq!(codec_family("vp09.00.40.08"), Some("vp9"));
    assert_eq!(codec_family("VP9"), Some("vp9"));
    assert_eq!(codec_family("hvc1.1.6.L120"), Some("hevc"));
    assert_eq!(codec_family("av01.0.08M.08"), Some("av01"));
    assert_eq!(codec_family("mp4a.40.2"), Some("mp4a"));
    assert_eq!(codec_family("opus"), Some("opus"));
    assert_eq!(codec_family("none"), None);

    let families = codec_families(&[
        "avc1.64001F".to_string(),
        "h264".to_string(),
        "weird".to_string(),
        "vp9".to_string(),
    ]);
    assert_eq!(families, vec!["avc1", "vp9"]);

    assert_eq!(primary_subtag("en-US"), "en");
    assert_eq!(primary_subtag("pt_BR"), "pt");
    assert_eq!(primary_subtag("DE"), "de");
}

#[test]
fn test_video_track_respects_ceiling() {
    let formats = typical_formats();
    let prefs = SelectionPreferences::default();

    // 2160p exceeds the default 1080 ceiling
    let chosen = select_video_track(&formats, &prefs).unwrap();
    assert_eq!(chosen.format_id, "137");

    let chosen = select_video_track(&formats, &prefs.clone().with_max_height(720)).unwrap();
    // Same height: avc1 preferred over vp9, then 60fps over 30fps
    assert_eq!(chosen.format_id, "298");
}

#[test]
fn test_video_track_codec_preference() {
    let formats = vec![
        video("247", "vp09.00.31.08", 720, 30.0, 2000.0),
        video("136", "avc1.4d401f", 720, 30.0, 1500.0),
    ];
    let prefs = SelectionPreferences::default();
    assert_eq!(select_video_track(&formats, &prefs).unwrap().format_id, "136");

    let vp9_first = SelectionPreferences {
        supported_video_codecs: vec!["vp9".to_string(), "avc1".to_string()],
        ..SelectionPreferences::default()
    };
    assert_eq!(select_video_track(&formats, &vp9_first).unwrap().format_id, "247");

    // Unsupported codecs are never chosen
    let avc_only = SelectionPreferences {
        supported_video_codecs: vec!["av01".to_string()],
        ..SelectionPreferences::default()
    };
    assert!(select_video_track(&formats, &avc_only).is_none());
}

#[test]
fn test_video_track_falls_back_above_ceiling() {
    let formats = vec![
        video("137", "avc1.640028", 1080, 30.0, 4500.0),
        video("136", "avc1.4d401f", 720, 30.0, 2500.0),
    ];
    let prefs = SelectionPreferences::default().with_max_height(480);

    // Nothing fits, so the smallest track above the ceiling is used
    assert_eq!(select_video_track(&formats, &prefs).unwrap().format_id, "136");
}

#[test]
fn test_manifest_formats_are_skipped() {
    let mut hls = video("301", "avc1.4d401f", 1080, 30.0, 5000.0);
    hls.protocol = Some("m3u8_native".to_string());
    let mut no_url = video("302", "avc1.4d401f", 1080, 30.0, 5000.0);
    no_url.url = None;

    let formats = vec![hls, no_url, video("136", "avc1.4d401f", 720, 30.0, 2500.0)];
    let chosen = select_video_track(&formats, &SelectionPreferences::default()).unwrap();
    assert_eq!(chosen.format_id, "136");
}

#[test]
fn test_audio_prefers_original_over_dubs() {
    let formats = vec![
        audio("140-0", "mp4a.40.2", 129.0, Some("de"), Some(-1)),
        audio("140-1", "mp4a.40.2", 129.0, Some("en"), Some(10)),
        audio("140-2", "mp4a.40.2", 160.0, Some("es"), Some(-1)),
    ];
    let prefs = SelectionPreferences::default();

    let chosen = select_audio_track(&formats, &prefs).unwrap();
    assert_eq!(chosen.format_id, "140-1");
}

#[test]
fn test_audio_language_preference() {
    let formats = vec![
        audio("251-0", "opus", 135.0, Some("en"), Some(10)),
        audio("251-1", "opus", 135.0, Some("fr-FR"), Some(-1)),
    ];

    // With dub avoidance on, the original track wins over the preferred dub
    let prefs = SelectionPreferences {
        preferred_audio_language: Some("fr".to_string()),
        ..SelectionPreferences::default()
    };
    assert_eq!(select_audio_track(&formats, &prefs).unwrap().format_id, "251-0");

    // Allowing dubs lets the language preference apply
    let allow_dubs = SelectionPreferences {
        avoid_dubs: false,
        ..prefs
    };
    assert_eq!(select_audio_track(&formats, &allow_dubs).unwrap().format_id, "251-1");
}

#[test]
fn test_audio_skips_descriptive_tracks() {
    let mut described = audio("140-ad", "mp4a.40.2", 160.0, Some("en"), Some(-10));
    described.format_note = Some("English descriptive".to_string());
    let plain = audio("140", "mp4a.40.2", 129.0, Some("en"), None);

    let chosen = select_audio_track(&[described.clone(), plain], &SelectionPreferences::default()).unwrap();
    assert_eq!(chosen.format_id, "140");

    // Kept when it is the only track
    let chosen = select_audio_track(&[described], &SelectionPreferences::default()).unwrap();
    assert_eq!(chosen.format_id, "140-ad");
}

#[test]
fn test_audio_dub_note() {
    let mut dubbed = audio("251-dub", "opus", 160.0, None, None);
    dubbed.format_note = Some("Dubbed audio".to_string());
    let plain = audio("251", "opus", 128.0, None, None);

    let chosen = select_audio_track(&[dubbed, plain], &SelectionPreferences::default()).unwrap();
    assert_eq!(chosen.format_id, "251");
}

#[test]
fn test_audio_bitrate_then_codec_rank() {
    let formats = vec![
        audio("251", "opus", 160.0, None, None),
        audio("140", "mp4a.40.2", 129.0, None, None),
        audio("139", "mp4a.40.5", 48.0, None, None),
    ];
    let prefs = SelectionPreferences::default();
    assert_eq!(select_audio_track(&formats, &prefs).unwrap().format_id, "251");

    // Same bitrate: mp4a is listed first in the default codec list
    let tied = vec![
        audio("251", "opus", 129.0, None, None),
        audio("140", "mp4a.40.2", 129.0, None, None),
    ];
    assert_eq!(select_audio_track(&tied, &prefs).unwrap().format_id, "140");
}

#[test]
fn test_muxed_selection() {
    let formats = vec![muxed("18", 360), muxed("22", 720), video("137", "avc1.640028", 1080, 30.0, 4500.0)];
    let prefs = SelectionPreferences::default();
    assert_eq!(select_muxed_track(&formats, &prefs).unwrap().format_id, "22");
    assert_eq!(
        select_muxed_track(&formats, &prefs.clone().with_max_height(480)).unwrap().format_id,
        "18"
    );
    // Nothing at or under the ceiling
    assert!(select_muxed_track(&formats, &prefs.with_max_height(240)).is_none());
}

#[test]
fn test_plan_playback_ceiling_below_muxed() {
    let mut formats = typical_formats();
    formats.push(video("133", "avc1.4d4015", 240, 30.0, 300.0));
    let prefs = SelectionPreferences::default().with_max_height(240);

    let plan = plan_playback(&formats, &prefs).unwrap();
    assert!(plan.muxed.is_none());
    assert_eq!(plan.composed.as_ref().unwrap().selector(), "133+140");
    assert!(!plan.has_upgrade());
}

#[test]
fn test_plan_playback_with_upgrade() {
    let plan = plan_playback(&typical_formats(), &SelectionPreferences::default()).unwrap();

    assert_eq!(plan.muxed.as_ref().unwrap().format_id, "18");
    let composed = plan.composed.as_ref().unwrap();
    assert_eq!(composed.selector(), "137+140");
    assert_eq!(composed.height(), 1080);
    assert!(plan.has_upgrade());

    assert_eq!(
        plan.muxed_urls(),
        Some(StreamUrls::Muxed {
            url: "https://media.example.com/18".to_string()
        })
    );
    assert_eq!(
        plan.composed_urls(),
        Some(StreamUrls::Composed {
            video_url: "https://media.example.com/137".to_string(),
            audio_url: "https://media.example.com/140".to_string(),
        })
    );
}

#[test]
fn test_plan_playback_skips_pointless_upgrade() {
    let formats = vec![
        muxed("22", 720),
        video("136", "avc1.4d401f", 720, 30.0, 2500.0),
        audio("140", "mp4a.40.2", 129.0, None, None),
    ];
    let plan = plan_playback(&formats, &SelectionPreferences::default()).unwrap();
    assert!(plan.muxed.is_some());
    assert!(plan.composed.is_none());
    assert!(!plan.has_upgrade());
}

#[test]
fn test_plan_playback_composed_only() {
    let formats = vec![
        video("137", "avc1.640028", 1080, 30.0, 4500.0),
        audio("140", "mp4a.40.2", 129.0, None, None),
    ];
    let plan = plan_playback(&formats, &SelectionPreferences::default()).unwrap();
    assert!(plan.muxed.is_none());
    assert!(plan.composed.is_some());
    assert!(!plan.has_upgrade());
}

#[test]
fn test_plan_playback_nothing_playable() {
    let formats = vec![
        video("401", "av01.0.12M.08", 2160, 30.0, 18000.0),
        audio("600", "vorbis", 64.0, None, None),
    ];
    let result = plan_playback(&formats, &SelectionPreferences::default());
    assert!(matches!(result, Err(AppError::NoPlayableFormat(_))));

    assert!(matches!(
        plan_playback(&[], &SelectionPreferences::default()),
        Err(AppError::NoPlayableFormat(_))
    ));
}

#[test]
fn test_quality_options() {
    let options = quality_options(&typical_formats(), &SelectionPreferences::default());
    let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
    assert_eq!(labels, vec!["1080p", "720p60", "720p", "360p"]);

    let hd = &options[0];
    assert_eq!(hd.video_format_id, "137");
    assert_eq!(hd.audio_format_id.as_deref(), Some("140"));
    assert_eq!(hd.vcodec, "avc1");

    // The 30fps 720p entry picks avc1 over vp9
    assert_eq!(options[2].video_format_id, "136");

    let urls = stream_urls_for_option(&typical_formats(), hd).unwrap();
    assert_eq!(
        urls,
        StreamUrls::Composed {
            video_url: "https://media.example.com/137".to_string(),
            audio_url: "https://media.example.com/140".to_string(),
        }
    );
}

#[test]
fn test_quality_options_muxed_only() {
    let formats = vec![muxed("18", 360)];
    let options = quality_options(&formats, &SelectionPreferences::default());
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].label, "360p");
    assert!(options[0].audio_format_id.is_none());

    let urls = stream_urls_for_option(&formats, &options[0]).unwrap();
    assert!(!urls.is_composed());
    assert_eq!(urls.primary_url(), "https://media.example.com/18");
}

#[test]
fn test_composed_for_height() {
    let prefs = SelectionPreferences::default();
    let pair = composed_for_height(&typical_formats(), &prefs, 720).unwrap();
    assert_eq!(pair.selector(), "298+140");
    assert_eq!(pair.height(), 720);

    let low = composed_for_height(&typical_formats(), &prefs, 480).unwrap();
    assert_eq!(low.video.format_id, "134");

    let formats = vec![muxed("18", 360)];
    assert!(matches!(
        composed_for_height(&formats, &prefs, 720),
        Err(AppError::NoPlayableFormat(_))
    ));
}
