// tests/security_test.rs
use std::path::Path;
use tubeview::error::AppError;
use tubeview::security::{
    detect_command_injection, sanitize_command_arg, sanitize_search_query, validate_path_safety,
    validate_stream_url, MAX_ARG_LENGTH,
};

#[test]
fn test_command_injection_detection() {
    // Clean inputs should pass
    assert!(!detect_command_injection("--volume=50"));
    assert!(!detect_command_injection("https://youtu.be/dQw4w9WgXcQ"));

    // Inputs with command injection patterns should be detected
    assert!(detect_command_injection("--volume=50;rm -rf ~"));
    assert!(detect_command_injection("`cat /etc/passwd`"));
    assert!(detect_command_injection("$(whoami)"));
    assert!(detect_command_injection("${HOME}"));
    assert!(detect_command_injection("a && b"));
    assert!(detect_command_injection("a | b"));
    assert!(detect_command_injection("line\nbreak"));
    assert!(detect_command_injection("quote\\\""));
}

#[test]
fn test_sanitize_command_arg() {
    assert_eq!(sanitize_command_arg("  lofi beats ").unwrap(), "lofi beats");
    assert_eq!(sanitize_command_arg("").unwrap(), "");

    // Anything yt-dlp could read as an option is refused
    assert!(matches!(
        sanitize_command_arg("--exec rm"),
        Err(AppError::ValidationError(_))
    ));
    assert!(sanitize_command_arg(" -o /tmp/x").is_err());
    assert!(sanitize_command_arg("bell\u{7}").is_err());

    let long = "a".repeat(MAX_ARG_LENGTH + 1);
    assert!(sanitize_command_arg(&long).is_err());
    let limit = "a".repeat(MAX_ARG_LENGTH);
    assert!(sanitize_command_arg(&limit).is_ok());
}

#[test]
fn test_sanitize_search_query() {
    assert_eq!(sanitize_search_query(" -ology ").unwrap(), "-ology");
    assert_eq!(sanitize_search_query("-40 degrees").unwrap(), "-40 degrees");
    assert!(sanitize_search_query("tab\tinside").is_err());
    assert!(sanitize_search_query(&"a".repeat(MAX_ARG_LENGTH + 1)).is_err());
}

#[test]
fn test_validate_stream_url() {
    assert!(validate_stream_url("https://rr1---sn-abc.googlevideo.com/videoplayback?expire=1").is_ok());
    assert!(validate_stream_url("http://example.com/a.mp4").is_ok());

    assert!(matches!(
        validate_stream_url("file:///etc/passwd"),
        Err(AppError::ValidationError(_))
    ));
    assert!(validate_stream_url("--script=evil.lua").is_err());
    assert!(matches!(
        validate_stream_url("https://example.com/a b"),
        Err(AppError::SecurityViolation)
    ));

    let long = format!("https://example.com/{}", "a".repeat(9000));
    assert!(validate_stream_url(&long).is_err());
}

#[test]
fn test_path_safety_validation() {
    let temp = tempfile::tempdir().unwrap();
    assert!(validate_path_safety(temp.path()).is_ok());
    assert!(validate_path_safety(&temp.path().join("not-yet-created")).is_ok());

    // Sensitive system directories are rejected
    assert!(validate_path_safety(Path::new("/etc")).is_err());
    assert!(validate_path_safety(Path::new("/usr/bin/images")).is_err());

    // Traversal in a path that does not exist yet
    assert!(validate_path_safety(Path::new("cache/../../escape-attempt-dir")).is_err());
}
