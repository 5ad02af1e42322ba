// tests/error_test.rs
use std::io;
use tubeview::error::AppError;

#[test]
fn test_app_error_display() {
    let error = AppError::MissingDependency("yt-dlp".to_string());
    assert_eq!(error.to_string(), "Missing dependency: yt-dlp");

    let error = AppError::ExtractorFailed {
        code: Some(1),
        message: "Video unavailable".to_string(),
    };
    assert_eq!(error.to_string(), "yt-dlp failed (exit code Some(1)): Video unavailable");

    let error = AppError::ValidationError("Invalid URL".to_string());
    assert_eq!(error.to_string(), "Validation error: Invalid URL");

    let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
    let error = AppError::IoError(io_error);
    assert_eq!(error.to_string(), "I/O error: File not found");

    let error = AppError::HttpStatus(404);
    assert_eq!(error.to_string(), "HTTP status 404");

    let error = AppError::NoPlayableFormat("no formats".to_string());
    assert_eq!(error.to_string(), "No playable format: no formats");

    let error = AppError::PathError("Invalid path".to_string());
    assert_eq!(error.to_string(), "Path error: Invalid path");

    let error = AppError::General("General error".to_string());
    assert_eq!(error.to_string(), "Application error: General error");

    assert_eq!(AppError::Cancelled.to_string(), "Operation cancelled");

    let error = AppError::SecurityViolation;
    assert_eq!(
        error.to_string(),
        "Security violation detected. If this is unexpected, please report this issue."
    );
}

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
    let app_error: AppError = io_error.into();
    assert!(matches!(app_error, AppError::IoError(_)));

    let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let app_error: AppError = json_error.into();
    assert!(matches!(app_error, AppError::JsonError(_)));

    let app_error: AppError = "Error message".into();
    assert!(matches!(app_error, AppError::General(ref m) if m == "Error message"));

    let app_error: AppError = String::from("Owned message").into();
    assert!(matches!(app_error, AppError::General(_)));
}

#[test]
fn test_auth_related_detection() {
    let failed = |message: &str| AppError::ExtractorFailed {
        code: Some(1),
        message: message.to_string(),
    };

    assert!(failed("[youtube] abc: Sign in to confirm you're not a bot").is_auth_related());
    assert!(failed("This video is age-restricted").is_auth_related());
    assert!(failed("Join this channel to get access to members-only content").is_auth_related());
    assert!(failed("Private video. Sign in if you've been granted access").is_auth_related());

    assert!(!failed("Video unavailable").is_auth_related());
    assert!(!failed("HTTP Error 404: Not Found").is_auth_related());
    // Only extractor failures can ask for cookies
    assert!(!AppError::General("sign in".to_string()).is_auth_related());
}
