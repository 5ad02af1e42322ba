// src/error.rs

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeError;
use std::io;
use thiserror::Error;

/// Custom error types for the application
#[derive(Error, Debug)]
pub enum AppError {
    /// Error for missing dependencies
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    /// The extraction tool exited with a non-zero status
    #[error("yt-dlp failed (exit code {code:?}): {message}")]
    ExtractorFailed { code: Option<i32>, message: String },

    /// Error for invalid input validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] SerdeError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] ReqwestError),

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// None of the available formats can be played
    #[error("No playable format: {0}")]
    NoPlayableFormat(String),

    /// The media player could not be launched or controlled
    #[error("Player error: {0}")]
    PlayerError(String),

    /// Cache storage errors
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Settings could not be read or written
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error for path operation failures
    #[error("Path error: {0}")]
    PathError(String),

    /// The operation was superseded or stopped
    #[error("Operation cancelled")]
    Cancelled,

    /// Error for security violations (option injection, path traversal, etc.)
    #[error("Security violation detected. If this is unexpected, please report this issue.")]
    SecurityViolation,

    /// General application errors
    #[error("Application error: {0}")]
    General(String),
}

impl AppError {
    /// True when the extractor failure looks like it needs browser cookies
    pub fn is_auth_related(&self) -> bool {
        match self {
            AppError::ExtractorFailed { message, .. } => {
                let lower = message.to_lowercase();
                lower.contains("sign in")
                    || lower.contains("not a bot")
                    || lower.contains("cookies")
                    || lower.contains("age-restricted")
                    || lower.contains("confirm your age")
                    || lower.contains("members-only")
                    || lower.contains("private video")
            }
            _ => false,
        }
    }
}

/// Convert a string error to AppError::General
impl From<String> for AppError {
    fn from(error: String) -> Self {
        AppError::General(error)
    }
}

/// Convert a &str error to AppError::General
impl From<&str> for AppError {
    fn from(error: &str) -> Self {
        AppError::General(error.to_string())
    }
}
