//! Argument and path safety checks for tubeview
//!
//! Every value that ends up on the extraction tool's or the player's command line
//! passes through here first, as does every directory the caches write into.

use crate::error::AppError;
use log::warn;
use std::path::{Component, Path};

// Sensitive directory patterns the caches must never write into
pub const SENSITIVE_DIRECTORIES: [&str; 12] = [
    "/etc", "/bin", "/sbin", "/usr/bin", "/usr/sbin",
    "/usr/local/bin", "/usr/local/sbin", "/var/run",
    "/boot", "/dev", "/proc", "/sys"
];

/// Longest free-text argument accepted (search queries, titles)
pub const MAX_ARG_LENGTH: usize = 512;

/// Check an argument placed directly on yt-dlp's command line
///
/// Leading dashes are rejected so the value can never be parsed as an option.
pub fn sanitize_command_arg(arg: &str) -> Result<String, AppError> {
    let trimmed = arg.trim();

    if trimmed.starts_with('-') {
        return Err(AppError::ValidationError(format!(
            "Argument may not start with '-': {}",
            trimmed
        )));
    }

    sanitize_search_query(trimmed)
}

/// Check free text that is embedded after a prefix such as `ytsearch20:`
pub fn sanitize_search_query(query: &str) -> Result<String, AppError> {
    let trimmed = query.trim();

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(AppError::ValidationError(
            "Argument contains control characters".to_string(),
        ));
    }

    if trimmed.chars().count() > MAX_ARG_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Argument exceeds {} characters",
            MAX_ARG_LENGTH
        )));
    }

    Ok(trimmed.to_string())
}

/// Check for potential command injection patterns
pub fn detect_command_injection(input: &str) -> bool {
    let suspicious_patterns = [
        ";", "`", "$(", "${", "&&", "||", "|", "\n", "\r",
    ];

    if suspicious_patterns.iter().any(|p| input.contains(p)) {
        return true;
    }

    // Check for attempted escaping of quotes
    input.contains("\\\"") || input.contains("\\'")
}

/// Validate a URL passed to the player or the extractor
pub fn validate_stream_url(url: &str) -> Result<(), AppError> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(AppError::ValidationError("Invalid URL scheme".to_string()));
    }

    if url.len() > 8192 {
        return Err(AppError::ValidationError("URL is too long".to_string()));
    }

    if url.chars().any(|c| c.is_whitespace() || c.is_control()) || url.contains('`') {
        warn!("Rejected stream URL with unexpected characters");
        return Err(AppError::SecurityViolation);
    }

    Ok(())
}

/// Path safety validation for directories the application writes into
pub fn validate_path_safety(path: &Path) -> Result<(), AppError> {
    // Canonicalize the path to resolve any .. or symlinks
    let canonical_path = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            // Path doesn't exist yet, so only its components can be checked
            return check_path_components(path);
        }
    };

    let path_str = canonical_path.to_string_lossy();
    for dir in SENSITIVE_DIRECTORIES.iter() {
        if path_str == *dir || path_str.starts_with(&format!("{}/", dir)) {
            warn!("Refusing to use sensitive directory {:?}", canonical_path);
            return Err(AppError::SecurityViolation);
        }
    }

    Ok(())
}

fn check_path_components(path: &Path) -> Result<(), AppError> {
    for component in path.components() {
        if let Component::ParentDir = component {
            return Err(AppError::SecurityViolation);
        }
    }

    let path_str = path.to_string_lossy();
    for dir in SENSITIVE_DIRECTORIES.iter() {
        if path_str == *dir || path_str.starts_with(&format!("{}/", dir)) {
            return Err(AppError::SecurityViolation);
        }
    }

    Ok(())
}
