//! Dependency validator for tubeview
//!
//! Locates the extraction tool (yt-dlp) and the media player, reads their
//! versions and checks yt-dlp against the oldest release known to still
//! extract YouTube formats reliably.

use crate::config::Settings;
use crate::error::AppError;
use colored::*;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

// Minimum acceptable versions for dependencies
pub const MIN_YTDLP_VERSION: &str = "2024.08.06";
pub const MIN_MPV_VERSION: &str = "0.34.0";

static YTDLP_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}\.\d{1,2}\.\d{1,2}(?:\.\d+)?)").unwrap());
static GENERIC_VERSION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:version\s+|\s|^)v?(\d+\.\d+(?:\.\d+)?)").unwrap());

#[derive(Debug, Clone)]
pub struct DependencyInfo {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub is_min_version: bool,
}

/// Get the installation path for a dependency
///
/// Tries, in order:
/// 1. An explicit path from the settings
/// 2. System lookup through 'which' or 'where'
/// 3. Common installation locations
pub fn find_executable(name: &str, explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            debug!("Using configured {} at {:?}", name, candidate);
            return Some(candidate);
        }
        warn!("Configured {} path {:?} does not exist, searching PATH", name, candidate);
    }

    #[cfg(target_os = "windows")]
    let search_command = "where";

    #[cfg(not(target_os = "windows"))]
    let search_command = "which";

    if let Ok(output) = Command::new(search_command)
        .arg(name)
        .stderr(Stdio::null())
        .output()
    {
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if let Some(first) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                info!("Found {} at path: {}", name, first);
                return Some(PathBuf::from(first));
            }
        }
    }

    let common_paths = [
        format!("/opt/homebrew/bin/{}", name),
        format!("/usr/local/bin/{}", name),
        format!("/usr/bin/{}", name),
        format!("/snap/bin/{}", name),
    ];

    for path in common_paths.iter() {
        if Path::new(path).is_file() {
            info!("Found {} at common location: {}", name, path);
            return Some(PathBuf::from(path));
        }
    }

    if let Some(home) = dirs_next::home_dir() {
        let user_bin = home.join(".local").join("bin").join(name);
        if user_bin.is_file() {
            return Some(user_bin);
        }
    }

    debug!("Couldn't find {} anywhere", name);
    None
}

/// Parse version information from a tool's --version output
pub fn parse_version(output: &str, name: &str) -> String {
    let re: &Regex = if name == "yt-dlp" {
        &YTDLP_VERSION_RE
    } else {
        &GENERIC_VERSION_RE
    };

    if let Some(version) = re.captures(output).and_then(|c| c.get(1)) {
        return version.as_str().to_string();
    }

    warn!("Could not parse version from output for {}", name);
    debug!("Unparseable output: {}", output);

    output
        .lines()
        .next()
        .map_or_else(|| "unknown".to_string(), |line| {
            if line.chars().count() > 30 {
                format!("{}...", line.chars().take(30).collect::<String>())
            } else {
                line.to_string()
            }
        })
}

/// Compare dotted numeric versions (works for yt-dlp's date versions too)
pub fn is_minimum_version(version: &str, min_version: &str) -> bool {
    let version_parts: Vec<u32> = version.split('.').filter_map(|s| s.parse().ok()).collect();
    let min_parts: Vec<u32> = min_version.split('.').filter_map(|s| s.parse().ok()).collect();

    if version_parts.is_empty() {
        return false;
    }

    for i in 0..min_parts.len().max(version_parts.len()) {
        let v1 = version_parts.get(i).copied().unwrap_or(0);
        let v2 = min_parts.get(i).copied().unwrap_or(0);
        if v1 > v2 {
            return true;
        }
        if v1 < v2 {
            return false;
        }
    }
    true
}

/// Locate a dependency and read its version
pub fn get_dependency_info(name: &str, explicit: Option<&str>) -> Result<DependencyInfo, AppError> {
    let path = find_executable(name, explicit)
        .ok_or_else(|| AppError::MissingDependency(name.to_string()))?;

    let output = Command::new(&path)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| AppError::MissingDependency(format!("{} ({})", name, e)))?;

    let combined = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    let version = parse_version(combined.trim(), name);

    let min_version = match name {
        "yt-dlp" => MIN_YTDLP_VERSION,
        "mpv" => MIN_MPV_VERSION,
        _ => "0.0.0",
    };

    Ok(DependencyInfo {
        name: name.to_string(),
        is_min_version: is_minimum_version(&version, min_version),
        version,
        path,
    })
}

/// Path to yt-dlp, or MissingDependency
pub fn locate_ytdlp(settings: &Settings) -> Result<PathBuf, AppError> {
    find_executable("yt-dlp", settings.ytdlp_path.as_deref()).ok_or_else(|| {
        AppError::MissingDependency(
            "yt-dlp (install it from https://github.com/yt-dlp/yt-dlp or set TUBEVIEW_YTDLP)"
                .to_string(),
        )
    })
}

/// Check yt-dlp and the configured player, printing a short report
pub fn validate_dependencies(settings: &Settings) -> Result<HashMap<String, DependencyInfo>, AppError> {
    let mut results = HashMap::new();
    let mut has_issues = false;

    info!("Starting dependency validation");
    println!("{}", "Validating dependencies...".blue());

    match get_dependency_info("yt-dlp", settings.ytdlp_path.as_deref()) {
        Ok(info) => {
            println!("{}: {} ({})", "yt-dlp".green(), info.version, info.path.display());
            if !info.is_min_version {
                println!(
                    "{}: Version {} is older than {}; run 'yt-dlp -U'",
                    "WARNING".yellow(),
                    info.version,
                    MIN_YTDLP_VERSION
                );
                has_issues = true;
            }
            results.insert("yt-dlp".to_string(), info);
        }
        Err(e) => {
            println!("{}: {}", "ERROR".red(), e);
            has_issues = true;
        }
    }

    let player_name = Path::new(&settings.player)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(settings.player.as_str())
        .to_string();
    let explicit_player = if settings.player.contains(std::path::MAIN_SEPARATOR) {
        Some(settings.player.as_str())
    } else {
        None
    };

    match get_dependency_info(&player_name, explicit_player) {
        Ok(info) => {
            println!("{}: {} ({})", player_name.green(), info.version, info.path.display());
            if !info.is_min_version {
                println!(
                    "{}: {} {} may not support separate audio tracks",
                    "WARNING".yellow(),
                    player_name,
                    info.version
                );
            }
            results.insert(player_name, info);
        }
        Err(e) => {
            println!("{}: {}", "ERROR".red(), e);
            has_issues = true;
        }
    }

    if has_issues {
        warn!("Dependency validation completed with warnings");
        println!("{}", "\nDependency validation completed with warnings.".yellow());
    } else {
        info!("All dependencies validated successfully");
        println!("{}", "\nAll dependencies validated successfully.".green());
    }

    Ok(results)
}
