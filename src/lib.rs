// src/lib.rs
// Browse YouTube and play videos through yt-dlp and an external player

pub mod cli;
pub mod config;
pub mod dependency_validator;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod format_cache;
pub mod format_selector;
pub mod image_cache;
pub mod models;
pub mod playback;
pub mod security;
pub mod utils;

pub use error::AppError;
