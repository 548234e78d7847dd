//! Utility functions for the franchise case tracker

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Format a datetime for display
#[must_use]
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Truncate a string to at most `max_chars` characters, ending with `...`
#[must_use]
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Parse a boolean flag the way environment variables are usually written
///
/// Returns `None` for anything that is not a recognised spelling.
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Get the per-user configuration directory
#[must_use]
pub fn user_config_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("franchise-tracker")
    } else if let Ok(userprofile) = std::env::var("USERPROFILE") {
        // Windows
        PathBuf::from(userprofile)
            .join("AppData")
            .join("Roaming")
            .join("franchise-tracker")
    } else {
        PathBuf::from("~/.config/franchise-tracker")
    }
}

/// Render a 0-100 percentage as a fixed-width text bar
#[must_use]
pub fn progress_bar(percentage: u8, width: usize) -> String {
    let filled = usize::from(percentage.min(100)) * width / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
