//! Utility functions for path naming and human-readable formatting

use std::path::{Path, PathBuf};

/// Characters that are not allowed in directory names on at least one supported platform
const RESERVED_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Binary size units, from KiB upwards
const SIZE_UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Turn a game title into a safe directory name
///
/// Reserved characters and control characters become `_`, surrounding
/// whitespace and trailing dots are removed.
///
/// # Examples
///
/// ```
/// use gog_dl::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("Baldur's Gate: Enhanced Edition"), "Baldur's Gate_ Enhanced Edition");
/// assert_eq!(sanitize_title("  ..."), "untitled");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_end_matches('.').trim_end();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Final target directory for a game under a base download directory
pub fn game_directory(base: &Path, title: &str) -> PathBuf {
    base.join(sanitize_title(title))
}

/// Format a byte count with 1024-based units and one decimal place
///
/// # Examples
///
/// ```
/// use gog_dl::utils::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(1536 * 1024), "1.5 MiB");
/// assert_eq!(format_bytes(2 * 1024 * 1024 * 1024), "2.0 GiB");
/// ```
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    // Compare the rounded value so 1023.95 KiB shows as 1.0 MiB
    while (value * 10.0).round() / 10.0 >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

/// Format whole seconds as `1h2m3s`, `4m5s` or `6s`
#[must_use]
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Shorten `name` to at most `max_len` characters by replacing its middle with `...`
///
/// Works on characters, not bytes, so multi-byte names are never split.
#[must_use]
pub fn truncate_middle(name: &str, max_len: usize) -> String {
    let len = name.chars().count();
    if len <= max_len || max_len <= 3 {
        return name.to_string();
    }

    let keep = max_len - 3;
    let head = keep.div_ceil(2);
    let tail = keep / 2;

    let start: String = name.chars().take(head).collect();
    let end: String = name.chars().skip(len - tail).collect();
    format!("{}...{}", start, end)
}
