//! Utility functions for string handling and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Path-safe slugs for publication and edition folder names
//! - String truncation for logging
//! - Detecting chat replies cut off mid-JSON
//! - Filename sanity checks
//! - File system validation for the output root

use crate::error::{HarvestError, Result};
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a char boundary)
/// with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Convert a publication or edition name into a folder-safe slug.
///
/// Lowercases ASCII letters, keeps digits, `_` and `-`, and maps everything
/// else (spaces, slashes, dots, non-ASCII) to `_`. Runs of `_` collapse and
/// leading/trailing `_` are trimmed. A name with nothing left becomes
/// `unnamed`; use [`try_slugify`] where a better fallback exists.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify("Hyderabad Main"), "hyderabad_main");
/// assert_eq!(slugify("../etc"), "etc");
/// ```
pub fn slugify(name: &str) -> String {
    try_slugify(name).unwrap_or_else(|| "unnamed".to_string())
}

/// Like [`slugify`], but `None` when the name has no ASCII letters or digits
/// to keep (for example Devanagari or Odia edition names).
pub fn try_slugify(name: &str) -> Option<String> {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }
    let trimmed = out.trim_matches('_');
    if trimmed.chars().any(|c| c.is_ascii_alphanumeric()) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Check if a JSON parse error indicates truncated input (EOF).
///
/// Chat models sometimes stop mid-object; such a reply is worth asking for
/// again, unlike one that is malformed throughout.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Reject rendered filenames that would escape their edition folder.
pub fn check_filename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(HarvestError::Template(format!(
            "rendered filename `{name}` is not a plain file name"
        )));
    }
    Ok(())
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting an empty marker file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let marker = path.join("..__write_check__");
    fs::write(&marker, b"").await?;
    let _ = fs::remove_file(&marker).await;
    info!("Output directory is writable");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "पृष्ठ".repeat(40);
        let result = truncate_for_log(&s, 7);
        assert!(result.contains("…(+"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hyderabad Main"), "hyderabad_main");
        assert_eq!(slugify("upper-shimla"), "upper-shimla");
        assert_eq!(slugify("HYD"), "hyd");
        assert_eq!(slugify("../etc/passwd"), "etc_passwd");
        assert_eq!(slugify("  spaced  out "), "spaced_out");
        assert_eq!(slugify("नवभारत"), "unnamed");
    }

    #[test]
    fn test_try_slugify_reports_unusable_names() {
        assert_eq!(try_slugify("Cuttack City").as_deref(), Some("cuttack_city"));
        assert_eq!(try_slugify("जयपुर संस्करण"), None);
        assert_eq!(try_slugify(" -- "), None);
        assert_eq!(try_slugify("ଭୁବନେଶ୍ୱର 2").as_deref(), Some("2"));
    }

    #[test]
    fn test_looks_truncated() {
        let cut = serde_json::from_str::<serde_json::Value>(r#"{"title": "Rains"#).unwrap_err();
        assert!(looks_truncated(&cut));
        let garbled = serde_json::from_str::<serde_json::Value>(r#"{"title" "Rains"}"#).unwrap_err();
        assert!(!looks_truncated(&garbled));
    }

    #[test]
    fn test_check_filename() {
        assert!(check_filename("sakal_20250530_01.jpg").is_ok());
        assert!(check_filename("../escape.pdf").is_err());
        assert!(check_filename("a/b.pdf").is_err());
        assert!(check_filename("").is_err());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("downloads").join("deep");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__write_check__").exists());
    }
}
