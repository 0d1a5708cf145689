//! Utility functions for title normalization, string truncation, and file
//! system checks.
//!
//! The normalization helpers define the deduplication identity used across
//! the whole pipeline: the Existing-Entry Index, the Sync Engine, and the
//! Feed Sink all agree on titles through [`normalize_title`].

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trim a string and collapse internal whitespace runs into single spaces.
///
/// Listing markup spreads titles across nested elements and indented text
/// nodes; collapsing keeps the visible text stable no matter how the markup
/// was formatted.
pub fn collapse_whitespace(s: &str) -> String {
    RE_WHITESPACE.replace_all(s.trim(), " ").to_string()
}

/// Produce the deduplication key for an entry title.
///
/// Two titles that differ only in letter case or whitespace map to the same
/// key and are treated as the same item.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_title("  Foo BAR "), "foo bar");
/// ```
pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title).to_lowercase()
}

/// Truncate a string to at most `max` characters, respecting character
/// boundaries.
///
/// The mirrored sites publish Chinese titles and bodies, so byte slicing is
/// never safe here.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and byte count
/// indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let cut = truncate_chars(s, max);
    if cut.len() == s.len() {
        cut
    } else {
        format!("{}…(+{} bytes)", cut, s.len() - cut.len())
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if it doesn't exist, then performs a write test by
/// creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable
/// (permission denied, read-only filesystem, etc.).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
