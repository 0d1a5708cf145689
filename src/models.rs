//! Data models for feed sources, candidate entries, and run outcomes.
//!
//! This module defines the core data structures used throughout the
//! application:
//! - [`FeedSource`]: per-listing configuration, immutable for a run
//! - [`EntryStub`]: a candidate entry extracted from a listing page
//! - [`Entry`]: a stub completed with (optional) detail-page content
//! - [`RunOutcome`]: counters describing what one run did

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::utils::normalize_title;

fn default_true() -> bool {
    true
}

/// Configuration for one mirrored listing page.
///
/// Deserialized from the YAML source file and validated once at load; the
/// engine treats it as read-only for the duration of a run.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSource {
    /// Short identifier used in logs and reports.
    pub name: String,
    /// The listing page to fetch.
    pub listing_url: String,
    /// Base URL that relative links on the listing resolve against.
    pub base_url: String,
    /// File name of the feed artifact this source produces.
    pub output: String,
    /// Human-readable feed title.
    pub title: String,
    /// Human-readable feed subtitle.
    #[serde(default)]
    pub subtitle: String,
    /// CSS selector matching one listing item per node.
    pub item_selector: String,
    /// CSS selector locating the title/link element inside an item.
    pub link_selector: String,
    /// CSS selector for the content container on detail pages.
    /// Enrichment is skipped entirely when absent.
    #[serde(default)]
    pub content_selector: Option<String>,
    /// Send the browser header profile with every request. Some of the
    /// mirrored sites refuse requests with a bare client identity.
    #[serde(default = "default_true")]
    pub use_default_headers: bool,
}

impl FeedSource {
    /// Validate the fields a run depends on.
    ///
    /// Selectors stay opaque strings (they are site-specific), but must be
    /// non-empty; both URLs must parse.
    pub fn validate(&self) -> Result<(), String> {
        fn required(value: &str, field: &str) -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("{field} must not be empty"))
            } else {
                Ok(())
            }
        }

        required(&self.name, "name")?;
        required(&self.listing_url, "listing_url")?;
        required(&self.base_url, "base_url")?;
        required(&self.output, "output")?;
        required(&self.title, "title")?;
        required(&self.item_selector, "item_selector")?;
        required(&self.link_selector, "link_selector")?;
        if let Some(selector) = &self.content_selector {
            required(selector, "content_selector")?;
        }
        Url::parse(&self.listing_url)
            .map_err(|e| format!("listing_url does not parse: {e}"))?;
        Url::parse(&self.base_url).map_err(|e| format!("base_url does not parse: {e}"))?;
        Ok(())
    }
}

/// A candidate entry extracted from the listing page, before enrichment.
#[derive(Debug, Clone)]
pub struct EntryStub {
    /// The visible title text as extracted from the listing.
    pub title: String,
    /// The deduplication key derived from `title`.
    pub normalized_title: String,
    /// Absolute link to the detail page.
    pub link: Url,
    /// Published time: the listing's structured timestamp when present,
    /// otherwise the moment the run saw the item.
    pub published: DateTime<FixedOffset>,
    /// Author name, when the listing exposes one.
    pub author: Option<String>,
}

impl EntryStub {
    pub fn new(
        title: String,
        link: Url,
        published: DateTime<FixedOffset>,
        author: Option<String>,
    ) -> Self {
        let normalized_title = normalize_title(&title);
        Self {
            title,
            normalized_title,
            link,
            published,
            author,
        }
    }
}

/// A completed entry: stub plus sanitized detail content when available.
#[derive(Debug, Clone)]
pub struct Entry {
    pub stub: EntryStub,
    /// Sanitized HTML fragment, or `None` when enrichment failed or was
    /// disabled. An entry with no body is still publishable.
    pub content: Option<String>,
}

/// Counters describing what one run of the engine did for one source.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    /// Items matched on the listing page that produced a valid stub.
    pub candidates: usize,
    /// Entries accepted as new and handed to the sink.
    pub accepted: usize,
    /// Stubs dropped because their title was already published.
    pub skipped_duplicate: usize,
    /// Listing items dropped before the dedup check (no link, empty title).
    pub skipped_invalid: usize,
    /// Whether the artifact was (re)written. False when nothing was new.
    pub wrote: bool,
    /// Path of the feed artifact this source maintains.
    pub output: String,
}
