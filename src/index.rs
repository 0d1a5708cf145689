//! Membership index over previously published entries.
//!
//! The index answers one question for the Sync Engine: "have we already
//! published an item with this title?". It is built once per run from an
//! ordered list of candidate feed locations, extended in memory while the
//! run accepts entries, and discarded afterwards.
//!
//! Reading is deliberately narrow. The only structural fact consumed from a
//! prior artifact is that each published item appears as an `entry` element
//! containing a `title` element; everything else in the document belongs to
//! the Feed Sink.

use quick_xml::de::from_str;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::utils::normalize_title;

#[derive(Debug, Default, Deserialize)]
struct FeedDoc {
    #[serde(rename = "entry", default)]
    entries: Vec<EntryDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct EntryDoc {
    #[serde(default)]
    title: Option<TitleDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct TitleDoc {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

/// Set of normalized titles already present in prior feed revisions.
#[derive(Debug, Default)]
pub struct ExistingEntryIndex {
    titles: HashSet<String>,
}

impl ExistingEntryIndex {
    /// Build the index from an ordered list of candidate feed locations.
    ///
    /// Every location is optional: a missing or unreadable file contributes
    /// nothing, and a malformed document is treated as "no prior entries
    /// known" for that location. Losing dedup history produces reposts;
    /// aborting the run would lose the feed update entirely, which is worse.
    pub async fn load(locations: &[PathBuf]) -> Self {
        let mut index = Self::default();
        for location in locations {
            match tokio::fs::read_to_string(location).await {
                Ok(contents) => index.absorb(location, &contents),
                Err(e) => {
                    debug!(
                        path = %location.display(),
                        error = %e,
                        "Prior feed not readable; skipping location"
                    );
                }
            }
        }
        info!(titles = index.len(), "Existing-entry index loaded");
        index
    }

    fn absorb(&mut self, location: &Path, contents: &str) {
        match from_str::<FeedDoc>(contents) {
            Ok(feed) => {
                let before = self.titles.len();
                for entry in feed.entries {
                    if let Some(value) = entry.title.and_then(|t| t.value) {
                        let normalized = normalize_title(&value);
                        if !normalized.is_empty() {
                            self.titles.insert(normalized);
                        }
                    }
                }
                debug!(
                    path = %location.display(),
                    added = self.titles.len() - before,
                    "Absorbed prior feed"
                );
            }
            Err(e) => {
                warn!(
                    path = %location.display(),
                    error = %e,
                    "Prior feed is malformed; treating location as empty"
                );
            }
        }
    }

    /// Whether `normalized_title` was already published (or already accepted
    /// earlier in this run).
    pub fn contains(&self, normalized_title: &str) -> bool {
        self.titles.contains(normalized_title)
    }

    /// Record a title accepted during this run, so a listing page that
    /// repeats an item cannot emit it twice.
    pub fn record(&mut self, normalized_title: String) {
        self.titles.insert(normalized_title);
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const FEED_A: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Money</title>
  <id>https://forum.example.test/listing</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Housing Policy</title>
    <id>https://forum.example.test/thread/2</id>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
  <entry>
    <title type="text">  Rate   CUT </title>
    <id>https://forum.example.test/thread/3</id>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    const FEED_B: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Money</title>
  <id>https://forum.example.test/listing</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <title>Budget Speech</title>
    <id>https://forum.example.test/thread/9</id>
    <updated>2024-01-02T00:00:00Z</updated>
  </entry>
</feed>"#;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_unions_all_locations() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.xml", FEED_A);
        let b = write_file(&dir, "b.xml", FEED_B);

        let index = ExistingEntryIndex::load(&[a, b]).await;
        assert_eq!(index.len(), 3);
        assert!(index.contains("housing policy"));
        assert!(index.contains("rate cut"));
        assert!(index.contains("budget speech"));
    }

    #[tokio::test]
    async fn test_missing_location_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(&dir, "a.xml", FEED_A);
        let missing = dir.path().join("nope.xml");

        let index = ExistingEntryIndex::load(&[missing, a]).await;
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_document_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_file(&dir, "bad.xml", "<feed><entry><title>unclosed");
        let a = write_file(&dir, "a.xml", FEED_A);

        let index = ExistingEntryIndex::load(&[bad, a]).await;
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_no_locations_yields_empty_index() {
        let index = ExistingEntryIndex::load(&[]).await;
        assert!(index.is_empty());
    }

    #[test]
    fn test_record_then_contains() {
        let mut index = ExistingEntryIndex::default();
        assert!(!index.contains("market update"));
        index.record("market update".to_string());
        assert!(index.contains("market update"));
    }

    #[test]
    fn test_entry_without_title_is_ignored() {
        let mut index = ExistingEntryIndex::default();
        index.absorb(
            Path::new("x.xml"),
            r#"<feed><entry><id>only-an-id</id></entry></feed>"#,
        );
        assert!(index.is_empty());
    }
}
