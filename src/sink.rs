//! Feed artifact persistence.
//!
//! The sink owns the Atom document schema; the rest of the pipeline only
//! knows that entries have titles. Writes are merge-appends: the run's new
//! entries are folded into whatever revision already exists on disk, so
//! previously published items survive every rewrite. Calling the sink
//! repeatedly with disjoint new-entry sets never corrupts prior entries.

use atom_syndication::{
    Content, Entry as AtomEntry, Feed, FeedBuilder, LinkBuilder, PersonBuilder, Text,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::models::{Entry, FeedSource};
use crate::utils::normalize_title;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize feed: {0}")]
    Serialize(#[from] atom_syndication::Error),
}

/// Writes feed artifacts beneath a fixed output directory.
#[derive(Debug, Clone)]
pub struct FeedSink {
    output_dir: PathBuf,
}

impl FeedSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Location of the artifact a source maintains.
    pub fn artifact_path(&self, source: &FeedSource) -> PathBuf {
        self.output_dir.join(&source.output)
    }

    /// Merge `new_entries` into the persisted artifact for `source` and
    /// rewrite it.
    ///
    /// Newly accepted entries come first; entries from the prior revision
    /// follow in their existing order. When a prior entry shares a
    /// normalized title with a new one, the new entry wins.
    #[instrument(level = "info", skip_all, fields(source = %source.name))]
    pub async fn write(
        &self,
        source: &FeedSource,
        new_entries: &[Entry],
        updated: DateTime<Utc>,
    ) -> Result<PathBuf, SinkError> {
        let path = self.artifact_path(source);
        let prior = read_prior_entries(&path).await;

        let merged: Vec<AtomEntry> = new_entries
            .iter()
            .map(to_atom_entry)
            .chain(prior)
            .unique_by(|entry| normalize_title(entry.title()))
            .collect();
        let entry_count = merged.len();

        let feed = FeedBuilder::default()
            .title(Text::plain(source.title.clone()))
            .subtitle(Some(Text::plain(source.subtitle.clone())))
            .id(source.listing_url.clone())
            .links(vec![
                LinkBuilder::default()
                    .href(source.listing_url.clone())
                    .build(),
            ])
            .updated(updated.fixed_offset())
            .entries(merged)
            .build();

        let buffer = feed.write_to(Vec::new())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SinkError::Io {
                    path: path.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&path, buffer)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), entries = entry_count, "Wrote feed artifact");
        Ok(path)
    }
}

/// Entries from the existing artifact, or none when it is absent or
/// malformed. A lost revision costs reposts, never the run.
async fn read_prior_entries(path: &Path) -> Vec<AtomEntry> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(_) => return Vec::new(),
    };
    match Feed::read_from(bytes.as_slice()) {
        Ok(feed) => feed.entries().to_vec(),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Existing artifact is not a readable feed; starting a fresh document"
            );
            Vec::new()
        }
    }
}

fn to_atom_entry(entry: &Entry) -> AtomEntry {
    let stub = &entry.stub;
    let mut atom = AtomEntry::default();
    atom.set_id(stub.link.to_string());
    atom.set_title(Text::plain(stub.title.clone()));
    atom.set_links(vec![
        LinkBuilder::default().href(stub.link.to_string()).build(),
    ]);
    atom.set_published(Some(stub.published));
    atom.set_updated(stub.published);
    if let Some(author) = &stub.author {
        atom.set_authors(vec![PersonBuilder::default().name(author.clone()).build()]);
    }
    if let Some(content) = &entry.content {
        let mut body = Content::default();
        body.set_value(Some(content.clone()));
        body.set_content_type(Some("html".to_string()));
        atom.set_content(Some(body));
    }
    atom
}
