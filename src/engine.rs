//! The incremental synchronization engine.
//!
//! One run of the engine mirrors one listing page: fetch the listing,
//! extract candidate stubs, drop everything already published, enrich what
//! survives, and hand the increment to the sink. The engine itself is
//! stateless across runs — each run owns a private working copy of the
//! Existing-Entry Index and one output artifact, so sources can run
//! concurrently without locks.
//!
//! # Per-candidate state machine
//!
//! `Extracted → Skipped(no-title | no-link | dup-title) | Accepted`
//!
//! Invalid candidates are discarded during extraction; duplicate titles are
//! dropped against the working index; everything else is accepted, with or
//! without enriched content. A run that accepts nothing writes nothing, so
//! an unchanged listing never bumps the artifact's timestamps.

use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};
use url::Url;

use crate::enrich::Enricher;
use crate::extract::{self, SelectorError, Selectors};
use crate::fetch::{FetchError, FetchPage, HttpFetcher, RetryFetch};
use crate::index::ExistingEntryIndex;
use crate::models::{Entry, FeedSource, RunOutcome};
use crate::sink::{FeedSink, SinkError};

/// Bound on the listing fetch, whose failure aborts the run.
const LISTING_TIMEOUT: Duration = Duration::from_secs(15);
/// Bound on each detail fetch, whose failure degrades to empty content.
const DETAIL_TIMEOUT: Duration = Duration::from_secs(10);
/// Listing fetches retry before the run gives up; detail fetches are
/// single-shot.
const LISTING_RETRIES: usize = 2;
const LISTING_RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Failures that abort a single source's run. The existing artifact is
/// left untouched in every case.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to retrieve {url}: {source}")]
    Listing {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("invalid base url `{url}`: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Client(FetchError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Stateless per-source orchestrator.
///
/// Holds only run-independent configuration: the sink and the ordered list
/// of directories consulted for prior feed revisions, most authoritative
/// first.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    sink: FeedSink,
    prior_dirs: Vec<PathBuf>,
}

impl SyncEngine {
    /// `deploy_dir`, when given, is consulted for prior revisions before
    /// the output directory. The deployed copy and the local working copy
    /// may live on different filesystems; reading both is how dedup
    /// survives that topology without a shared database.
    pub fn new(output_dir: impl Into<PathBuf>, deploy_dir: Option<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        let mut prior_dirs = Vec::new();
        if let Some(deploy_dir) = deploy_dir {
            prior_dirs.push(deploy_dir);
        }
        prior_dirs.push(output_dir.clone());
        Self {
            sink: FeedSink::new(output_dir),
            prior_dirs,
        }
    }

    fn prior_locations(&self, source: &FeedSource) -> Vec<PathBuf> {
        self.prior_dirs
            .iter()
            .map(|dir| dir.join(&source.output))
            .collect()
    }

    /// Mirror one listing page into its feed artifact.
    #[instrument(level = "info", skip_all, fields(source = %source.name))]
    pub async fn run(&self, source: &FeedSource) -> Result<RunOutcome, RunError> {
        let base = Url::parse(&source.base_url).map_err(|e| RunError::BaseUrl {
            url: source.base_url.clone(),
            source: e,
        })?;
        let selectors = Selectors::compile(source)?;
        let content_selector = source
            .content_selector
            .as_deref()
            .map(extract::parse_selector)
            .transpose()?;

        let listing_fetcher = RetryFetch::new(
            HttpFetcher::new(source.use_default_headers, LISTING_TIMEOUT)
                .map_err(RunError::Client)?,
            LISTING_RETRIES,
            LISTING_RETRY_BASE_DELAY,
        );
        let listing = listing_fetcher
            .fetch(&source.listing_url)
            .await
            .map_err(|e| RunError::Listing {
                url: source.listing_url.clone(),
                source: e,
            })?;

        let mut index = ExistingEntryIndex::load(&self.prior_locations(source)).await;
        let extraction = extract::extract_stubs(&listing, &base, &selectors);
        info!(
            candidates = extraction.stubs.len(),
            known_titles = index.len(),
            "Listing extracted"
        );

        let detail_fetcher = HttpFetcher::new(source.use_default_headers, DETAIL_TIMEOUT)
            .map_err(RunError::Client)?;
        let enricher = content_selector
            .as_ref()
            .map(|selector| Enricher::new(&detail_fetcher, selector, &base));

        let candidates = extraction.stubs.len();
        let mut accepted: Vec<Entry> = Vec::new();
        let mut skipped_duplicate = 0usize;

        for stub in extraction.stubs {
            if index.contains(&stub.normalized_title) {
                debug!(title = %stub.title, "Skipping already published entry");
                skipped_duplicate += 1;
                continue;
            }
            // Reserve the title before enrichment, so a listing that
            // repeats an item cannot get it accepted twice even when
            // enrichment is slow or fails.
            index.record(stub.normalized_title.clone());

            let content = match &enricher {
                Some(enricher) => enricher.enrich(&stub.link).await,
                None => None,
            };
            accepted.push(Entry { stub, content });
        }

        let mut outcome = RunOutcome {
            candidates,
            accepted: accepted.len(),
            skipped_duplicate,
            skipped_invalid: extraction.skipped_no_link + extraction.skipped_no_title,
            wrote: false,
            output: self.sink.artifact_path(source).display().to_string(),
        };

        if accepted.is_empty() {
            info!("No new entries; leaving artifact untouched");
            return Ok(outcome);
        }

        let path = self.sink.write(source, &accepted, Utc::now()).await?;
        outcome.wrote = true;
        info!(
            new_entries = outcome.accepted,
            skipped_duplicates = outcome.skipped_duplicate,
            path = %path.display(),
            "Feed updated"
        );
        Ok(outcome)
    }
}
