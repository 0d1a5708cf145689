//! # Feed Mirror
//!
//! Incrementally mirrors forum and news listing pages into Atom feeds.
//! Each configured source is fetched, its listing items are checked against
//! the previously published feed, and only genuinely new items are enriched
//! with detail-page content and merged into the artifact. A run that finds
//! nothing new leaves the artifact untouched.
//!
//! ## Usage
//!
//! ```sh
//! feed_mirror -c sources.yaml -o ./feeds -d ./gh-pages-deploy
//! ```
//!
//! ## Architecture
//!
//! The application runs a pipeline per source:
//! 1. **Fetch**: retrieve the listing page (with retry/backoff)
//! 2. **Index**: load normalized titles from prior feed revisions
//! 3. **Sync**: extract candidates, drop known titles, enrich the rest
//! 4. **Sink**: merge the increment into the persisted Atom document
//!
//! Sources are independent; a few run concurrently, and one source's
//! failure never prevents the others from completing.

use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod engine;
mod enrich;
mod extract;
mod fetch;
mod index;
mod models;
mod report;
mod sink;
mod utils;

use cli::Cli;
use engine::SyncEngine;
use report::{RunReport, SourceReport};
use utils::ensure_writable_dir;

/// Sources in flight at once. Each run owns its index and artifact, so the
/// only shared resource is outbound throughput to the remote hosts.
const SOURCE_CONCURRENCY: usize = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_mirror starting up");

    let args = Cli::parse();
    let sources = config::load_sources(&args.config)?;
    info!(count = sources.len(), config = %args.config, "Loaded feed sources");

    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let engine = Arc::new(SyncEngine::new(
        &args.output_dir,
        args.deploy_dir.clone().map(PathBuf::from),
    ));

    // Per-source failures (and panics, via the spawned task) are caught at
    // this boundary so one bad source cannot stop the rest of the run.
    let results: Vec<SourceReport> = stream::iter(sources)
        .map(|source| {
            let engine = Arc::clone(&engine);
            async move {
                let name = source.name.clone();
                let run = tokio::spawn(async move { engine.run(&source).await }).await;
                match run {
                    Ok(Ok(outcome)) => {
                        info!(
                            source = %name,
                            accepted = outcome.accepted,
                            skipped_duplicates = outcome.skipped_duplicate,
                            wrote = outcome.wrote,
                            "Source completed"
                        );
                        SourceReport {
                            name,
                            error: None,
                            outcome: Some(outcome),
                        }
                    }
                    Ok(Err(e)) => {
                        error!(source = %name, error = %e, "Source failed; continuing");
                        SourceReport {
                            name,
                            error: Some(e.to_string()),
                            outcome: None,
                        }
                    }
                    Err(e) => {
                        error!(source = %name, error = %e, "Source run aborted unexpectedly");
                        SourceReport {
                            name,
                            error: Some(format!("run aborted: {e}")),
                            outcome: None,
                        }
                    }
                }
            }
        })
        .buffer_unordered(SOURCE_CONCURRENCY)
        .collect()
        .await;

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let written = results
        .iter()
        .filter(|r| r.outcome.as_ref().is_some_and(|o| o.wrote))
        .count();
    let new_entries: usize = results
        .iter()
        .filter_map(|r| r.outcome.as_ref())
        .map(|o| o.accepted)
        .sum();

    if let Some(report_path) = &args.report {
        let report = RunReport::new(results);
        if let Err(e) = report::write_report(&report, report_path).await {
            error!(path = %report_path, error = %e, "Failed to write run report");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        failed,
        written,
        new_entries,
        ?elapsed,
        secs = elapsed.as_secs(),
        "Execution complete"
    );

    Ok(())
}
