//! JSON run reports.
//!
//! An optional machine-readable summary of what a run did per source, for
//! cron wrappers and deploy scripts that need more than the log stream.

use chrono::Utc;
use serde::Serialize;
use std::error::Error;
use tracing::{info, instrument};

use crate::models::RunOutcome;

/// One run of the driver across every configured source.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// RFC-3339 UTC timestamp of report generation.
    pub generated_at: String,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    pub fn new(sources: Vec<SourceReport>) -> Self {
        Self {
            generated_at: Utc::now().to_rfc3339(),
            sources,
        }
    }
}

/// Outcome of a single source: its counters on success, an error string
/// when the run aborted.
#[derive(Debug, Serialize)]
pub struct SourceReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub outcome: Option<RunOutcome>,
}

/// Serialize the report to `path` as pretty-printed JSON.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn write_report(report: &RunReport, path: &str) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!(sources = report.sources.len(), "Wrote run report");
    Ok(())
}
