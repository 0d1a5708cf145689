//! Command-line interface definitions for the feed mirror.
//!
//! This module defines the CLI arguments and options using the `clap`
//! crate.

use clap::Parser;

/// Command-line arguments for the feed mirror.
///
/// # Examples
///
/// ```sh
/// # Mirror everything in sources.yaml into ./feeds
/// feed_mirror -o ./feeds
///
/// # Also consult a fetched gh-pages checkout for dedup history
/// feed_mirror -o ./feeds -d ./gh-pages-deploy
///
/// # Write a machine-readable summary for the deploy script
/// feed_mirror -o ./feeds --report ./run-report.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML file describing the feed sources
    #[arg(short, long, default_value = "sources.yaml")]
    pub config: String,

    /// Directory the feed artifacts are written to
    #[arg(short, long)]
    pub output_dir: String,

    /// Directory holding previously deployed artifacts, consulted for
    /// dedup ahead of the output directory
    #[arg(short, long)]
    pub deploy_dir: Option<String>,

    /// Optional path for a JSON run report
    #[arg(long)]
    pub report: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(&[
            "feed_mirror",
            "--config",
            "./sources.yaml",
            "--output-dir",
            "./feeds",
            "--deploy-dir",
            "./gh-pages-deploy",
        ]);

        assert_eq!(cli.config, "./sources.yaml");
        assert_eq!(cli.output_dir, "./feeds");
        assert_eq!(cli.deploy_dir.as_deref(), Some("./gh-pages-deploy"));
        assert_eq!(cli.report, None);
    }

    #[test]
    fn test_cli_short_flags_and_defaults() {
        let cli = Cli::parse_from(&["feed_mirror", "-o", "/tmp/feeds"]);

        assert_eq!(cli.config, "sources.yaml");
        assert_eq!(cli.output_dir, "/tmp/feeds");
        assert!(cli.deploy_dir.is_none());
    }
}
