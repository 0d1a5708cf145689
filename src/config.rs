//! Loading and validation of the feed source configuration file.
//!
//! Sources are declared in YAML, one document listing every mirrored
//! listing page. Validation happens once here so the engine can assume a
//! well-formed [`FeedSource`] for the rest of the run.

use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::models::FeedSource;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid source `{name}`: {reason}")]
    Invalid { name: String, reason: String },
    #[error("configuration lists no sources")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct SourcesFile {
    sources: Vec<FeedSource>,
}

/// Load feed sources from a YAML file and validate each one.
///
/// Beyond per-source validation, output artifact names must be unique —
/// two sources sharing an artifact would silently overwrite each other.
pub fn load_sources(path: &str) -> Result<Vec<FeedSource>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let parsed: SourcesFile = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    if parsed.sources.is_empty() {
        return Err(ConfigError::Empty);
    }

    let mut outputs = HashSet::new();
    for source in &parsed.sources {
        source.validate().map_err(|reason| ConfigError::Invalid {
            name: source.name.clone(),
            reason,
        })?;
        if !outputs.insert(source.output.clone()) {
            return Err(ConfigError::Invalid {
                name: source.name.clone(),
                reason: format!("output `{}` is already used by another source", source.output),
            });
        }
    }
    Ok(parsed.sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
sources:
  - name: money
    listing_url: "https://forum.example.test/listing?fid=57"
    base_url: "https://forum.example.test/"
    output: money.xml
    title: Money
    subtitle: Latest articles
    item_selector: tbody.threads
    link_selector: span.subject a
    content_selector: div.post
    use_default_headers: false
  - name: house
    listing_url: "https://forum.example.test/listing?fid=110"
    base_url: "https://forum.example.test/"
    output: house.xml
    title: House
    item_selector: tbody.threads
    link_selector: span.subject a
"#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID);
        let sources = load_sources(file.path().to_str().unwrap()).unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "money");
        assert!(!sources[0].use_default_headers);
        assert!(sources[1].use_default_headers);
        assert!(sources[1].content_selector.is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_sources("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_unparseable_yaml_is_parse_error() {
        let file = write_config("sources: [not: {valid");
        let err = load_sources(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_empty_source_list_rejected() {
        let file = write_config("sources: []");
        let err = load_sources(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Empty));
    }

    #[test]
    fn test_invalid_source_is_named() {
        let broken = VALID.replace("item_selector: tbody.threads", "item_selector: \"\"");
        let file = write_config(&broken);
        let err = load_sources(file.path().to_str().unwrap()).unwrap_err();
        match err {
            ConfigError::Invalid { name, reason } => {
                assert_eq!(name, "money");
                assert!(reason.contains("item_selector"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_outputs_rejected() {
        let dup = VALID.replace("output: house.xml", "output: money.xml");
        let file = write_config(&dup);
        let err = load_sources(file.path().to_str().unwrap()).unwrap_err();
        match err {
            ConfigError::Invalid { name, reason } => {
                assert_eq!(name, "house");
                assert!(reason.contains("money.xml"));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }
}
