//! Listing-page extraction: turn fetched markup into candidate entry stubs.
//!
//! Extraction walks the nodes matched by the source's item selector in
//! document order (the listings are most-recent-first; nothing is
//! re-sorted) and builds an [`EntryStub`] per usable item. Items without a
//! locatable link element, with an empty title, or with an unresolvable
//! `href` are discarded here and never reach the dedup check.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::models::{EntryStub, FeedSource};
use crate::utils::collapse_whitespace;

/// Offset attached to structured listing timestamps. The mirrored sites
/// publish Hong-Kong-local times.
static SOURCE_OFFSET: Lazy<FixedOffset> = Lazy::new(|| FixedOffset::east_opt(8 * 3600).unwrap());

/// Timestamp marker inside a listing item. A fixed convention of the
/// mirrored forum software, not per-source configuration.
static TIME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.lastpost em span").unwrap());

/// Author marker inside a listing item, same convention as the timestamp.
static AUTHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.author cite a").unwrap());

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A configured selector string that does not parse as CSS.
#[derive(Debug, Error)]
#[error("invalid selector `{selector}`: {message}")]
pub struct SelectorError {
    pub selector: String,
    pub message: String,
}

pub fn parse_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Item and link selectors compiled from a source's configuration.
#[derive(Debug)]
pub struct Selectors {
    item: Selector,
    link: Selector,
}

impl Selectors {
    pub fn compile(source: &FeedSource) -> Result<Self, SelectorError> {
        Ok(Self {
            item: parse_selector(&source.item_selector)?,
            link: parse_selector(&source.link_selector)?,
        })
    }
}

/// Stubs extracted from one listing page, plus counts of discarded items.
#[derive(Debug)]
pub struct Extraction {
    pub stubs: Vec<EntryStub>,
    pub skipped_no_link: usize,
    pub skipped_no_title: usize,
}

/// Extract candidate stubs from a fetched listing page.
///
/// One pass over the document; re-extracting requires a fresh fetch. The
/// published timestamp comes from the item's time marker when it parses
/// (see [`parse_item_time`]) and falls back to the current instant in UTC —
/// a wrong-but-present timestamp beats dropping the item.
pub fn extract_stubs(html: &str, base: &Url, selectors: &Selectors) -> Extraction {
    let document = Html::parse_document(html);
    let mut extraction = Extraction {
        stubs: Vec::new(),
        skipped_no_link: 0,
        skipped_no_title: 0,
    };

    for item in document.select(&selectors.item) {
        let Some(link_el) = item.select(&selectors.link).next() else {
            debug!("Listing item has no title/link element; skipping");
            extraction.skipped_no_link += 1;
            continue;
        };

        let title = collapse_whitespace(&link_el.text().collect::<Vec<_>>().join(" "));
        if title.is_empty() {
            warn!("Skipping listing item with empty title");
            extraction.skipped_no_title += 1;
            continue;
        }

        let link = match link_el
            .value()
            .attr("href")
            .and_then(|href| base.join(href).ok())
        {
            Some(link) => link,
            None => {
                warn!(%title, "Listing item has no resolvable href; skipping");
                extraction.skipped_no_link += 1;
                continue;
            }
        };

        let published = parse_item_time(item).unwrap_or_else(|| Utc::now().fixed_offset());
        let author = item
            .select(&AUTHOR_SELECTOR)
            .next()
            .map(|a| collapse_whitespace(&a.text().collect::<Vec<_>>().join(" ")))
            .filter(|a| !a.is_empty());

        extraction.stubs.push(EntryStub::new(title, link, published, author));
    }

    extraction
}

/// Parse the structured timestamp attribute carried by an item's time
/// marker.
///
/// The marker's `title` attribute holds `YYYY-MM-DD HH:MM` in the source
/// site's local time; the fixed UTC+8 offset is attached on parse. Absence
/// of the marker or any parse failure yields `None` and the caller falls
/// back to the run's wall clock.
fn parse_item_time(item: ElementRef<'_>) -> Option<DateTime<FixedOffset>> {
    let marker = item.select(&TIME_SELECTOR).next()?;
    let raw = marker.value().attr("title")?;
    let naive = match NaiveDateTime::parse_from_str(raw.trim(), TIME_FORMAT) {
        Ok(naive) => naive,
        Err(e) => {
            warn!(raw, error = %e, "Time parsing failed; falling back to run time");
            return None;
        }
    };
    SOURCE_OFFSET.from_local_datetime(&naive).single()
}
