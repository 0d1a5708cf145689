//! Detail-page enrichment: fetch an item's full page and distill its
//! content container into a safe embeddable HTML fragment.
//!
//! Enrichment is best-effort. Every failure path — transport error, missing
//! container, nothing usable inside it — degrades to `None`; an entry with
//! no body is still publishable.
//!
//! The markup parser exposes a read-only DOM, so sanitization works by
//! reconstruction rather than in-place mutation: the fragment is rebuilt
//! from the container's paragraph text (script/style/iframe/noscript
//! content excluded, empty paragraphs dropped, a per-paragraph length cap
//! applied before joining) followed by its images rewritten to absolute,
//! width-constrained tags.

use ego_tree::NodeRef;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::fetch::{FetchPage, HttpFetcher};
use crate::utils::{collapse_whitespace, truncate_chars, truncate_for_log};

/// Upper bound on a single paragraph, applied before fragments are joined.
const PARAGRAPH_CAP: usize = 5_000;

static P_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static IMG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Elements whose text never belongs in feed content.
const STRIPPED: [&str; 4] = ["script", "style", "iframe", "noscript"];

/// Fetches and sanitizes detail pages for one source.
pub struct Enricher<'a> {
    fetcher: &'a HttpFetcher,
    content_selector: &'a Selector,
    base: &'a Url,
}

impl<'a> Enricher<'a> {
    pub fn new(fetcher: &'a HttpFetcher, content_selector: &'a Selector, base: &'a Url) -> Self {
        Self {
            fetcher,
            content_selector,
            base,
        }
    }

    /// Fetch the detail page behind `link` and sanitize its content
    /// container.
    pub async fn enrich(&self, link: &Url) -> Option<String> {
        let body = match self.fetcher.fetch(link.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %link, error = %e, "Couldn't fetch detail page; publishing without content");
                return None;
            }
        };
        sanitize_fragment(&body, self.content_selector, self.base)
    }
}

/// Distill the first node matching `content_selector` into an HTML
/// fragment, or `None` when the container is absent or yields nothing.
pub fn sanitize_fragment(html: &str, content_selector: &Selector, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let Some(container) = document.select(content_selector).next() else {
        debug!(
            preview = %truncate_for_log(html, 200),
            "No content container in detail page"
        );
        return None;
    };

    let mut parts: Vec<String> = Vec::new();
    for paragraph in container.select(&P_SELECTOR) {
        let text = collapse_whitespace(&visible_text(paragraph));
        if text.is_empty() {
            continue;
        }
        let capped = truncate_chars(&text, PARAGRAPH_CAP);
        parts.push(html_escape::encode_text(&capped).into_owned());
    }
    for image in container.select(&IMG_SELECTOR) {
        if let Some(tag) = rewrite_image(image, base) {
            parts.push(tag);
        }
    }

    if parts.is_empty() {
        debug!("Content container produced no usable fragments");
        None
    } else {
        Some(parts.join("<br>"))
    }
}

/// Visible text of `el`, excluding anything nested under stripped elements.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(*el, &mut out);
    out
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(element) if STRIPPED.contains(&element.name()) => {}
            Node::Element(_) => collect_text(child, out),
            _ => {}
        }
    }
}

/// Rebuild an image tag with an absolute `src`, defaulted alt text, and a
/// responsive width style. The lazy-load attribute wins over the plain
/// source when both exist.
fn rewrite_image(image: ElementRef<'_>, base: &Url) -> Option<String> {
    let value = image.value();
    let src = value
        .attr("data-src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| value.attr("src").map(str::trim).filter(|s| !s.is_empty()))?;
    let resolved = base.join(src).ok()?;
    let alt = value.attr("alt").unwrap_or("");
    Some(format!(
        r#"<img src="{}" alt="{}" style="max-width:100%; height:auto;"/>"#,
        html_escape::encode_double_quoted_attribute(resolved.as_str()),
        html_escape::encode_double_quoted_attribute(alt),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base() -> Url {
        Url::parse("https://news.example.test/").unwrap()
    }

    fn content_selector() -> Selector {
        Selector::parse("div.article-body").unwrap()
    }

    #[test]
    fn test_paragraphs_and_images_are_rebuilt() {
        let html = r#"<html><body>
          <div class="article-body">
            <p>First paragraph.</p>
            <p>   </p>
            <p>Second <b>bold</b> paragraph.</p>
            <img src="/img/chart.png" alt="chart">
          </div>
        </body></html>"#;
        let fragment = sanitize_fragment(html, &content_selector(), &base()).unwrap();
        assert_eq!(
            fragment,
            "First paragraph.<br>Second bold paragraph.<br>\
             <img src=\"https://news.example.test/img/chart.png\" alt=\"chart\" \
             style=\"max-width:100%; height:auto;\"/>"
        );
    }

    #[test]
    fn test_script_and_style_text_is_stripped() {
        let html = r#"<div class="article-body">
          <p>Visible<script>tracker();</script> text.<style>p{}</style></p>
        </div>"#;
        let fragment = sanitize_fragment(html, &content_selector(), &base()).unwrap();
        assert_eq!(fragment, "Visible text.");
    }

    #[test]
    fn test_lazy_load_attribute_wins() {
        let html = r#"<div class="article-body">
          <img data-src="https://cdn.example.test/real.jpg" src="/placeholder.gif">
        </div>"#;
        let fragment = sanitize_fragment(html, &content_selector(), &base()).unwrap();
        assert!(fragment.contains("https://cdn.example.test/real.jpg"));
        assert!(!fragment.contains("placeholder"));
    }

    #[test]
    fn test_missing_alt_defaults_to_empty() {
        let html = r#"<div class="article-body"><img src="/a.png"></div>"#;
        let fragment = sanitize_fragment(html, &content_selector(), &base()).unwrap();
        assert!(fragment.contains(r#"alt="""#));
    }

    #[test]
    fn test_missing_container_yields_none() {
        let html = "<html><body><p>elsewhere</p></body></html>";
        assert!(sanitize_fragment(html, &content_selector(), &base()).is_none());
    }

    #[test]
    fn test_empty_container_yields_none() {
        let html = r#"<div class="article-body"><p>  </p></div>"#;
        assert!(sanitize_fragment(html, &content_selector(), &base()).is_none());
    }

    #[test]
    fn test_paragraph_text_is_escaped() {
        let html = r#"<div class="article-body"><p>1 &lt; 2 &amp; so on</p></div>"#;
        let fragment = sanitize_fragment(html, &content_selector(), &base()).unwrap();
        assert_eq!(fragment, "1 &lt; 2 &amp; so on");
    }

    #[test]
    fn test_long_paragraph_is_capped() {
        let body = "a".repeat(PARAGRAPH_CAP + 100);
        let html = format!(r#"<div class="article-body"><p>{body}</p></div>"#);
        let fragment = sanitize_fragment(&html, &content_selector(), &base()).unwrap();
        assert_eq!(fragment.len(), PARAGRAPH_CAP);
    }

    #[tokio::test]
    async fn test_enrich_returns_fragment_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="article-body"><p>Hello world</p></div>"#,
            ))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(false, Duration::from_secs(5)).unwrap();
        let selector = content_selector();
        let base = base();
        let enricher = Enricher::new(&fetcher, &selector, &base);
        let link = Url::parse(&format!("{}/thread/1", server.uri())).unwrap();
        assert_eq!(enricher.enrich(&link).await.as_deref(), Some("Hello world"));
    }

    #[tokio::test]
    async fn test_enrich_degrades_on_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(false, Duration::from_secs(5)).unwrap();
        let selector = content_selector();
        let base = base();
        let enricher = Enricher::new(&fetcher, &selector, &base);
        let link = Url::parse(&format!("{}/thread/2", server.uri())).unwrap();
        assert!(enricher.enrich(&link).await.is_none());
    }

    #[tokio::test]
    async fn test_enrich_degrades_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/thread/3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_string("late"),
            )
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(false, Duration::from_millis(50)).unwrap();
        let selector = content_selector();
        let base = base();
        let enricher = Enricher::new(&fetcher, &selector, &base);
        let link = Url::parse(&format!("{}/thread/3", server.uri())).unwrap();
        assert!(enricher.enrich(&link).await.is_none());
    }
}
