//! Site adapters: per-site link harvesting and detail extraction rules.
//!
//! The orchestrator, retry controller, and scheduler depend only on the
//! [`SiteAdapter`] trait, never on a concrete site. Adapters navigate the
//! session themselves and parse rendered HTML with synchronous helpers so
//! nothing non-Send lives across an await point.

mod bunjang;
mod daangn;
mod joongna;

pub use bunjang::BunjangAdapter;
pub use daangn::DaangnAdapter;
pub use joongna::JoongnaAdapter;

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::config::CrawlSettings;
use crate::harvest::Harvest;
use crate::models::Listing;
use crate::session::{PageSession, SessionError};

/// How a site exposes more results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Classic numbered pages; the orchestrator advances `page=N`.
    Paged,
    /// One infinite feed per entry URL; a single harvest covers it.
    FullFeed,
}

/// Outcome of extracting one detail page.
#[derive(Debug, Clone)]
pub enum DetailOutcome {
    /// A normalized listing, ready to persist.
    Extracted(Listing),
    /// Dropped by the content-exclusion filter (buy request, not a sale).
    Filtered,
    /// Soft failure - navigation or parse produced nothing usable.
    Failed,
}

/// Per-site crawl capability.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Stable site identifier ("bunjang").
    fn site_id(&self) -> &'static str;

    /// Platform name stamped onto listings ("번개장터").
    fn platform(&self) -> &'static str;

    fn pagination(&self) -> Pagination;

    /// Build the URL for one page of a category.
    fn page_url(&self, base_url: &str, page: u32) -> String {
        format!("{base_url}&page={page}")
    }

    /// Discover candidate item URLs on a listing page.
    ///
    /// An empty harvest is a valid result; errors are session-level faults
    /// the retry layer recovers from.
    async fn harvest_links(
        &self,
        session: &mut dyn PageSession,
        page_url: &str,
    ) -> Result<Harvest, SessionError>;

    /// Extract the normalized listing from one detail page.
    ///
    /// Never raises: navigation failures and unparseable pages come back as
    /// [`DetailOutcome::Failed`], excluded content as
    /// [`DetailOutcome::Filtered`]. The session is left on the detail page,
    /// loaded, for the next operation.
    async fn extract_detail(
        &self,
        session: &mut dyn PageSession,
        url: &str,
        category: &str,
    ) -> DetailOutcome;
}

/// Known site identifiers, in run-all order.
pub fn known_sites() -> &'static [&'static str] {
    &["bunjang", "daangn", "joongna"]
}

/// Look up the adapter for a site id.
pub fn adapter_for(site_id: &str, crawl: &CrawlSettings) -> Option<Arc<dyn SiteAdapter>> {
    match site_id {
        "bunjang" => Some(Arc::new(BunjangAdapter::new(crawl))),
        "daangn" => Some(Arc::new(DaangnAdapter::new(crawl))),
        "joongna" => Some(Arc::new(JoongnaAdapter::new(crawl))),
        _ => None,
    }
}

/// Titles matching this are purchase requests, not sales, and are never
/// persisted.
pub(crate) fn is_buy_request(title: &str) -> bool {
    Regex::new(r"(매입|삽니다)")
        .map(|re| re.is_match(title))
        .unwrap_or(false)
}

/// Concatenated, trimmed text content of an element.
pub(crate) fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-empty text among candidate selectors, in order.
pub(crate) fn first_text(document: &Html, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in document.select(&selector) {
            let text = element_text(&element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First non-empty attribute value for a selector.
pub(crate) fn first_attr(document: &Html, selector_str: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector_str).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Open-graph meta content (`og:title`, `og:image`, ...).
pub(crate) fn og_content(document: &Html, property: &str) -> Option<String> {
    first_attr(
        document,
        &format!("meta[property='og:{property}']"),
        "content",
    )
}

/// Text of the first `p`/`button`/`span` following a label span.
///
/// Several sites render field labels ("상품 상태") as a span with the value
/// in a sibling element; this walks following siblings, climbing a few
/// levels when the value lives in a cousin subtree.
pub(crate) fn label_sibling_text(document: &Html, labels: &[&str]) -> Option<String> {
    let span_selector = Selector::parse("span").ok()?;
    let value_selector = Selector::parse("p, button, span").ok()?;

    for label_el in document.select(&span_selector) {
        let text = element_text(&label_el);
        if !labels.iter().any(|label| text.contains(label)) {
            continue;
        }

        let mut anchor = *label_el;
        for _ in 0..4 {
            for sibling in anchor.next_siblings() {
                let Some(sibling_el) = ElementRef::wrap(sibling) else {
                    continue;
                };
                if matches!(sibling_el.value().name(), "p" | "button" | "span") {
                    let value = element_text(&sibling_el);
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
                if let Some(inner) = sibling_el.select(&value_selector).next() {
                    let value = element_text(&inner);
                    if !value.is_empty() {
                        return Some(value);
                    }
                }
            }
            match anchor.parent() {
                Some(parent) => anchor = parent,
                None => break,
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_request_pattern_matches_either_term() {
        assert!(is_buy_request("아이폰 14 매입합니다"));
        assert!(is_buy_request("갤럭시 S23 삽니다"));
        assert!(!is_buy_request("아이폰 14 팝니다"));
    }

    #[test]
    fn first_text_walks_candidates_in_order() {
        let doc = Html::parse_document("<div><p class='b'>second</p><p class='a'>first</p></div>");
        assert_eq!(
            first_text(&doc, &["p.missing", "p.a", "p.b"]).as_deref(),
            Some("first")
        );
        assert_eq!(first_text(&doc, &["h1"]), None);
    }

    #[test]
    fn label_sibling_finds_value_in_cousin_subtree() {
        let html = r#"
            <dl>
                <div><span>상품 상태</span></div>
                <dd><button><p>중고</p></button></dd>
            </dl>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(
            label_sibling_text(&doc, &["상품 상태"]).as_deref(),
            Some("중고")
        );
    }

    #[test]
    fn og_content_reads_meta_tags() {
        let doc = Html::parse_document(
            r#"<head><meta property="og:title" content="아이패드 미니"/></head>"#,
        );
        assert_eq!(og_content(&doc, "title").as_deref(), Some("아이패드 미니"));
        assert_eq!(og_content(&doc, "image"), None);
    }
}
