//! Link harvesting: one-shot DOM scans and scroll-driven accumulation.
//!
//! Harvesting turns a rendered listing page into a deduplicated set of
//! canonical item URLs. Static sites get a single scan; infinite-scroll
//! sites repeat scroll (or show-more click) cycles until two consecutive
//! cycles add nothing new or the cycle ceiling is hit. An empty result is
//! a valid outcome, never an error.

use std::collections::HashSet;
use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::config::CrawlSettings;
use crate::session::{PageSession, SessionError};
use crate::utils::{absolutize, canonical_url};

/// Per-site scan rules for link harvesting.
#[derive(Debug, Clone)]
pub struct HarvestSpec {
    /// CSS selector matching item anchors.
    pub item_selector: String,
    /// Base URL for resolving relative hrefs.
    pub link_base: String,
    /// Substring a resolved URL must contain to count as an item link.
    pub link_must_contain: Option<String>,
    /// Anchor text marking a sponsored entry; matching anchors are counted
    /// and excluded.
    pub ad_marker: Option<String>,
    /// Selector for the "show more" trigger on click-to-load sites.
    pub show_more_selector: Option<String>,
}

/// Result of harvesting one listing page.
#[derive(Debug, Clone, Default)]
pub struct Harvest {
    /// Canonical item URLs in first-seen order.
    pub urls: Vec<String>,
    /// Sponsored entries dropped during the scan.
    pub ads_skipped: u64,
}

/// Pacing and bounds for scroll-driven harvesting.
#[derive(Debug, Clone)]
pub struct ScrollPolicy {
    /// Ceiling on scroll/rescan cycles.
    pub max_cycles: u32,
    /// Pause between scroll cycles.
    pub scroll_pause: Duration,
    /// Pause after clicking a show-more trigger, letting async content land.
    pub click_pause: Duration,
    /// Bounded wait for the show-more trigger to (re)appear.
    pub trigger_wait: Duration,
}

impl ScrollPolicy {
    pub fn from_crawl(crawl: &CrawlSettings) -> Self {
        Self {
            max_cycles: crawl.max_scroll_cycles,
            scroll_pause: crawl.scroll_pause(),
            click_pause: crawl.click_pause(),
            trigger_wait: crawl.element_wait(),
        }
    }
}

/// Scan rendered HTML once for item links.
pub fn scan_links(html: &str, spec: &HarvestSpec) -> Harvest {
    let mut harvest = Harvest::default();
    let mut seen = HashSet::new();
    scan_into(html, spec, &mut seen, &mut harvest);
    harvest
}

/// Scan `html` and merge new canonical URLs into the accumulated harvest.
fn scan_into(html: &str, spec: &HarvestSpec, seen: &mut HashSet<String>, harvest: &mut Harvest) {
    let selector = match Selector::parse(&spec.item_selector) {
        Ok(s) => s,
        Err(e) => {
            warn!("invalid item selector {:?}: {e}", spec.item_selector);
            return;
        }
    };

    let document = Html::parse_document(html);
    harvest.ads_skipped = 0;

    for element in document.select(&selector) {
        if let Some(marker) = &spec.ad_marker {
            let is_ad = element
                .text()
                .any(|text| text.trim() == marker.as_str());
            if is_ad {
                harvest.ads_skipped += 1;
                continue;
            }
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = absolutize(&spec.link_base, href) else {
            continue;
        };
        if let Some(needle) = &spec.link_must_contain {
            if !absolute.contains(needle.as_str()) {
                continue;
            }
        }

        let canonical = canonical_url(&absolute);
        if seen.insert(canonical.clone()) {
            harvest.urls.push(canonical);
        }
    }
}

/// Harvest an infinite-scroll page by scrolling to the bottom and rescanning
/// until the accumulated set stagnates for two cycles or the ceiling is hit.
pub async fn scroll_harvest(
    session: &mut dyn PageSession,
    spec: &HarvestSpec,
    policy: &ScrollPolicy,
) -> Result<Harvest, SessionError> {
    let mut harvest = Harvest::default();
    let mut seen = HashSet::new();
    let mut stagnant_rounds = 0u32;
    let mut last_count = 0usize;

    for cycle in 0..policy.max_cycles {
        let html = session.html().await?;
        scan_into(&html, spec, &mut seen, &mut harvest);

        if harvest.urls.len() == last_count {
            stagnant_rounds += 1;
        } else {
            last_count = harvest.urls.len();
            stagnant_rounds = 0;
        }
        if stagnant_rounds >= 2 {
            debug!("scroll harvest stagnated after {cycle} cycles");
            break;
        }

        if session.scroll_to_bottom().await.is_err() {
            break;
        }
        tokio::time::sleep(policy.scroll_pause).await;
    }

    Ok(harvest)
}

/// Harvest a click-to-load page: scroll, wait for the show-more trigger,
/// click, pause, rescan.
///
/// A trigger that went stale between locate and click is retried within the
/// same cycle; a trigger that no longer exists is the normal end of the
/// feed, not an error.
pub async fn show_more_harvest(
    session: &mut dyn PageSession,
    spec: &HarvestSpec,
    policy: &ScrollPolicy,
) -> Result<Harvest, SessionError> {
    let Some(trigger) = spec.show_more_selector.clone() else {
        let html = session.html().await?;
        return Ok(scan_links(&html, spec));
    };

    let mut harvest = Harvest::default();
    let mut seen = HashSet::new();
    let mut stagnant_rounds = 0u32;
    let mut last_count = 0usize;

    for _ in 0..policy.max_cycles {
        if session.scroll_to_bottom().await.is_err() {
            break;
        }

        if !session.wait_present(&trigger, policy.trigger_wait).await {
            debug!("show-more trigger gone; feed fully loaded");
            break;
        }

        match session.click(&trigger).await {
            Ok(()) => tokio::time::sleep(policy.click_pause).await,
            Err(SessionError::Stale(_)) => {
                // Button re-rendered between locate and click; same cycle
                // will find it again.
                continue;
            }
            Err(SessionError::ElementVanished(_)) => {
                debug!("show-more trigger vanished; feed fully loaded");
                break;
            }
            Err(e) => return Err(e),
        }

        let html = session.html().await?;
        scan_into(&html, spec, &mut seen, &mut harvest);
        if harvest.urls.len() == last_count {
            stagnant_rounds += 1;
            if stagnant_rounds >= 2 {
                debug!("show-more harvest stagnated");
                break;
            }
        } else {
            last_count = harvest.urls.len();
            stagnant_rounds = 0;
        }
    }

    // Final scan catches anchors rendered after the last click.
    let html = session.html().await?;
    scan_into(&html, spec, &mut seen, &mut harvest);

    Ok(harvest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn spec() -> HarvestSpec {
        HarvestSpec {
            item_selector: "a[href^='/products/']".to_string(),
            link_base: "https://m.example.com".to_string(),
            link_must_contain: None,
            ad_marker: Some("AD".to_string()),
            show_more_selector: None,
        }
    }

    #[test]
    fn scan_filters_ads_and_strips_queries() {
        let html = r#"
            <div>
                <a href="/products/1?ref=feed">one</a>
                <a href="/products/2"><span>AD</span><span>sponsored</span></a>
                <a href="/products/1">one again</a>
                <a href="/other/3">not an item</a>
            </div>
        "#;
        let harvest = scan_links(html, &spec());
        assert_eq!(harvest.urls, vec!["https://m.example.com/products/1"]);
        assert_eq!(harvest.ads_skipped, 1);
    }

    #[test]
    fn scan_applies_must_contain_filter() {
        let mut spec = spec();
        spec.item_selector = "a".to_string();
        spec.link_must_contain = Some("/products/".to_string());
        let html = r#"<a href="/products/9">x</a><a href="/login">y</a>"#;
        let harvest = scan_links(html, &spec);
        assert_eq!(harvest.urls, vec!["https://m.example.com/products/9"]);
    }

    /// Mock session whose show-more trigger disappears after a fixed number
    /// of clicks, revealing one new item per click.
    struct FeedSession {
        clicks_remaining: u32,
        items: Vec<String>,
        scans: u32,
    }

    impl FeedSession {
        fn new(clicks: u32) -> Self {
            Self {
                clicks_remaining: clicks,
                items: vec!["/products/0".to_string()],
                scans: 0,
            }
        }

        fn render(&self) -> String {
            let anchors: Vec<String> = self
                .items
                .iter()
                .map(|href| format!("<a href=\"{href}\">item</a>"))
                .collect();
            format!("<html><body>{}</body></html>", anchors.join(""))
        }
    }

    #[async_trait]
    impl PageSession for FeedSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn refresh(&mut self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn wait_visible(&mut self, _css: &str, _timeout: Duration) -> bool {
            true
        }

        async fn wait_present(&mut self, _css: &str, _timeout: Duration) -> bool {
            self.clicks_remaining > 0
        }

        async fn html(&mut self) -> Result<String, SessionError> {
            self.scans += 1;
            Ok(self.render())
        }

        async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn click(&mut self, css: &str) -> Result<(), SessionError> {
            if self.clicks_remaining == 0 {
                return Err(SessionError::ElementVanished(css.to_string()));
            }
            self.clicks_remaining -= 1;
            let next = self.items.len();
            self.items.push(format!("/products/{next}"));
            Ok(())
        }

        fn current_url(&self) -> Option<&str> {
            None
        }
    }

    fn feed_spec() -> HarvestSpec {
        HarvestSpec {
            item_selector: "a[href^='/products/']".to_string(),
            link_base: "https://m.example.com".to_string(),
            link_must_contain: None,
            ad_marker: None,
            show_more_selector: Some("button.more".to_string()),
        }
    }

    fn quick_policy() -> ScrollPolicy {
        ScrollPolicy {
            max_cycles: 20,
            scroll_pause: Duration::from_millis(0),
            click_pause: Duration::from_millis(0),
            trigger_wait: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn show_more_terminates_when_trigger_disappears() {
        let mut session = FeedSession::new(3);
        let harvest = show_more_harvest(&mut session, &feed_spec(), &quick_policy())
            .await
            .unwrap();

        // One seed item plus one per click, all retained.
        assert_eq!(harvest.urls.len(), 4);
        // Bounded scan effort: at most one scan per click plus the final scan.
        assert!(session.scans <= 4 + 1);
    }

    #[tokio::test]
    async fn show_more_respects_cycle_ceiling() {
        let mut session = FeedSession::new(u32::MAX);
        let policy = ScrollPolicy {
            max_cycles: 5,
            ..quick_policy()
        };
        let harvest = show_more_harvest(&mut session, &feed_spec(), &policy)
            .await
            .unwrap();
        assert_eq!(harvest.urls.len(), 6);
    }

    /// Scroll-only session that stops yielding new items after N scrolls.
    struct ScrollSession {
        loads_remaining: u32,
        items: Vec<String>,
    }

    #[async_trait]
    impl PageSession for ScrollSession {
        async fn navigate(&mut self, _url: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn refresh(&mut self) -> Result<(), SessionError> {
            Ok(())
        }

        async fn wait_visible(&mut self, _css: &str, _timeout: Duration) -> bool {
            true
        }

        async fn wait_present(&mut self, _css: &str, _timeout: Duration) -> bool {
            true
        }

        async fn html(&mut self) -> Result<String, SessionError> {
            let anchors: Vec<String> = self
                .items
                .iter()
                .map(|href| format!("<a href=\"{href}\">item</a>"))
                .collect();
            Ok(format!("<html><body>{}</body></html>", anchors.join("")))
        }

        async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
            if self.loads_remaining > 0 {
                self.loads_remaining -= 1;
                let next = self.items.len();
                self.items.push(format!("/products/{next}"));
            }
            Ok(())
        }

        async fn click(&mut self, _css: &str) -> Result<(), SessionError> {
            Ok(())
        }

        fn current_url(&self) -> Option<&str> {
            None
        }
    }

    #[tokio::test]
    async fn scroll_harvest_stops_on_stagnation() {
        let mut session = ScrollSession {
            loads_remaining: 3,
            items: vec!["/products/0".to_string()],
        };
        let mut spec = feed_spec();
        spec.show_more_selector = None;
        let harvest = scroll_harvest(&mut session, &spec, &quick_policy())
            .await
            .unwrap();
        assert_eq!(harvest.urls.len(), 4);
    }
}
