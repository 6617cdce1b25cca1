//! End-to-end crawl scenario over mock sessions and a real store.
//!
//! Two pages of one category: page 1 yields [A, B] where A is already
//! persisted, page 2 stays empty through the whole empty-retry budget.
//! Expected: exactly one detail extraction (B), one persisted batch of
//! size 1, and a duplicate-skip count of 1.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use marketharvest::adapters::{DetailOutcome, Pagination, SiteAdapter};
use marketharvest::harvest::Harvest;
use marketharvest::models::{Listing, ListingStatus};
use marketharvest::orchestrator::Crawler;
use marketharvest::retry::RetryPolicy;
use marketharvest::session::{PageSession, SessionError, SessionManager};
use marketharvest::store::ListingStore;

const URL_A: &str = "https://site.example/items/a";
const URL_B: &str = "https://site.example/items/b";
const URL_BUY_REQUEST: &str = "https://site.example/items/buy-request";

fn listing(url: &str, category: &str) -> Listing {
    Listing {
        title: format!("listing {url}"),
        price: "100,000원".to_string(),
        condition: "중고".to_string(),
        upload_time: "2025-06-15 10:00:00".to_string(),
        region: "역삼동".to_string(),
        url: url.to_string(),
        image_url: String::new(),
        status: ListingStatus::OnSale,
        description: None,
        platform: "mocksite".to_string(),
        category: category.to_string(),
    }
}

/// Session that accepts everything and renders nothing.
struct NullSession;

#[async_trait]
impl PageSession for NullSession {
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
        Ok(String::new())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn click(&mut self, css: &str) -> Result<(), SessionError> {
        Err(SessionError::ElementVanished(css.to_string()))
    }

    fn current_url(&self) -> Option<&str> {
        None
    }
}

struct NullManager;

#[async_trait]
impl SessionManager for NullManager {
    async fn acquire(&self) -> Result<Box<dyn PageSession>, SessionError> {
        Ok(Box::new(NullSession))
    }
}

/// Adapter scripted for the two-page scenario.
struct ScriptedAdapter {
    extract_calls: AtomicU32,
}

#[async_trait]
impl SiteAdapter for ScriptedAdapter {
    fn site_id(&self) -> &'static str {
        "mocksite"
    }

    fn platform(&self) -> &'static str {
        "mocksite"
    }

    fn pagination(&self) -> Pagination {
        Pagination::Paged
    }

    async fn harvest_links(
        &self,
        _session: &mut dyn PageSession,
        page_url: &str,
    ) -> Result<Harvest, SessionError> {
        if page_url.ends_with("page=1") {
            Ok(Harvest {
                urls: vec![
                    URL_A.to_string(),
                    URL_B.to_string(),
                    URL_BUY_REQUEST.to_string(),
                ],
                ads_skipped: 0,
            })
        } else {
            Ok(Harvest::default())
        }
    }

    async fn extract_detail(
        &self,
        _session: &mut dyn PageSession,
        url: &str,
        category: &str,
    ) -> DetailOutcome {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        if url == URL_BUY_REQUEST {
            return DetailOutcome::Filtered;
        }
        DetailOutcome::Extracted(listing(url, category))
    }
}

fn quick_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        empty_retries: 2,
        retry_pause: Duration::from_millis(0),
    }
}

#[tokio::test]
async fn known_urls_are_skipped_and_new_ones_persisted_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ListingStore::open(&dir.path().join("crawl.db")).unwrap());

    // A is already known before the run starts.
    store.upsert_batch(&[listing(URL_A, "폰")]).unwrap();

    let adapter = Arc::new(ScriptedAdapter {
        extract_calls: AtomicU32::new(0),
    });
    let crawler = Crawler::new(
        adapter.clone(),
        Arc::new(NullManager),
        store.clone(),
        quick_policy(),
    );

    let categories = vec![marketharvest::config::Category::new(
        "폰",
        "https://site.example/cat?sort=recent",
    )];
    let stats = crawler.crawl_paged(&categories, 1, 2).await.unwrap();

    // A never reached the extractor; B and the buy request did.
    assert_eq!(adapter.extract_calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.duplicates_skipped, 1);
    assert_eq!(stats.extracted, 1);

    // The buy request was filtered, counted once, and never persisted.
    assert_eq!(stats.filtered, 1);
    assert!(!store.exists(URL_BUY_REQUEST).unwrap());

    // One upsert batch of size 1.
    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.updated, 0);
    assert!(store.exists(URL_B).unwrap());

    // The empty page 2 exhausted its retries without failing the run.
    assert_eq!(stats.pages_failed, 0);

    let results = crawler.results_snapshot();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, URL_B);
    assert_eq!(results[0].category, "폰");
}

#[tokio::test]
async fn a_second_run_extracts_nothing_new() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ListingStore::open(&dir.path().join("crawl.db")).unwrap());

    let categories = vec![marketharvest::config::Category::new(
        "폰",
        "https://site.example/cat?sort=recent",
    )];

    for run in 0..2 {
        let adapter = Arc::new(ScriptedAdapter {
            extract_calls: AtomicU32::new(0),
        });
        let crawler = Crawler::new(
            adapter.clone(),
            Arc::new(NullManager),
            store.clone(),
            quick_policy(),
        );
        let stats = crawler.crawl_paged(&categories, 1, 2).await.unwrap();

        if run == 0 {
            assert_eq!(adapter.extract_calls.load(Ordering::SeqCst), 3);
            assert_eq!(stats.inserted, 2);
        } else {
            // Persisted listings are known now; only the never-persisted
            // buy request gets re-extracted (and re-filtered).
            assert_eq!(adapter.extract_calls.load(Ordering::SeqCst), 1);
            assert_eq!(stats.duplicates_skipped, 2);
            assert_eq!(stats.filtered, 1);
            assert_eq!(stats.inserted, 0);
        }
    }

    let counts = store.counts_by_platform().unwrap();
    assert_eq!(counts, vec![("mocksite".to_string(), 2)]);
}
