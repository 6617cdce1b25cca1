//! Crawl orchestration: category × page iteration, dedup filtering, detail
//! extraction, and per-page persistence.
//!
//! Persistence happens at the granularity of one page's worth of detail
//! results, so a crash mid-run loses at most one page of progress. Run
//! counters are observational; nothing they record stops the run.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use console::style;
use indicatif::ProgressBar;
use tracing::{info, warn};

use crate::adapters::{DetailOutcome, SiteAdapter};
use crate::config::Category;
use crate::harvest::Harvest;
use crate::models::{CrawlStats, CrawlTask, Listing};
use crate::retry::{fetch_page_links, PageOutcome, RetryPolicy};
use crate::scheduler::{self, TaskReport};
use crate::session::{ManagedSession, SessionManager};
use crate::store::ListingStore;
use crate::utils::run_timestamp;

/// Drives one site's crawl run end to end.
#[derive(Clone)]
pub struct Crawler {
    adapter: Arc<dyn SiteAdapter>,
    manager: Arc<dyn SessionManager>,
    store: Arc<ListingStore>,
    retry: RetryPolicy,
    /// Full in-memory result set, shared so an interrupted run can still
    /// report what it collected.
    results: Arc<Mutex<Vec<Listing>>>,
}

impl Crawler {
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        manager: Arc<dyn SessionManager>,
        store: Arc<ListingStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            adapter,
            manager,
            store,
            retry,
            results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Platform name of the site this crawler drives.
    pub fn platform(&self) -> &str {
        self.adapter.platform()
    }

    /// Everything extracted so far, for summary files and interrupt reports.
    pub fn results_snapshot(&self) -> Vec<Listing> {
        self.results
            .lock()
            .map(|results| results.clone())
            .unwrap_or_default()
    }

    /// Crawl a paged site: for each category, pages ascending until the
    /// configured end or until a page comes up empty after its retry budget.
    pub async fn crawl_paged(
        &self,
        categories: &[Category],
        start_page: u32,
        end_page: u32,
    ) -> anyhow::Result<CrawlStats> {
        let mut stats = CrawlStats::default();
        let mut session = ManagedSession::open(self.manager.clone())
            .await
            .context("acquiring initial session")?;

        let total_pages =
            (categories.len() as u64) * u64::from(end_page.saturating_sub(start_page) + 1);
        let progress = ProgressBar::new(total_pages);

        for category in categories {
            info!(
                "crawling {} - {} (pages {start_page}-{end_page})",
                self.adapter.platform(),
                category.name
            );
            progress.set_message(category.name.clone());

            for page in start_page..=end_page {
                let page_url = self.adapter.page_url(&category.url, page);

                match fetch_page_links(&mut session, &*self.adapter, &page_url, &self.retry).await
                {
                    PageOutcome::Links(harvest) => {
                        stats.ads_skipped += harvest.ads_skipped;
                        let batch = self
                            .process_page(&mut session, &harvest, &category.name, &mut stats)
                            .await;
                        if !batch.is_empty() {
                            info!(
                                "page saved: {} listings ({}, page {page})",
                                batch.len(),
                                category.name
                            );
                        }
                        progress.inc(1);
                    }
                    PageOutcome::Exhausted => {
                        // The category ran out of items; stop paging it.
                        progress.inc(1);
                        break;
                    }
                    PageOutcome::Skipped { reason } => {
                        warn!("page skipped: {reason}");
                        stats.pages_failed += 1;
                        progress.inc(1);
                    }
                }
            }
        }

        progress.finish_and_clear();
        session.close().await;
        Ok(stats)
    }

    /// Run a set of independent feed tasks (e.g. region×keyword searches)
    /// under a bounded worker pool, each task owning its own session.
    pub async fn crawl_tasks(&self, tasks: Vec<CrawlTask>, workers: usize) -> CrawlStats {
        let crawler = self.clone();
        let reports = scheduler::run_tasks(tasks, workers, move |task| {
            let crawler = crawler.clone();
            async move { crawler.run_feed_task(task).await }
        })
        .await;

        let mut stats = CrawlStats::default();
        for report in &reports {
            stats.merge(&report.stats);
        }
        stats
    }

    /// One feed task end to end: harvest the whole feed once, extract the
    /// unknown URLs, persist the batch.
    async fn run_feed_task(&self, task: CrawlTask) -> anyhow::Result<TaskReport> {
        let mut session = ManagedSession::open(self.manager.clone())
            .await
            .context("acquiring task session")?;
        let mut stats = CrawlStats::default();
        let mut listings = Vec::new();

        match fetch_page_links(&mut session, &*self.adapter, &task.url, &self.retry).await {
            PageOutcome::Links(harvest) => {
                stats.ads_skipped += harvest.ads_skipped;
                listings = self
                    .process_page(&mut session, &harvest, &task.category, &mut stats)
                    .await;
                if !listings.is_empty() {
                    info!("task batch saved: {} listings ({})", listings.len(), task.label);
                }
            }
            PageOutcome::Exhausted => {}
            PageOutcome::Skipped { reason } => {
                warn!("task {} skipped: {reason}", task.label);
                stats.pages_failed += 1;
            }
        }

        session.close().await;
        Ok(TaskReport {
            task,
            listings,
            stats,
        })
    }

    /// Filter known URLs, extract the rest, and persist the page batch.
    ///
    /// Returns the extracted listings. Upsert failures are logged and
    /// counted; they never abort the run.
    async fn process_page(
        &self,
        session: &mut ManagedSession,
        harvest: &Harvest,
        category: &str,
        stats: &mut CrawlStats,
    ) -> Vec<Listing> {
        let mut batch = Vec::new();

        for url in &harvest.urls {
            // Dedup check before spending a detail fetch.
            match self.store.exists(url) {
                Ok(true) => {
                    stats.duplicates_skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => warn!("dedup check failed for {url}, extracting anyway: {e}"),
            }

            // Session died mid-page: one restart attempt, then give up on
            // the rest of this page's URLs.
            let session_dead = session.page().is_err();
            if session_dead && session.restart().await.is_err() {
                warn!("session lost mid-page, abandoning remaining URLs");
                break;
            }
            let Ok(page) = session.page() else {
                break;
            };

            match self.adapter.extract_detail(page, url, category).await {
                DetailOutcome::Extracted(listing) => {
                    stats.extracted += 1;
                    batch.push(listing.clone());
                    if let Ok(mut results) = self.results.lock() {
                        results.push(listing);
                    }
                }
                DetailOutcome::Filtered => stats.filtered += 1,
                DetailOutcome::Failed => {}
            }
        }

        if !batch.is_empty() {
            match self.store.upsert_batch(&batch) {
                Ok(outcome) => {
                    stats.inserted += outcome.inserted as u64;
                    stats.updated += outcome.updated as u64;
                }
                Err(e) => {
                    warn!("page batch save failed ({category}): {e}");
                    stats.batches_failed += 1;
                }
            }
        }

        batch
    }
}

/// Write the run-summary file: the full in-memory result set as a JSON
/// array, one timestamped file per run.
pub fn write_summary(
    output_dir: &Path,
    platform: &str,
    listings: &[Listing],
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;
    let path = output_dir.join(format!("{platform}_result_{}.json", run_timestamp()));
    let json = serde_json::to_string_pretty(listings).context("serializing run summary")?;
    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

/// Print the end-of-run counters.
pub fn print_run_report(platform: &str, stats: &CrawlStats, total: usize, summary_path: &Path) {
    println!(
        "{} {} crawl complete -> {} ({} listings)",
        style("✓").green(),
        platform,
        summary_path.display(),
        total
    );
    println!("  ads skipped:        {}", stats.ads_skipped);
    println!("  filtered (buy ads): {}", stats.filtered);
    println!("  duplicates skipped: {}", stats.duplicates_skipped);
    println!("  pages failed:       {}", stats.pages_failed);
    if stats.batches_failed > 0 {
        println!(
            "  {} save batches lost: {}",
            style("!").yellow(),
            stats.batches_failed
        );
    }
    println!(
        "  persisted:          {} new, {} updated",
        stats.inserted, stats.updated
    );
}
