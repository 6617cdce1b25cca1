//! Crawl command: drive one site's crawler end to end.

use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context};
use console::style;
use tracing::info;
use uuid::Uuid;

use crate::adapters::{adapter_for, known_sites, DaangnAdapter, Pagination};
use crate::config::{Settings, SiteConfig};
use crate::models::{CrawlStats, CrawlTask};
use crate::orchestrator::{print_run_report, write_summary, Crawler};
use crate::retry::RetryPolicy;
use crate::session::{ChromeSessionManager, SessionConfig, SessionManager};
use crate::store::ListingStore;

/// Crawl one site with its configured categories or feed tasks.
pub async fn cmd_crawl(
    settings: &Settings,
    site: &str,
    start_page: Option<u32>,
    end_page: Option<u32>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let Some(adapter) = adapter_for(site, &settings.crawl) else {
        bail!(
            "unknown site '{site}' (known sites: {})",
            known_sites().join(", ")
        );
    };
    let site_config = settings.site(site).cloned().unwrap_or_default();

    match adapter.pagination() {
        Pagination::Paged => {
            if site_config.categories.is_empty() {
                bail!("no categories configured for {site}; add them to marketharvest.toml");
            }
            let start = start_page.unwrap_or(site_config.start_page);
            let end = end_page.unwrap_or(site_config.end_page);
            if start == 0 || end < start {
                bail!("invalid page range {start}-{end}");
            }

            let crawler = build_crawler(settings, site)?;
            let run_id = Uuid::new_v4();
            info!("run {run_id}: crawling {site} pages {start}-{end}");

            let stats = run_with_interrupt(
                &crawler,
                settings,
                crawler.crawl_paged(&site_config.categories, start, end),
            )
            .await?;
            finish_run(settings, &crawler, &stats)
        }
        Pagination::FullFeed => {
            let tasks = feed_tasks(&site_config)?;
            run_feed_site(settings, site, tasks, workers).await
        }
    }
}

/// Run a feed site's search tasks under the worker pool. Shared with the
/// search command.
pub(super) async fn run_feed_site(
    settings: &Settings,
    site: &str,
    tasks: Vec<CrawlTask>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let crawler = build_crawler(settings, site)?;
    let workers = workers.unwrap_or(settings.crawl.workers);

    let run_id = Uuid::new_v4();
    info!("run {run_id}: {} tasks across {workers} workers", tasks.len());

    let stats = run_with_interrupt(&crawler, settings, async {
        Ok(crawler.crawl_tasks(tasks, workers).await)
    })
    .await?;
    finish_run(settings, &crawler, &stats)
}

/// Region×keyword task descriptors for a feed site.
pub(super) fn feed_tasks(site_config: &SiteConfig) -> anyhow::Result<Vec<CrawlTask>> {
    let mut tasks = Vec::new();
    for region in &site_config.regions {
        for keyword in &site_config.keywords {
            tasks.push(CrawlTask::new(
                format!("{keyword} @ {region}"),
                keyword,
                DaangnAdapter::search_url(region, keyword),
            ));
        }
    }
    if tasks.is_empty() {
        bail!(
            "no region/keyword combinations to crawl; \
             configure sites.daangn.regions and keywords"
        );
    }
    Ok(tasks)
}

fn build_crawler(settings: &Settings, site: &str) -> anyhow::Result<Crawler> {
    let adapter = adapter_for(site, &settings.crawl)
        .with_context(|| format!("no adapter for site {site}"))?;
    settings.ensure_directories()?;
    let store = Arc::new(ListingStore::open(&settings.database_path())?);
    let manager: Arc<dyn SessionManager> = Arc::new(ChromeSessionManager::new(
        SessionConfig::from_crawl(&settings.crawl),
    ));
    Ok(Crawler::new(
        adapter,
        manager,
        store,
        RetryPolicy::from_crawl(&settings.crawl),
    ))
}

/// Run the crawl future, and on Ctrl-C still report the partial results
/// collected so far before exiting. Already-persisted batches stay valid.
async fn run_with_interrupt<F>(
    crawler: &Crawler,
    settings: &Settings,
    crawl: F,
) -> anyhow::Result<CrawlStats>
where
    F: Future<Output = anyhow::Result<CrawlStats>>,
{
    tokio::select! {
        result = crawl => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!(
                "{} interrupted - writing partial results",
                style("!").yellow()
            );
            let listings = crawler.results_snapshot();
            match write_summary(&settings.output_dir, crawler.platform(), &listings) {
                Ok(path) => eprintln!("  partial summary -> {}", path.display()),
                Err(e) => eprintln!("  partial summary failed: {e}"),
            }
            std::process::exit(130);
        }
    }
}

fn finish_run(settings: &Settings, crawler: &Crawler, stats: &CrawlStats) -> anyhow::Result<()> {
    let listings = crawler.results_snapshot();
    let path = write_summary(&settings.output_dir, crawler.platform(), &listings)?;
    print_run_report(crawler.platform(), stats, listings.len(), &path);
    Ok(())
}
