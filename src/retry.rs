//! Retry/recovery control around page-level link harvesting.
//!
//! Page fetches run against an unreliable, stateful rendering session, so
//! faults are handled by discarding and recreating the session rather than
//! repairing it. Budget exhaustion always terminates in a skipped page,
//! never a raised error - individual page failures degrade a run's
//! completeness but never its liveness.

use std::time::Duration;

use tracing::warn;

use crate::adapters::SiteAdapter;
use crate::config::CrawlSettings;
use crate::harvest::Harvest;
use crate::session::ManagedSession;

/// Per-page retry budgets.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Navigation/harvest attempts before the page is abandoned.
    pub max_attempts: u32,
    /// Empty-result retries before the page is abandoned.
    pub empty_retries: u32,
    /// Pause between retry cycles.
    pub retry_pause: Duration,
}

impl RetryPolicy {
    pub fn from_crawl(crawl: &CrawlSettings) -> Self {
        Self {
            max_attempts: crawl.page_retry_attempts,
            empty_retries: crawl.empty_page_retries,
            retry_pause: crawl.retry_pause(),
        }
    }
}

/// Outcome of fetching one listing page through the retry layer.
///
/// Callers branch on data instead of catching distinguishable errors;
/// there is no fatal variant because no page-level fault is allowed to
/// stop the run.
#[derive(Debug)]
pub enum PageOutcome {
    /// Links harvested; processing continues with them.
    Links(Harvest),
    /// Still no links after the empty-retry budget: the listing genuinely
    /// ran out of items. Paged orchestrators stop advancing the category.
    Exhausted,
    /// Page-level failure after the attempt budget; the page is abandoned
    /// and iteration moves on to the next page.
    Skipped { reason: String },
}

/// Harvest one page's links with bounded retries and session recovery.
///
/// Session-level faults (navigation timeout, driver errors) restart the
/// session and retry, up to `max_attempts`. A zero-link result retries with
/// a page refresh, except the final empty retry which forces a full session
/// restart - a stuck session is the likelier cause than a genuinely empty
/// page.
pub async fn fetch_page_links(
    session: &mut ManagedSession,
    adapter: &dyn SiteAdapter,
    page_url: &str,
    policy: &RetryPolicy,
) -> PageOutcome {
    let mut empty_retries_left = policy.empty_retries;

    loop {
        let harvest = match harvest_with_recovery(session, adapter, page_url, policy).await {
            Ok(harvest) => harvest,
            Err(reason) => return PageOutcome::Skipped { reason },
        };

        if !harvest.urls.is_empty() {
            return PageOutcome::Links(harvest);
        }

        if empty_retries_left == 0 {
            warn!("no links found for {page_url} after empty-retry budget, skipping page");
            return PageOutcome::Exhausted;
        }

        warn!(
            "no links on {page_url}, retrying ({empty_retries_left} empty retries left)"
        );
        if empty_retries_left == 1 {
            if let Err(e) = session.restart().await {
                return PageOutcome::Skipped {
                    reason: format!("session restart failed for {page_url}: {e}"),
                };
            }
        } else if let Ok(page) = session.page() {
            let _ = page.refresh().await;
        }
        tokio::time::sleep(policy.retry_pause).await;
        empty_retries_left -= 1;
    }
}

/// One harvest with session-restart recovery, bounded by `max_attempts`.
async fn harvest_with_recovery(
    session: &mut ManagedSession,
    adapter: &dyn SiteAdapter,
    page_url: &str,
    policy: &RetryPolicy,
) -> Result<Harvest, String> {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts.max(1) {
        let result = match session.page() {
            Ok(page) => adapter.harvest_links(page, page_url).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(harvest) => return Ok(harvest),
            Err(e) => {
                warn!(
                    "page load failed ({attempt}/{}) for {page_url}: {e}",
                    policy.max_attempts
                );
                let needs_restart = e.needs_restart();
                last_error = e.to_string();
                if needs_restart {
                    if let Err(restart_err) = session.restart().await {
                        return Err(format!(
                            "session restart failed for {page_url}: {restart_err}"
                        ));
                    }
                }
            }
        }
    }

    Err(format!(
        "page load failed for {page_url} after {} attempts: {last_error}",
        policy.max_attempts
    ))
}
