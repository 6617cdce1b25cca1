//! Bounded worker-pool fan-out over independent crawl tasks.
//!
//! Workers claim tasks from a shared queue; each task runs end-to-end in
//! one worker with its own session, and results are aggregated in
//! completion order over a channel. A task that errors is logged and
//! excluded from the aggregate without cancelling its siblings.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use crate::models::{CrawlStats, CrawlTask, Listing};

/// What one completed task contributed to the run.
#[derive(Debug)]
pub struct TaskReport {
    pub task: CrawlTask,
    pub listings: Vec<Listing>,
    pub stats: CrawlStats,
}

/// Run `tasks` under at most `worker_ceiling` concurrent workers.
///
/// The effective worker count is the minimum of the ceiling and the task
/// count, and never zero while tasks exist. Results arrive in completion
/// order, not submission order.
pub async fn run_tasks<F, Fut>(
    tasks: Vec<CrawlTask>,
    worker_ceiling: usize,
    runner: F,
) -> Vec<TaskReport>
where
    F: Fn(CrawlTask) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = anyhow::Result<TaskReport>> + Send + 'static,
{
    if tasks.is_empty() {
        return Vec::new();
    }

    let workers = worker_ceiling.max(1).min(tasks.len());
    let queue = Arc::new(Mutex::new(tasks.into_iter().collect::<VecDeque<_>>()));
    let (report_tx, mut report_rx) = mpsc::channel::<TaskReport>(workers);

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let queue = queue.clone();
        let report_tx = report_tx.clone();
        let runner = runner.clone();

        let handle = tokio::spawn(async move {
            loop {
                // Claim the next task; an empty queue ends the worker.
                let task = match queue.lock().await.pop_front() {
                    Some(task) => task,
                    None => break,
                };

                let label = task.label.clone();
                info!("worker {worker_id} starting task {label}");
                match runner(task).await {
                    Ok(report) => {
                        let _ = report_tx.send(report).await;
                    }
                    Err(e) => {
                        error!("task {label} failed: {e}");
                    }
                }
            }
        });
        handles.push(handle);
    }
    drop(report_tx);

    // Aggregate in completion order while the workers drain the queue.
    let mut reports = Vec::new();
    while let Some(report) = report_rx.recv().await {
        reports.push(report);
    }

    for handle in handles {
        let _ = handle.await;
    }

    reports
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn task(label: &str) -> CrawlTask {
        CrawlTask::new(label, "keyword", format!("https://x/{label}"))
    }

    fn listing(url: &str) -> Listing {
        Listing {
            title: "t".into(),
            price: "p".into(),
            condition: "c".into(),
            upload_time: "u".into(),
            region: "r".into(),
            url: url.into(),
            image_url: String::new(),
            status: Default::default(),
            description: None,
            platform: "test".into(),
            category: "k".into(),
        }
    }

    #[tokio::test]
    async fn failed_task_does_not_cancel_siblings() {
        let reports = run_tasks(vec![task("ok"), task("boom")], 2, |task| async move {
            if task.label == "boom" {
                anyhow::bail!("session died");
            }
            let url = format!("{}/item", task.url);
            Ok(TaskReport {
                listings: vec![listing(&url)],
                stats: CrawlStats::default(),
                task,
            })
        })
        .await;

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].task.label, "ok");
        assert_eq!(reports[0].listings.len(), 1);
    }

    #[tokio::test]
    async fn tasks_stay_isolated_across_workers() {
        let reports = run_tasks(vec![task("a"), task("b")], 2, |task| async move {
            // Stagger completion so results interleave across workers.
            if task.label == "a" {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let url = format!("{}/item", task.url);
            Ok(TaskReport {
                listings: vec![listing(&url)],
                stats: CrawlStats::default(),
                task,
            })
        })
        .await;

        assert_eq!(reports.len(), 2);
        for report in &reports {
            // Each task's listings reference only its own URL space.
            assert!(report.listings.iter().all(|l| l.url.starts_with(&report.task.url)));
        }
    }

    #[tokio::test]
    async fn worker_count_is_clamped_to_task_count() {
        // Queue of one task under a large ceiling completes exactly once.
        let reports = run_tasks(vec![task("solo")], 64, |task| async move {
            Ok(TaskReport {
                listings: Vec::new(),
                stats: CrawlStats::default(),
                task,
            })
        })
        .await;
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn empty_task_list_yields_no_reports() {
        let reports = run_tasks(Vec::new(), 4, |task| async move {
            Ok(TaskReport {
                listings: Vec::new(),
                stats: CrawlStats::default(),
                task,
            })
        })
        .await;
        assert!(reports.is_empty());
    }
}
