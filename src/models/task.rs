//! Crawl task descriptors for scheduler fan-out.

/// One independent, concurrently schedulable unit of crawl work.
///
/// A task owns exactly one browser session for its lifetime; tasks share
/// nothing but the listing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Human-readable label used in logs and task reports.
    pub label: String,
    /// Category (or keyword bucket) results are tagged with.
    pub category: String,
    /// Entry URL the task harvests.
    pub url: String,
}

impl CrawlTask {
    pub fn new(
        label: impl Into<String>,
        category: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            category: category.into(),
            url: url.into(),
        }
    }
}
