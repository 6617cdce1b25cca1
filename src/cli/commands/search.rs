//! Search command: region×keyword task fan-out for daangn.

use std::path::PathBuf;

use anyhow::Context;

use crate::config::Settings;

use super::crawl::{feed_tasks, run_feed_site};

/// Run daangn search tasks, overriding keywords and regions from the CLI.
pub async fn cmd_search(
    settings: &Settings,
    keywords: Vec<String>,
    regions_file: Option<PathBuf>,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let mut site_config = settings.site("daangn").cloned().unwrap_or_default();

    if let Some(path) = regions_file {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        site_config.regions = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
    }
    if !keywords.is_empty() {
        site_config.keywords = keywords;
    }

    let tasks = feed_tasks(&site_config)?;
    run_feed_site(settings, "daangn", tasks, workers).await
}
