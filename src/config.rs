//! Configuration for marketharvest.
//!
//! Settings load from `marketharvest.toml` in the working directory when
//! present; every field has a documented default so the tool runs without
//! any config file. The database path can be overridden with the
//! `MARKETHARVEST_DB` environment variable.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "marketharvest.db";

/// Config filename looked up in the working directory.
pub const CONFIG_FILENAME: &str = "marketharvest.toml";

/// Top-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base data directory (database lives here).
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Directory for per-run summary files.
    pub output_dir: PathBuf,
    /// Crawl engine tunables.
    pub crawl: CrawlSettings,
    /// Per-site crawl configuration, keyed by site id.
    pub sites: BTreeMap<String, SiteConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to a per-user data dir, falling back to home, then cwd.
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("marketharvest");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            output_dir: PathBuf::from("./output"),
            crawl: CrawlSettings::default(),
            sites: default_sites(),
        }
    }
}

impl Settings {
    /// Load settings from `marketharvest.toml` if present, else defaults.
    pub fn load(data_dir_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut settings = match std::fs::read_to_string(CONFIG_FILENAME) {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parsing {}", CONFIG_FILENAME))?,
            Err(_) => Self::default(),
        };
        if let Some(data_dir) = data_dir_override {
            settings.data_dir = data_dir;
        }
        Ok(settings)
    }

    /// Path to the listing database, honoring the `MARKETHARVEST_DB` override.
    pub fn database_path(&self) -> PathBuf {
        match std::env::var("MARKETHARVEST_DB") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => self.data_dir.join(&self.database_filename),
        }
    }

    /// Create the data and output directories if missing.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating {}", self.output_dir.display()))?;
        Ok(())
    }

    /// Config for a site id, if one is known.
    pub fn site(&self, site_id: &str) -> Option<&SiteConfig> {
        self.sites.get(site_id)
    }
}

/// Crawl engine tunables with their documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// Page navigation timeout in seconds (default 30).
    pub nav_timeout_secs: u64,
    /// Element visibility/presence wait in seconds (default 5).
    pub element_wait_secs: u64,
    /// Pause after a missed element wait before proceeding, in ms (default 500).
    pub wait_fallback_ms: u64,
    /// Pause between scroll cycles in ms (default 400).
    pub scroll_pause_ms: u64,
    /// Pause after clicking a "show more" trigger in ms (default 1000).
    pub click_pause_ms: u64,
    /// Ceiling on scroll/rescan cycles per page (default 12).
    pub max_scroll_cycles: u32,
    /// Navigation attempts per page before skipping it (default 3).
    pub page_retry_attempts: u32,
    /// Empty-result retries per page before skipping it (default 2).
    pub empty_page_retries: u32,
    /// Pause between page retries in ms (default 400).
    pub retry_pause_ms: u64,
    /// Worker-pool ceiling for concurrent crawl tasks (default 6).
    pub workers: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            nav_timeout_secs: 30,
            element_wait_secs: 5,
            wait_fallback_ms: 500,
            scroll_pause_ms: 400,
            click_pause_ms: 1000,
            max_scroll_cycles: 12,
            page_retry_attempts: 3,
            empty_page_retries: 2,
            retry_pause_ms: 400,
            workers: 6,
        }
    }
}

impl CrawlSettings {
    pub fn nav_timeout(&self) -> Duration {
        Duration::from_secs(self.nav_timeout_secs)
    }

    pub fn element_wait(&self) -> Duration {
        Duration::from_secs(self.element_wait_secs)
    }

    pub fn wait_fallback(&self) -> Duration {
        Duration::from_millis(self.wait_fallback_ms)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }

    pub fn click_pause(&self) -> Duration {
        Duration::from_millis(self.click_pause_ms)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }
}

/// Per-site crawl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// First page to crawl for paged sites (default 1).
    pub start_page: u32,
    /// Last page to crawl for paged sites (default 100).
    pub end_page: u32,
    /// Category buckets: name plus listing-page base URL.
    pub categories: Vec<Category>,
    /// Region feed URLs for search-task sites.
    pub regions: Vec<String>,
    /// Search keywords combined with each region.
    pub keywords: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            start_page: 1,
            end_page: 100,
            categories: Vec::new(),
            regions: Vec::new(),
            keywords: Vec::new(),
        }
    }
}

impl SiteConfig {
    fn paged(end_page: u32, categories: Vec<Category>) -> Self {
        Self {
            end_page,
            categories,
            ..Default::default()
        }
    }
}

/// A category bucket within a site's taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub url: String,
}

impl Category {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

fn default_sites() -> BTreeMap<String, SiteConfig> {
    let mut sites = BTreeMap::new();

    sites.insert(
        "bunjang".to_string(),
        SiteConfig::paged(
            100,
            vec![
                Category::new(
                    "스마트폰",
                    "https://m.bunjang.co.kr/categories/600700001?&order=date",
                ),
                Category::new(
                    "태블릿",
                    "https://m.bunjang.co.kr/categories/600710100?&order=date",
                ),
            ],
        ),
    );

    sites.insert(
        "joongna".to_string(),
        SiteConfig::paged(
            500,
            vec![
                Category::new(
                    "스마트폰",
                    "https://web.joongna.com/search?category=139&saleYn=SALE_Y&sort=RECENT_SORT",
                ),
                Category::new(
                    "태블릿PC",
                    "https://web.joongna.com/search?category=140&saleYn=SALE_Y&sort=RECENT_SORT",
                ),
            ],
        ),
    );

    sites.insert(
        "daangn".to_string(),
        SiteConfig {
            start_page: 1,
            end_page: 1,
            categories: Vec::new(),
            // Region feed URLs are deployment-specific; configure them in
            // marketharvest.toml before running the daangn crawler.
            regions: Vec::new(),
            keywords: vec![
                "아이폰".to_string(),
                "갤럭시".to_string(),
                "아이패드".to_string(),
            ],
        },
    );

    sites
}
