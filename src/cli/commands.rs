//! CLI commands implementation.

mod crawl;
mod init;
mod run_all;
mod search;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "mkt")]
#[command(about = "Secondhand marketplace listing harvester")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, env = "MARKETHARVEST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Crawl one site's configured categories or feeds
    Crawl {
        /// Site to crawl (bunjang, joongna, daangn)
        site: String,
        /// First page to crawl (paged sites; default from config)
        #[arg(long)]
        start_page: Option<u32>,
        /// Last page to crawl (paged sites; default from config)
        #[arg(long)]
        end_page: Option<u32>,
        /// Number of concurrent task workers (feed sites)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run region×keyword search tasks against daangn
    Search {
        /// Keywords to search (defaults to the configured list)
        #[arg(short, long)]
        keyword: Vec<String>,
        /// File with one region feed URL per line
        #[arg(long)]
        regions_file: Option<PathBuf>,
        /// Number of concurrent task workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run every configured site crawler as a separate process
    RunAll {
        /// First page for paged site crawlers
        #[arg(long)]
        start_page: Option<u32>,
        /// Last page for paged site crawlers
        #[arg(long)]
        end_page: Option<u32>,
    },

    /// Show stored listing counts
    Status,
}

/// Parse arguments and dispatch the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir.clone())?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Crawl {
            site,
            start_page,
            end_page,
            workers,
        } => crawl::cmd_crawl(&settings, &site, start_page, end_page, workers).await,
        Commands::Search {
            keyword,
            regions_file,
            workers,
        } => search::cmd_search(&settings, keyword, regions_file, workers).await,
        Commands::RunAll {
            start_page,
            end_page,
        } => {
            run_all::cmd_run_all(&settings, cli.data_dir.as_deref(), start_page, end_page).await
        }
        Commands::Status => status::cmd_status(&settings).await,
    }
}
