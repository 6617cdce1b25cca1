//! Initialize command.

use std::path::Path;

use console::style;

use crate::config::{Settings, CONFIG_FILENAME};
use crate::store::ListingStore;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    ListingStore::open(&settings.database_path())?;

    if !Path::new(CONFIG_FILENAME).exists() {
        println!(
            "{} No {} found in the working directory",
            style("!").yellow(),
            CONFIG_FILENAME
        );
        println!("  Copy marketharvest.example.toml to {CONFIG_FILENAME} to customize sites");
    }

    println!(
        "{} Initialized marketharvest in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
