//! Status command.

use console::style;

use crate::config::Settings;
use crate::store::ListingStore;

/// Show stored listing counts per platform.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let store = ListingStore::open(&settings.database_path())?;
    let counts = store.counts_by_platform()?;

    if counts.is_empty() {
        println!("{} no listings stored yet", style("!").yellow());
        return Ok(());
    }

    let mut total = 0;
    for (platform, count) in &counts {
        println!("  {platform:<12} {count}");
        total += count;
    }
    println!(
        "{} {} listings in {}",
        style("✓").green(),
        total,
        settings.database_path().display()
    );

    Ok(())
}
