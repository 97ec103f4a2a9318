//! Compact command implementation.

use super::format_size;
use favordb_core::StoreConfig;
use favordb_model::open_store;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path, StoreConfig::default().create_if_missing(false))?;

    let stats = super::block_on(store.compact())?;
    println!("Compaction complete:");
    println!("  Frames folded: {}", stats.frames_before);
    println!("  Size before:   {}", format_size(stats.bytes_before));
    println!("  Size after:    {}", format_size(stats.bytes_after));

    super::block_on(store.shutdown())?;
    Ok(())
}
