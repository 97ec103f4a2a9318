//! Locate command implementation.

use std::path::Path;

/// Prints the absolute store path and whether a store exists there.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let absolute = std::path::absolute(path)?;
    println!("{}", absolute.display());
    match std::fs::metadata(&absolute) {
        Ok(meta) => tracing::debug!(bytes = meta.len(), "store exists"),
        Err(_) => tracing::info!("no store at this path yet"),
    }
    Ok(())
}
