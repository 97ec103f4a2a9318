//! Migrate command implementation.

use super::{open_copy, read_store};
use favordb_core::{MigrationReport, StoreConfig};
use favordb_model::{favor_migrations, open_store};
use std::path::Path;

/// Runs the migrate command.
///
/// A dry run replays the steps on an in-memory copy and prints the plan.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if dry_run {
        let engine = open_copy(read_store(path)?)?;
        let report = engine.preview_migration(&favor_migrations()?)?;
        println!("Dry run, nothing written.");
        print_report(&report);
        return Ok(());
    }
    let store = open_store(path, StoreConfig::default().create_if_missing(false))?;
    print_report(store.migration_report());
    super::block_on(store.shutdown())?;
    Ok(())
}

fn print_report(report: &MigrationReport) {
    if !report.migrated() {
        println!("Store is up to date at {}.", report.to);
        return;
    }
    println!("Migration {} -> {}", report.from, report.to);
    for step in &report.applied {
        println!(
            "  {} {:<28} {:<14} {} records",
            step.version, step.name, step.entity_type, step.records
        );
    }
    println!("{} records touched.", report.records_touched());
}
