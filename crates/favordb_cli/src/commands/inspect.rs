//! Inspect command implementation.

use super::{format_size, read_store};
use favordb_core::{Scan, SchemaVersion, SequenceNumber};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// File format revision.
    pub format: u16,
    /// Schema version in the header.
    pub schema_version: SchemaVersion,
    /// Schema version this build writes.
    pub target_version: SchemaVersion,
    /// Complete frames since the last rewrite.
    pub frames: u64,
    /// Last committed sequence number.
    pub seq: SequenceNumber,
    /// Bytes after the last complete frame, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub torn_bytes: Option<u64>,
    /// Records per entity type.
    pub entities: BTreeMap<String, usize>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_store(path)?;
    let result = inspect(path, &data)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Scans `data` without opening the store.
pub fn inspect(path: &Path, data: &[u8]) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let scan = Scan::read(data)?;
    let file_size = data.len() as u64;
    Ok(InspectResult {
        path: path.display().to_string(),
        file_size,
        format: scan.header.format,
        schema_version: scan.header.schema_version,
        target_version: SchemaVersion::new(favordb_model::TARGET_SCHEMA_VERSION),
        frames: scan.frames,
        seq: scan.seq,
        torn_bytes: scan.torn.as_ref().map(|_| file_size - scan.valid_len),
        entities: scan.entity_counts(),
    })
}

fn print_text_output(result: &InspectResult) {
    println!("FavorDB Store Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {}", format_size(result.file_size));
    println!();
    println!("Header:");
    println!("  Format:  v{}", result.format);
    println!(
        "  Schema:  {} (current {})",
        result.schema_version, result.target_version
    );
    println!();
    println!("Log:");
    println!("  Frames:  {}", result.frames);
    println!("  Last:    {}", result.seq);
    if let Some(torn) = result.torn_bytes {
        println!("  Torn:    {torn} bytes after the last frame");
    }
    println!();
    println!("Entities:");
    if result.entities.is_empty() {
        println!("  (none)");
    }
    for (entity_type, count) in &result.entities {
        println!("  {entity_type:<14} {count}");
    }
}
