//! CLI command implementations.

pub mod compact;
pub mod inspect;
pub mod locate;
pub mod migrate;
pub mod verify;

use favordb_core::{CoreResult, Engine, SchemaVersion, StoreConfig};
use favordb_storage::InMemoryBackend;
use std::future::Future;
use std::path::Path;

/// Reads the store file at `path`, failing if it does not exist.
pub(crate) fn read_store(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    Ok(std::fs::read(path)?)
}

/// Opens an engine over a private copy of the file, so nothing the engine
/// does (tail truncation included) reaches the disk.
pub(crate) fn open_copy(data: Vec<u8>) -> CoreResult<Engine> {
    let config = StoreConfig::default().create_if_missing(false);
    Engine::open(
        Box::new(InMemoryBackend::with_data(data)),
        &config,
        SchemaVersion::new(0),
    )
}

/// Drives a store future to completion on a private runtime.
pub(crate) fn block_on<T, E>(
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, Box<dyn std::error::Error>>
where
    E: std::error::Error + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(fut).map_err(Into::into)
}

/// Human-readable byte count.
pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_scaled() {
        assert_eq!(format_size(18), "18 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn missing_file_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let err = read_store(&temp.path().join("absent.store")).unwrap_err();
        assert!(err.to_string().contains("No store found"));
    }
}
