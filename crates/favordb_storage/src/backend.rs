//! Storage backend trait definition.

use crate::error::StorageResult;

/// A byte store holding the contents of one FavorDB store file.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, which equals the
///   size before the call.
/// - `read_at` returns exactly the bytes previously written at that offset.
/// - `rewrite` replaces the whole contents atomically: after a crash either
///   the old or the new contents are visible, never a mix.
/// - Backends are `Send` so the store can move them onto its own thread.
pub trait StorageBackend: Send {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if the range is not fully inside the stored bytes.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes all written data and metadata durable.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    fn size(&self) -> StorageResult<u64>;

    /// Drops every byte after `new_size`.
    ///
    /// Used to cut off a torn trailing frame or to undo a failed append.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Atomically replaces the whole contents with `data`.
    fn rewrite(&mut self, data: &[u8]) -> StorageResult<()>;

    /// Reads the complete contents.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size).unwrap_or(usize::MAX);
        self.read_at(0, len)
    }
}
