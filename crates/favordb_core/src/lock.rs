//! Advisory lock next to the store file.
//!
//! ```text
//! <dir>/
//! ├─ favor.store        # the store
//! └─ favor.store.lock   # held exclusively while a Store is open
//! ```

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive lock on a store file, released on drop.
#[derive(Debug)]
pub(crate) struct StoreLock {
    _lock_file: File,
    #[cfg(test)]
    path: PathBuf,
}

impl StoreLock {
    /// Takes the lock for `store_path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// `DatabaseLocked` if another handle holds it, I/O errors otherwise.
    pub(crate) fn acquire(store_path: &Path) -> CoreResult<Self> {
        let path = lock_path(store_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        // Non-blocking; a second opener fails fast.
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            _lock_file: lock_file,
            #[cfg(test)]
            path,
        })
    }

    /// Path of the held lock file (test-only).
    #[cfg(test)]
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

/// Path of the lock file for a store file.
pub(crate) fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = OsString::from(store_path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}
