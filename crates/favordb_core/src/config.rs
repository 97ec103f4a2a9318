//! Store configuration.

/// Default name of the store thread.
pub const DEFAULT_THREAD_NAME: &str = "favordb-store";

/// Configuration for opening a store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the store file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the file after every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Number of replayed frames above which `open` compacts the file
    /// (0 = never).
    pub compact_on_open_threshold: u64,

    /// Name of the dedicated store thread.
    pub thread_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            compact_on_open_threshold: 1024,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the store file if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the frame count above which `open` compacts.
    #[must_use]
    pub const fn compact_on_open_threshold(mut self, frames: u64) -> Self {
        self.compact_on_open_threshold = frames;
        self
    }

    /// Sets the store thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
