//! # FavorDB Storage
//!
//! Byte-level backends underneath the FavorDB store file.
//!
//! A backend knows nothing about headers, frames or records. It holds one
//! growing byte sequence that the store appends commit frames to, and it can
//! swap that sequence for a new one in a single step when the store rewrites
//! itself (schema migration, compaction).
//!
//! - [`FileBackend`] keeps the bytes in one file on disk.
//! - [`InMemoryBackend`] keeps them in a `Vec<u8>`, for tests and scratch stores.
//!
//! ```rust
//! use favordb_storage::{InMemoryBackend, StorageBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"FAVR").unwrap();
//! backend.rewrite(b"FAVR-compacted").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"FAVR-compacted");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
