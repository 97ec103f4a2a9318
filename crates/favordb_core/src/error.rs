//! Error types for FavorDB core.

use crate::migration::MigrationError;
use crate::types::{PrimaryKey, SchemaVersion};
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in FavorDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] favordb_storage::StorageError),

    /// Record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] favordb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `create` found a record with the same primary key.
    #[error("write conflict: {entity_type} {key} already exists")]
    WriteConflict {
        /// Entity type name.
        entity_type: String,
        /// Conflicting key.
        key: PrimaryKey,
    },

    /// The record is not stored.
    #[error("{entity_type} {key} not found")]
    NotFound {
        /// Entity type name.
        entity_type: String,
        /// Missing key.
        key: PrimaryKey,
    },

    /// Transaction was aborted and nothing was committed.
    #[error("transaction aborted: {reason}")]
    TransactionAborted {
        /// Reason for abort.
        reason: String,
    },

    /// The store file is damaged beyond a torn tail.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Not a FavorDB store file, or an unsupported format revision.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Header checksum mismatch.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// The store was written by a newer schema than this build knows.
    #[error("store schema {on_disk} is newer than supported schema {target}")]
    SchemaTooNew {
        /// Version found in the file header.
        on_disk: SchemaVersion,
        /// Highest version this build migrates to.
        target: SchemaVersion,
    },

    /// A migration step failed; the store was left at its previous version.
    #[error("migration failed: {0}")]
    MigrationFailed(#[from] MigrationError),

    /// The store thread has stopped.
    #[error("store is closed")]
    StoreClosed,

    /// Another handle or process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a write conflict error.
    pub fn write_conflict(entity_type: impl Into<String>, key: PrimaryKey) -> Self {
        Self::WriteConflict {
            entity_type: entity_type.into(),
            key,
        }
    }

    /// Creates a not found error.
    pub fn not_found(entity_type: impl Into<String>, key: PrimaryKey) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            key,
        }
    }

    /// Creates a transaction aborted error.
    pub fn transaction_aborted(reason: impl Into<String>) -> Self {
        Self::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
