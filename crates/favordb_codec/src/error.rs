//! Error types for the codec crate.

use crate::value::ValueKind;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding, decoding or reading records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Serializing to CBOR failed.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// What went wrong.
        message: String,
    },

    /// Deserializing from CBOR failed.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// What went wrong.
        message: String,
    },

    /// A required field is absent from a record.
    #[error("missing field `{field}`")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A field holds a value of another kind than the reader expects.
    #[error("field `{field}` is {found}, expected {expected}")]
    WrongKind {
        /// Field name.
        field: String,
        /// Kind the reader asked for.
        expected: ValueKind,
        /// Kind actually stored.
        found: ValueKind,
    },

    /// An integer does not fit the target type.
    #[error("integer {value} out of range for field `{field}`")]
    IntegerOutOfRange {
        /// Field name.
        field: String,
        /// Offending value.
        value: i128,
    },
}

impl CodecError {
    /// Creates an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Creates a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a wrong kind error.
    pub fn wrong_kind(field: impl Into<String>, expected: ValueKind, found: ValueKind) -> Self {
        Self::WrongKind {
            field: field.into(),
            expected,
            found,
        }
    }
}
