//! # FavorDB Codec
//!
//! The record representation every FavorDB entity is stored as, and its CBOR
//! encoding.
//!
//! A [`Record`] is an ordered map from field name to [`Value`]. Entities
//! convert themselves to and from records; migration steps operate on records
//! directly, reading legacy fields through typed accessors that fail with
//! [`CodecError::MissingField`] or [`CodecError::WrongKind`] instead of
//! producing a half-valid record.
//!
//! Supported values: null, booleans, 64-bit signed integers, text, byte
//! strings, lists and nested records. Floats are rejected so that encoding a
//! record is deterministic. Timestamps are stored as integer milliseconds.
//!
//! ```
//! use favordb_codec::{from_cbor, to_cbor, Record, Value};
//!
//! let gift = Record::new()
//!     .with("name", "Scented candle")
//!     .with("is_pinned", false)
//!     .with("friend_no", Value::Null);
//!
//! let bytes = to_cbor(&gift).unwrap();
//! let decoded: Record = from_cbor(&bytes).unwrap();
//! assert_eq!(decoded.text("name").unwrap(), "Scented candle");
//! assert_eq!(decoded.optional_integer("friend_no").unwrap(), None);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod record;
mod value;

pub use cbor::{from_cbor, to_cbor};
pub use error::{CodecError, CodecResult};
pub use record::Record;
pub use value::{Value, ValueKind};
