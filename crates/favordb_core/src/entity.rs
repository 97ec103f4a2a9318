//! The entity trait.

use crate::types::PrimaryKey;
use favordb_codec::{CodecResult, Record};

/// A persisted record type.
///
/// Entities are stored as [`Record`]s in a table named [`Entity::TYPE_NAME`],
/// keyed by [`Entity::primary_key`]. The key is not part of the record.
///
/// # Example
///
/// ```
/// use favordb_codec::{CodecResult, Record};
/// use favordb_core::{Entity, PrimaryKey};
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Memo {
///     no: u64,
///     text: String,
/// }
///
/// impl Entity for Memo {
///     const TYPE_NAME: &'static str = "Memo";
///
///     fn primary_key(&self) -> PrimaryKey {
///         PrimaryKey::new(self.no)
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new().with("text", self.text.as_str())
///     }
///
///     fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
///         Ok(Self {
///             no: key.as_u64(),
///             text: record.text("text")?.to_string(),
///         })
///     }
/// }
/// ```
pub trait Entity: Sized + Send + Sync + 'static {
    /// Table name. Must be stable across releases; migration steps refer to it.
    const TYPE_NAME: &'static str;

    /// Returns the primary key.
    fn primary_key(&self) -> PrimaryKey;

    /// Encodes the entity's fields.
    fn to_record(&self) -> Record;

    /// Decodes an entity from its stored fields.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a required field is missing or has the
    /// wrong kind.
    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self>;
}
