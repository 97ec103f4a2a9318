//! Favor entities.

mod anniversary;
mod friend;
mod gift;
mod photo;
mod recent_search;
mod reminder;
mod user;

pub use anniversary::Anniversary;
pub use friend::Friend;
pub use gift::Gift;
pub use photo::Photo;
pub use recent_search::RecentSearch;
pub use reminder::Reminder;
pub use user::User;

use favordb_codec::{CodecResult, Record, Value};
use favordb_core::PrimaryKey;

// Keys are stored as the bit pattern of the u64 in a signed integer.

pub(crate) fn key_value(key: PrimaryKey) -> Value {
    Value::Integer(key.as_u64() as i64)
}

pub(crate) fn optional_key_value(key: Option<PrimaryKey>) -> Value {
    key.map_or(Value::Null, key_value)
}

pub(crate) fn key_list_value(keys: &[PrimaryKey]) -> Value {
    Value::List(keys.iter().copied().map(key_value).collect())
}

pub(crate) fn read_key(record: &Record, field: &str) -> CodecResult<PrimaryKey> {
    Ok(PrimaryKey::new(record.integer(field)? as u64))
}

pub(crate) fn read_optional_key(record: &Record, field: &str) -> CodecResult<Option<PrimaryKey>> {
    Ok(record
        .optional_integer(field)?
        .map(|n| PrimaryKey::new(n as u64)))
}

pub(crate) fn read_key_list(record: &Record, field: &str) -> CodecResult<Vec<PrimaryKey>> {
    Ok(record
        .integers(field)?
        .into_iter()
        .map(|n| PrimaryKey::new(n as u64))
        .collect())
}

pub(crate) fn optional_text_value(text: Option<&str>) -> Value {
    text.map_or(Value::Null, Value::from)
}
