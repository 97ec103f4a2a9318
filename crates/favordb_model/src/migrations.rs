//! The Favor migration table.
//!
//! | target | entity | change |
//! |---|---|---|
//! | 4 | RecentSearch | `search_text` and `search_date` become required |
//! | 5 | User | `favor_list` becomes an integer set |
//! | 6 | User | `anniversary_list` added |
//! | 7 | Gift | `category` required, `emotion` optional text |
//! | 8 | Friend | `anniversary_list` and `favor_list` added |
//! | 9 | Gift | `private_category` added |
//! | 10 | Gift | `private_category` reset to the default |

use favordb_codec::{CodecError, CodecResult, Record, Value, ValueKind};
use favordb_core::migration::{AddDefault, MigrationResult, RecordShape, RequireFields, TypedStep};
use favordb_core::{MigrationTable, PrimaryKey, SchemaVersion};
use std::collections::BTreeSet;

/// The schema version this build of the model writes.
pub const TARGET_SCHEMA_VERSION: u64 = 10;

/// The private category given to gifts that predate the field.
pub const DEFAULT_PRIVATE_CATEGORY: &str = "가벼운선물";

/// Builds the migration table for [`TARGET_SCHEMA_VERSION`].
///
/// # Errors
///
/// Fails only if the table itself is inconsistent.
pub fn favor_migrations() -> MigrationResult<MigrationTable> {
    MigrationTable::new(SchemaVersion::new(TARGET_SCHEMA_VERSION))
        .with(
            RequireFields::new(4, "RecentSearch")
                .field("search_text", ValueKind::Text)
                .field("search_date", ValueKind::Integer)
                .named("require_search_fields"),
        )?
        .with(TypedStep::new(
            5,
            "User",
            "favor_list_to_set",
            |old: LegacyFavors| Ok(FavorSet(old.0.into_iter().collect())),
        ))?
        .with(AddDefault::new(6, "User", "anniversary_list", Value::List(Vec::new())))?
        .with(
            RequireFields::new(7, "Gift")
                .field("category", ValueKind::Text)
                .nullable("emotion", ValueKind::Text)
                .named("require_gift_category"),
        )?
        .with(AddDefault::new(8, "Friend", "anniversary_list", Value::List(Vec::new())))?
        .with(AddDefault::new(8, "Friend", "favor_list", Value::List(Vec::new())))?
        .with(AddDefault::new(9, "Gift", "private_category", DEFAULT_PRIVATE_CATEGORY))?
        .with(AddDefault::new(10, "Gift", "private_category", DEFAULT_PRIVATE_CATEGORY).overwrite())
}

/// `favor_list` before v5: a list that may repeat tags.
struct LegacyFavors(Vec<i64>);

impl RecordShape for LegacyFavors {
    fn from_record(_key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        // Unlike the current decoder, an absent list is an error here.
        if !record.contains("favor_list") {
            return Err(CodecError::missing_field("favor_list"));
        }
        Ok(Self(record.integers("favor_list")?))
    }

    fn to_record(&self) -> Record {
        Record::new().with(
            "favor_list",
            Value::List(self.0.iter().copied().map(Value::Integer).collect()),
        )
    }
}

struct FavorSet(BTreeSet<i64>);

impl RecordShape for FavorSet {
    fn from_record(_key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self(record.integers("favor_list")?.into_iter().collect()))
    }

    fn to_record(&self) -> Record {
        Record::new().with("favor_list", Value::int_set(self.0.iter().copied()))
    }
}
