//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use favordb_codec::{CodecResult, Record};
use favordb_core::{Entity, MigrationTable, PrimaryKey, SchemaVersion, Store, StoreConfig};

/// A small entity with one optional field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub no: u64,
    pub name: String,
    pub count: i64,
    pub note: Option<String>,
}

impl Entity for Item {
    const TYPE_NAME: &'static str = "Item";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.no)
    }

    fn to_record(&self) -> Record {
        let mut record = Record::new()
            .with("name", self.name.as_str())
            .with("count", self.count);
        if let Some(note) = &self.note {
            record.insert("note", note.as_str());
        }
        record
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            no: key.as_u64(),
            name: record.text("name")?.to_string(),
            count: record.integer("count")?,
            note: record.optional_text("note")?.map(str::to_string),
        })
    }
}

/// A second entity type, to check operations stay within one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub no: u64,
    pub label: String,
}

impl Entity for Tag {
    const TYPE_NAME: &'static str = "Tag";

    fn primary_key(&self) -> PrimaryKey {
        PrimaryKey::new(self.no)
    }

    fn to_record(&self) -> Record {
        Record::new().with("label", self.label.as_str())
    }

    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
        Ok(Self {
            no: key.as_u64(),
            label: record.text("label")?.to_string(),
        })
    }
}

pub fn item(no: u64, name: &str) -> Item {
    Item {
        no,
        name: name.to_string(),
        count: 1,
        note: None,
    }
}

pub fn tag(no: u64, label: &str) -> Tag {
    Tag {
        no,
        label: label.to_string(),
    }
}

pub fn key(no: u64) -> PrimaryKey {
    PrimaryKey::new(no)
}

pub fn no_migrations() -> MigrationTable {
    MigrationTable::new(SchemaVersion::new(1))
}

pub fn memory_store() -> Store {
    Store::open_in_memory(StoreConfig::default(), &no_migrations()).unwrap()
}

pub fn memory_store_result() -> favordb_core::CoreResult<Store> {
    Store::open_in_memory(StoreConfig::default(), &no_migrations())
}
