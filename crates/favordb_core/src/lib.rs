//! # FavorDB Core
//!
//! The versioned embedded object store behind the Favor app.
//!
//! This crate provides:
//! - The store file format: a checksummed header carrying the schema version,
//!   then one CBOR frame per committed write
//! - A schema [`MigrationTable`] applied once when the store opens
//! - The [`Store`] handle: one engine on one dedicated thread, all access
//!   serialized onto it
//! - An async CRUD façade returning [`Frozen`] snapshots, plus
//!   [`LiveView`]s that only exist on the store thread
//! - Bulk operations, including the set-difference [`Store::retain_only`]
//!
//! ```
//! use favordb_codec::{CodecResult, Record};
//! use favordb_core::{Entity, MigrationTable, PrimaryKey, SchemaVersion, Store, StoreConfig};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Memo {
//!     no: u64,
//!     text: String,
//! }
//!
//! impl Entity for Memo {
//!     const TYPE_NAME: &'static str = "Memo";
//!
//!     fn primary_key(&self) -> PrimaryKey {
//!         PrimaryKey::new(self.no)
//!     }
//!
//!     fn to_record(&self) -> Record {
//!         Record::new().with("text", self.text.as_str())
//!     }
//!
//!     fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
//!         Ok(Self { no: key.as_u64(), text: record.text("text")?.to_string() })
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let migrations = MigrationTable::new(SchemaVersion::new(1));
//! let store = Store::open_in_memory(StoreConfig::default(), &migrations).unwrap();
//!
//! let memo = Memo { no: 1, text: "buy flowers".into() };
//! store.create(memo.clone()).await.unwrap();
//!
//! let found = store.get::<Memo>(PrimaryKey::new(1)).await.unwrap().unwrap();
//! assert_eq!(*found, memo);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod entity;
mod error;
pub mod format;
mod lock;
pub mod migration;
mod snapshot;
mod store;
mod types;

pub use config::{StoreConfig, DEFAULT_THREAD_NAME};
pub use engine::{CompactionStats, Engine, Scan, StoreStats, UpdatePolicy};
pub use entity::Entity;
pub use error::{CoreError, CoreResult};
pub use migration::{MigrationError, MigrationReport, MigrationStep, MigrationTable};
pub use snapshot::{Frozen, LiveView};
pub use store::{Pending, SharedStore, Store};
pub use types::{PrimaryKey, SchemaVersion, SequenceNumber};
