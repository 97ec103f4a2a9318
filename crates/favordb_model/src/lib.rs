//! # FavorDB Model
//!
//! The Favor app's persisted entities and the migration table that brings
//! any older store up to [`TARGET_SCHEMA_VERSION`].
//!
//! | entity | key | notes |
//! |---|---|---|
//! | [`User`] | `user_no` | favor tags as an integer set, embedded anniversaries |
//! | [`Friend`] | `friend_no` | optional link to a [`User`] |
//! | [`Gift`] | `gift_no` | embedded photos, links to friends |
//! | [`Reminder`] | `reminder_no` | optional link to a [`Friend`] |
//! | [`RecentSearch`] | derived from the search text | |
//!
//! [`Anniversary`] and [`Photo`] are embedded records, not tables.
//!
//! ```no_run
//! # async fn demo() -> favordb_core::CoreResult<()> {
//! use favordb_core::StoreConfig;
//! use favordb_model::{open_store, RecentSearch};
//!
//! let store = open_store("favor.store", StoreConfig::default())?;
//! store.update(RecentSearch::new("scented candle", 1_700_000_000_000)).await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entities;
mod migrations;

pub use entities::{Anniversary, Friend, Gift, Photo, RecentSearch, Reminder, User};
pub use migrations::{favor_migrations, DEFAULT_PRIVATE_CATEGORY, TARGET_SCHEMA_VERSION};

use favordb_core::{CoreResult, Store, StoreConfig};
use std::path::Path;

/// Opens the Favor store at `path`, migrating it to the current schema.
///
/// # Errors
///
/// See [`Store::open`].
pub fn open_store(path: impl AsRef<Path>, config: StoreConfig) -> CoreResult<Store> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), version = TARGET_SCHEMA_VERSION, "opening favor store");
    Store::open(path, config, &favor_migrations()?)
}
