//! Frozen snapshots and live views.

use crate::engine::Table;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::types::{PrimaryKey, SequenceNumber};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// An immutable copy of a stored record.
///
/// Stamped with the commit sequence it was read at. Later writes make it
/// stale, never different; see [`Store::is_current`](crate::Store::is_current).
pub struct Frozen<T> {
    value: Arc<T>,
    key: PrimaryKey,
    seq: SequenceNumber,
}

impl<T> Frozen<T> {
    pub(crate) fn new(value: T, key: PrimaryKey, seq: SequenceNumber) -> Self {
        Self {
            value: Arc::new(value),
            key,
            seq,
        }
    }

    /// Primary key of the record.
    #[must_use]
    pub fn key(&self) -> PrimaryKey {
        self.key
    }

    /// Sequence number the snapshot was taken at.
    #[must_use]
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Shared pointer to the value.
    #[must_use]
    pub fn shared(&self) -> Arc<T> {
        Arc::clone(&self.value)
    }

    /// Takes the value, cloning only if the snapshot is shared.
    #[must_use]
    pub fn into_inner(self) -> T
    where
        T: Clone,
    {
        Arc::try_unwrap(self.value).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl<T> Clone for Frozen<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            key: self.key,
            seq: self.seq,
        }
    }
}

impl<T> Deref for Frozen<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> AsRef<T> for Frozen<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Frozen<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frozen")
            .field("key", &self.key)
            .field("seq", &self.seq)
            .field("value", &self.value)
            .finish()
    }
}

/// Equal when key and value match, regardless of when each was taken.
impl<T: PartialEq> PartialEq for Frozen<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.value == other.value
    }
}

impl<T: Eq> Eq for Frozen<T> {}

/// A borrowed view over the live table of `T`.
///
/// Only handed out inside [`Store::with_live`](crate::Store::with_live),
/// which runs on the store thread. The view is `!Send` and cannot outlive
/// the closure.
pub struct LiveView<'a, T> {
    table: Option<&'a Table>,
    seq: SequenceNumber,
    owner: ThreadId,
    _marker: PhantomData<(fn() -> T, *const ())>,
}

impl<'a, T: Entity> LiveView<'a, T> {
    pub(crate) fn new(table: Option<&'a Table>, seq: SequenceNumber) -> Self {
        Self {
            table,
            seq,
            owner: thread::current().id(),
            _marker: PhantomData,
        }
    }

    fn table(&self) -> Option<&'a Table> {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "live view used off the store thread"
        );
        self.table
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table().map_or(0, |t| t.len())
    }

    /// Returns `true` if no record is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last committed sequence number.
    #[must_use]
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Whether `key` is stored.
    #[must_use]
    pub fn contains(&self, key: PrimaryKey) -> bool {
        self.table().is_some_and(|t| t.contains_key(&key))
    }

    /// Stored keys in order.
    pub fn keys(&self) -> impl Iterator<Item = PrimaryKey> + 'a {
        self.table().into_iter().flat_map(|t| t.keys().copied())
    }

    /// Decodes one record.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored record does not decode as `T`.
    pub fn get(&self, key: PrimaryKey) -> CoreResult<Option<T>> {
        match self.table().and_then(|t| t.get(&key)) {
            Some(stored) => Ok(Some(T::from_record(key, &stored.record)?)),
            None => Ok(None),
        }
    }

    /// Decodes every record in key order.
    pub fn iter(&self) -> impl Iterator<Item = CoreResult<T>> + 'a {
        self.table().into_iter().flat_map(|t| {
            t.iter()
                .map(|(key, stored)| T::from_record(*key, &stored.record).map_err(CoreError::from))
        })
    }

    /// Freezes one record.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored record does not decode as `T`.
    pub fn freeze(&self, key: PrimaryKey) -> CoreResult<Option<Frozen<T>>> {
        Ok(self.get(key)?.map(|value| Frozen::new(value, key, self.seq)))
    }

    /// Freezes every record in key order.
    ///
    /// # Errors
    ///
    /// Returns a codec error if a stored record does not decode as `T`.
    pub fn freeze_all(&self) -> CoreResult<Vec<Frozen<T>>> {
        let seq = self.seq;
        self.table()
            .into_iter()
            .flat_map(|t| t.iter())
            .map(|(key, stored)| -> CoreResult<Frozen<T>> {
                Ok(Frozen::new(T::from_record(*key, &stored.record)?, *key, seq))
            })
            .collect()
    }
}
