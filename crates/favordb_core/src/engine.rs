//! The storage engine behind a [`Store`](crate::Store).
//!
//! The engine owns the backend and the in-memory tables. It is not shared:
//! the store thread holds the only instance, so every write runs alone.
//!
//! ## Commit path
//!
//! ```text
//! write(|txn| ...) ─► staged copies of touched tables + op list
//!                  ─► frame appended (and fsynced if configured)
//!                  ─► staged tables swapped in, seq advanced
//! ```
//!
//! If the closure fails, nothing is written. If the append fails, the
//! backend is truncated back to its previous size and the tables are left
//! as they were.
//!
//! ## Recovery
//!
//! `open` replays every frame after the header. A torn last frame (crash in
//! the middle of an append) is cut off with a warning; damage before the
//! last frame makes the store unopenable.

use crate::config::StoreConfig;
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::format::{scan_frame, Frame, FrameScan, Header, Op, HEADER_LEN};
use crate::migration::{MigrationReport, MigrationTable, RecordTables};
use crate::snapshot::{Frozen, LiveView};
use crate::types::{PrimaryKey, SchemaVersion, SequenceNumber};
use favordb_codec::Record;
use favordb_storage::{StorageBackend, StorageResult};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// A stored record and the commit that last wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stored {
    pub(crate) record: Record,
    pub(crate) modified: SequenceNumber,
}

/// Records of one entity type.
pub(crate) type Table = BTreeMap<PrimaryKey, Stored>;

type Tables = BTreeMap<String, Table>;

/// How `update` treats an existing record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Insert if missing, else overwrite only the fields the new record
    /// carries. Stored fields it doesn't carry are kept.
    #[default]
    Modified,
    /// Insert if missing, else replace the whole stored record.
    All,
    /// Like [`UpdatePolicy::Modified`], but `NotFound` if the key is absent.
    ErrorIfMissing,
}

/// Result of scanning a store file without opening it.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Decoded header.
    pub header: Header,
    /// Number of complete frames.
    pub frames: u64,
    /// Last committed sequence number.
    pub seq: SequenceNumber,
    /// Length of the valid prefix of the file.
    pub valid_len: u64,
    /// Why the tail after `valid_len` was rejected, if any.
    pub torn: Option<String>,
    tables: Tables,
}

impl Scan {
    /// Scans a complete store image.
    ///
    /// # Errors
    ///
    /// Header errors, `Corrupted` for damage before the last frame.
    pub fn read(data: &[u8]) -> CoreResult<Self> {
        let header = Header::decode(data)?;
        let mut tables = Tables::new();
        let mut seq = SequenceNumber::default();
        let mut frames = 0u64;
        let mut offset = HEADER_LEN;

        let torn = loop {
            match scan_frame(data, offset)? {
                FrameScan::End => break None,
                FrameScan::Torn { reason } => break Some(reason),
                FrameScan::Frame(frame, next) => {
                    if frames > 0 && frame.seq <= seq {
                        return Err(CoreError::corrupted(format!(
                            "frame at offset {offset} has {} after {seq}",
                            frame.seq
                        )));
                    }
                    apply_ops(&mut tables, frame.ops, frame.seq);
                    seq = frame.seq;
                    frames += 1;
                    offset = next;
                }
            }
        };

        Ok(Self {
            header,
            frames,
            seq,
            valid_len: offset as u64,
            torn,
            tables,
        })
    }

    /// Record counts per entity type.
    #[must_use]
    pub fn entity_counts(&self) -> BTreeMap<String, usize> {
        counts(&self.tables)
    }
}

/// Counters reported by [`Engine::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Schema version in the header.
    pub schema_version: SchemaVersion,
    /// Last committed sequence number.
    pub seq: SequenceNumber,
    /// Frames in the file since the last rewrite.
    pub frames: u64,
    /// File size in bytes.
    pub file_bytes: u64,
    /// Records per entity type.
    pub entities: BTreeMap<String, usize>,
}

/// Sizes before and after a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    /// File size before.
    pub bytes_before: u64,
    /// File size after.
    pub bytes_after: u64,
    /// Frames folded into the snapshot.
    pub frames_before: u64,
}

/// The single live connection to a store.
pub struct Engine {
    backend: Box<dyn StorageBackend>,
    header: Header,
    tables: Tables,
    seq: SequenceNumber,
    frames: u64,
    sync_on_commit: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("header", &self.header)
            .field("seq", &self.seq)
            .field("frames", &self.frames)
            .field("entities", &counts(&self.tables))
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Opens the store held by `backend`.
    ///
    /// An empty backend becomes a new store at `initial_version`. An
    /// existing store is replayed; a torn tail is truncated.
    ///
    /// # Errors
    ///
    /// Storage errors, header errors, or `Corrupted`.
    pub fn open(
        mut backend: Box<dyn StorageBackend>,
        config: &StoreConfig,
        initial_version: SchemaVersion,
    ) -> CoreResult<Self> {
        if backend.size()? == 0 {
            if !config.create_if_missing {
                return Err(CoreError::invalid_operation("store is empty"));
            }
            let header = Header::new(initial_version);
            backend.append(&header.encode())?;
            backend.flush()?;
            backend.sync()?;
            info!(version = %initial_version, "created new store");
            return Ok(Self {
                backend,
                header,
                tables: Tables::new(),
                seq: SequenceNumber::default(),
                frames: 0,
                sync_on_commit: config.sync_on_commit,
            });
        }

        let data = backend.read_all()?;
        let scan = Scan::read(&data)?;
        if let Some(reason) = &scan.torn {
            warn!(
                offset = scan.valid_len,
                dropped = data.len() as u64 - scan.valid_len,
                reason = %reason,
                "truncating torn tail"
            );
            backend.truncate(scan.valid_len)?;
            backend.sync()?;
        }
        debug!(
            version = %scan.header.schema_version,
            frames = scan.frames,
            seq = %scan.seq,
            "store replayed"
        );

        Ok(Self {
            backend,
            header: scan.header,
            tables: scan.tables,
            seq: scan.seq,
            frames: scan.frames,
            sync_on_commit: config.sync_on_commit,
        })
    }

    /// Schema version in the header.
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.header.schema_version
    }

    /// Last committed sequence number.
    #[must_use]
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Frames in the file since the last rewrite.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Entity types with at least one record.
    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of records of `entity_type`.
    #[must_use]
    pub fn count(&self, entity_type: &str) -> usize {
        self.tables.get(entity_type).map_or(0, |t| t.len())
    }

    /// Raw records of `entity_type` in key order.
    pub fn records(&self, entity_type: &str) -> impl Iterator<Item = (PrimaryKey, &Record)> {
        self.tables
            .get(entity_type)
            .into_iter()
            .flat_map(|t| t.iter().map(|(k, s)| (*k, &s.record)))
    }

    /// Current counters.
    ///
    /// # Errors
    ///
    /// Storage errors reading the file size.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        Ok(StoreStats {
            schema_version: self.header.schema_version,
            seq: self.seq,
            frames: self.frames,
            file_bytes: self.backend.size()?,
            entities: counts(&self.tables),
        })
    }

    pub(crate) fn table(&self, entity_type: &str) -> Option<&Table> {
        self.tables.get(entity_type)
    }

    /// Runs `f` as one write transaction.
    ///
    /// Either every change `f` made is committed as one frame, or none is.
    pub(crate) fn write<R>(
        &mut self,
        f: impl FnOnce(&mut WriteTxn<'_>) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let seq = self.seq.next();
        let mut txn = WriteTxn::new(&self.tables, seq);
        let result = f(&mut txn)?;
        let WriteTxn { staged, ops, .. } = txn;
        if ops.is_empty() {
            return Ok(result);
        }

        self.append_frame(&Frame { seq, ops })?;
        for (entity_type, table) in staged {
            if table.is_empty() {
                self.tables.remove(&entity_type);
            } else {
                self.tables.insert(entity_type, table);
            }
        }
        self.seq = seq;
        Ok(result)
    }

    fn append_frame(&mut self, frame: &Frame) -> CoreResult<()> {
        let bytes = frame.encode()?;
        let before = self.backend.size()?;
        if let Err(e) = self.append_bytes(&bytes) {
            if let Err(undo) = self.backend.truncate(before) {
                warn!(error = %undo, "could not roll back partial frame");
            }
            return Err(e.into());
        }
        self.frames += 1;
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> StorageResult<()> {
        self.backend.append(bytes)?;
        self.backend.flush()?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Flushes and fsyncs the backend.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }

    /// Rewrites the file as the header plus one snapshot frame.
    ///
    /// # Errors
    ///
    /// Codec or storage errors; the old file stays in place on failure.
    pub fn compact(&mut self) -> CoreResult<CompactionStats> {
        let bytes_before = self.backend.size()?;
        let frames_before = self.frames;
        self.rewrite(self.header)?;
        let stats = CompactionStats {
            bytes_before,
            bytes_after: self.backend.size()?,
            frames_before,
        };
        info!(
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            frames = frames_before,
            "store compacted"
        );
        Ok(stats)
    }

    fn rewrite(&mut self, header: Header) -> CoreResult<()> {
        let mut image = header.encode().to_vec();
        let mut frames = 0;
        // An emptied store still needs a frame to carry its seq.
        if !self.tables.is_empty() || self.seq > SequenceNumber::default() {
            let mut ops = vec![Op::ClearAll { clear_all: true }];
            for (entity_type, table) in &self.tables {
                for (key, stored) in table {
                    ops.push(Op::Put {
                        entity_type: entity_type.clone(),
                        key: *key,
                        record: stored.record.clone(),
                    });
                }
            }
            image.extend(Frame { seq: self.seq, ops }.encode()?);
            frames = 1;
        }
        self.backend.rewrite(&image)?;
        self.header = header;
        self.frames = frames;
        Ok(())
    }

    fn record_tables(&self) -> RecordTables {
        self.tables
            .iter()
            .map(|(entity_type, table)| {
                let records = table
                    .iter()
                    .map(|(key, stored)| (*key, stored.record.clone()))
                    .collect();
                (entity_type.clone(), records)
            })
            .collect()
    }

    /// Runs `migrations` against the stored records and, if the version
    /// advanced, rewrites the file at the new version in one step.
    ///
    /// # Errors
    ///
    /// `SchemaTooNew`, `MigrationFailed` (file untouched) or storage errors.
    pub fn migrate(&mut self, migrations: &MigrationTable) -> CoreResult<MigrationReport> {
        let from = self.schema_version();
        let (migrated, report) = migrations.run(from, self.record_tables())?;
        if !report.migrated() {
            return Ok(report);
        }

        let seq = self.seq.next();
        let previous = std::mem::replace(
            &mut self.tables,
            migrated
                .into_iter()
                .filter(|(_, records)| !records.is_empty())
                .map(|(entity_type, records)| {
                    let table = records
                        .into_iter()
                        .map(|(key, record)| (key, Stored { record, modified: seq }))
                        .collect();
                    (entity_type, table)
                })
                .collect(),
        );
        let previous_seq = std::mem::replace(&mut self.seq, seq);

        if let Err(e) = self.rewrite(Header::new(report.to)) {
            self.tables = previous;
            self.seq = previous_seq;
            return Err(e);
        }
        info!(
            from = %report.from,
            to = %report.to,
            steps = report.applied.len(),
            records = report.records_touched(),
            "schema migrated"
        );
        Ok(report)
    }

    /// Runs `migrations` on a copy of the records and reports what would
    /// change. Nothing is written.
    ///
    /// # Errors
    ///
    /// `SchemaTooNew` or `MigrationFailed`.
    pub fn preview_migration(&self, migrations: &MigrationTable) -> CoreResult<MigrationReport> {
        let (_, report) = migrations.run(self.schema_version(), self.record_tables())?;
        Ok(report)
    }

    // Typed operations run by the store thread.

    pub(crate) fn create<T: Entity>(&mut self, value: T) -> CoreResult<Frozen<T>> {
        let key = value.primary_key();
        self.write(|txn| {
            if txn.contains(T::TYPE_NAME, key) {
                return Err(CoreError::write_conflict(T::TYPE_NAME, key));
            }
            txn.put(T::TYPE_NAME, key, value.to_record());
            Ok(())
        })?;
        debug!(entity_type = T::TYPE_NAME, key = %key, "created");
        Ok(Frozen::new(value, key, self.seq))
    }

    pub(crate) fn recreate<T: Entity>(&mut self, value: T) -> CoreResult<Frozen<T>> {
        let key = value.primary_key();
        let removed = self.write(|txn| {
            let removed = txn.clear(T::TYPE_NAME);
            txn.put(T::TYPE_NAME, key, value.to_record());
            Ok(removed)
        })?;
        debug!(entity_type = T::TYPE_NAME, key = %key, removed, "recreated");
        Ok(Frozen::new(value, key, self.seq))
    }

    pub(crate) fn upsert<T: Entity>(
        &mut self,
        value: T,
        policy: UpdatePolicy,
    ) -> CoreResult<Frozen<T>> {
        let mut frozen = self.upsert_all(vec![value], policy)?;
        frozen
            .pop()
            .ok_or_else(|| CoreError::transaction_aborted("update produced no record"))
    }

    pub(crate) fn upsert_all<T: Entity>(
        &mut self,
        values: Vec<T>,
        policy: UpdatePolicy,
    ) -> CoreResult<Vec<Frozen<T>>> {
        let seq = self.seq.next();
        let frozen = self.write(|txn| {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                let key = value.primary_key();
                let record = value.to_record();
                let existing = match policy {
                    UpdatePolicy::All => None,
                    UpdatePolicy::Modified | UpdatePolicy::ErrorIfMissing => {
                        txn.get(T::TYPE_NAME, key).cloned()
                    }
                };
                let (stored, value) = match (existing, policy) {
                    (None, UpdatePolicy::ErrorIfMissing) => {
                        return Err(CoreError::not_found(T::TYPE_NAME, key));
                    }
                    (Some(mut merged), _) => {
                        merged.merge(record);
                        let value = T::from_record(key, &merged)?;
                        (merged, value)
                    }
                    (None, _) => (record, value),
                };
                txn.put(T::TYPE_NAME, key, stored);
                out.push(Frozen::new(value, key, seq));
            }
            Ok(out)
        })?;
        debug!(entity_type = T::TYPE_NAME, count = frozen.len(), ?policy, "updated");
        Ok(frozen)
    }

    /// Deletes `value`'s record, returning its last stored state.
    ///
    /// Removal does not depend on decoding: a stored record that no longer
    /// decodes as `T` is still deleted, and `value` stands in for it.
    pub(crate) fn delete<T: Entity>(&mut self, value: T) -> CoreResult<Frozen<T>> {
        let key = value.primary_key();
        let seq = self.seq;
        let (_, record) = self
            .remove_keys(T::TYPE_NAME, vec![key])?
            .pop()
            .ok_or_else(|| CoreError::not_found(T::TYPE_NAME, key))?;
        let value = T::from_record(key, &record).unwrap_or_else(|e| {
            warn!(entity_type = T::TYPE_NAME, key = %key, error = %e, "deleted record did not decode");
            value
        });
        debug!(entity_type = T::TYPE_NAME, key = %key, "deleted");
        Ok(Frozen::new(value, key, seq))
    }

    pub(crate) fn delete_keys<T: Entity>(
        &mut self,
        keys: Vec<PrimaryKey>,
    ) -> CoreResult<Vec<Frozen<T>>> {
        let seq = self.seq;
        let removed = self.remove_keys(T::TYPE_NAME, keys)?;
        let removed = freeze_removed::<T>(removed, seq);
        debug!(entity_type = T::TYPE_NAME, count = removed.len(), "deleted");
        Ok(removed)
    }

    /// Removes `keys` in one transaction; `NotFound` on the first missing key.
    fn remove_keys(
        &mut self,
        entity_type: &str,
        keys: Vec<PrimaryKey>,
    ) -> CoreResult<Vec<(PrimaryKey, Record)>> {
        self.write(|txn| {
            keys.into_iter()
                .map(|key| {
                    txn.delete(entity_type, key)
                        .map(|record| (key, record))
                        .ok_or_else(|| CoreError::not_found(entity_type, key))
                })
                .collect()
        })
    }

    pub(crate) fn retain_only<T: Entity>(
        &mut self,
        keep: BTreeSet<PrimaryKey>,
    ) -> CoreResult<Vec<Frozen<T>>> {
        let doomed: Vec<PrimaryKey> = self
            .table(T::TYPE_NAME)
            .into_iter()
            .flat_map(|t| t.keys().copied())
            .filter(|key| !keep.contains(key))
            .collect();
        let removed = self.delete_keys::<T>(doomed)?;
        debug!(
            entity_type = T::TYPE_NAME,
            kept = keep.len(),
            removed = removed.len(),
            "retained only given records"
        );
        Ok(removed)
    }

    pub(crate) fn delete_all(&mut self) -> CoreResult<()> {
        self.write(|txn| {
            txn.clear_all();
            Ok(())
        })?;
        info!("all records deleted");
        Ok(())
    }

    pub(crate) fn get<T: Entity>(&self, key: PrimaryKey) -> CoreResult<Option<Frozen<T>>> {
        self.live::<T>().freeze(key)
    }

    pub(crate) fn read_all<T: Entity>(&self) -> CoreResult<Vec<Frozen<T>>> {
        self.live::<T>().freeze_all()
    }

    pub(crate) fn live<T: Entity>(&self) -> LiveView<'_, T> {
        LiveView::new(self.table(T::TYPE_NAME), self.seq)
    }

    pub(crate) fn is_current(&self, entity_type: &str, key: PrimaryKey, seq: SequenceNumber) -> bool {
        self.table(entity_type)
            .and_then(|t| t.get(&key))
            .is_some_and(|stored| stored.modified <= seq)
    }
}

/// Staged changes of one write transaction.
///
/// Touched tables are copied on first write; reads see the staged copy.
pub(crate) struct WriteTxn<'e> {
    base: &'e Tables,
    staged: Tables,
    ops: Vec<Op>,
    seq: SequenceNumber,
}

impl<'e> WriteTxn<'e> {
    fn new(base: &'e Tables, seq: SequenceNumber) -> Self {
        Self {
            base,
            staged: Tables::new(),
            ops: Vec::new(),
            seq,
        }
    }

    fn view(&self, entity_type: &str) -> Option<&Table> {
        self.staged
            .get(entity_type)
            .or_else(|| self.base.get(entity_type))
    }

    fn table_mut(&mut self, entity_type: &str) -> &mut Table {
        let base = self.base;
        self.staged
            .entry(entity_type.to_string())
            .or_insert_with(|| base.get(entity_type).cloned().unwrap_or_default())
    }

    pub(crate) fn get(&self, entity_type: &str, key: PrimaryKey) -> Option<&Record> {
        self.view(entity_type)
            .and_then(|t| t.get(&key))
            .map(|s| &s.record)
    }

    pub(crate) fn contains(&self, entity_type: &str, key: PrimaryKey) -> bool {
        self.get(entity_type, key).is_some()
    }

    pub(crate) fn put(&mut self, entity_type: &str, key: PrimaryKey, record: Record) {
        let modified = self.seq;
        self.table_mut(entity_type).insert(
            key,
            Stored {
                record: record.clone(),
                modified,
            },
        );
        self.ops.push(Op::Put {
            entity_type: entity_type.to_string(),
            key,
            record,
        });
    }

    pub(crate) fn delete(&mut self, entity_type: &str, key: PrimaryKey) -> Option<Record> {
        if !self.contains(entity_type, key) {
            return None;
        }
        let removed = self.table_mut(entity_type).remove(&key)?;
        self.ops.push(Op::Delete {
            entity_type: entity_type.to_string(),
            key,
        });
        Some(removed.record)
    }

    /// Removes every record of one type, returning how many there were.
    pub(crate) fn clear(&mut self, entity_type: &str) -> usize {
        let removed = self.view(entity_type).map_or(0, |t| t.len());
        self.staged.insert(entity_type.to_string(), Table::new());
        self.ops.push(Op::Clear {
            entity_type: entity_type.to_string(),
        });
        removed
    }

    pub(crate) fn clear_all(&mut self) {
        let names: Vec<String> = self.base.keys().chain(self.staged.keys()).cloned().collect();
        for name in names {
            self.staged.insert(name, Table::new());
        }
        self.ops.push(Op::ClearAll { clear_all: true });
    }
}

fn apply_ops(tables: &mut Tables, ops: Vec<Op>, seq: SequenceNumber) {
    for op in ops {
        match op {
            Op::Put {
                entity_type,
                key,
                record,
            } => {
                tables
                    .entry(entity_type)
                    .or_default()
                    .insert(key, Stored { record, modified: seq });
            }
            Op::Delete { entity_type, key } => {
                if let Some(table) = tables.get_mut(&entity_type) {
                    table.remove(&key);
                    if table.is_empty() {
                        tables.remove(&entity_type);
                    }
                }
            }
            Op::Clear { entity_type } => {
                tables.remove(&entity_type);
            }
            Op::ClearAll { .. } => tables.clear(),
        }
    }
}

/// Snapshots of deleted records. Records that no longer decode are logged
/// and left out; they are deleted all the same.
fn freeze_removed<T: Entity>(
    removed: Vec<(PrimaryKey, Record)>,
    seq: SequenceNumber,
) -> Vec<Frozen<T>> {
    removed
        .into_iter()
        .filter_map(|(key, record)| match T::from_record(key, &record) {
            Ok(value) => Some(Frozen::new(value, key, seq)),
            Err(e) => {
                warn!(entity_type = T::TYPE_NAME, key = %key, error = %e, "deleted record did not decode");
                None
            }
        })
        .collect()
}

fn counts(tables: &Tables) -> BTreeMap<String, usize> {
    tables
        .iter()
        .map(|(name, table)| (name.clone(), table.len()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::AddDefault;
    use favordb_codec::{CodecResult, Value};
    use favordb_storage::{InMemoryBackend, StorageError};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        no: u64,
        body: String,
        tag: Option<String>,
    }

    impl Entity for Note {
        const TYPE_NAME: &'static str = "Note";

        fn primary_key(&self) -> PrimaryKey {
            PrimaryKey::new(self.no)
        }

        fn to_record(&self) -> Record {
            let mut record = Record::new().with("body", self.body.as_str());
            if let Some(tag) = &self.tag {
                record.insert("tag", tag.as_str());
            }
            record
        }

        fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self> {
            Ok(Self {
                no: key.as_u64(),
                body: record.text("body")?.to_string(),
                tag: record.optional_text("tag")?.map(str::to_string),
            })
        }
    }

    fn note(no: u64, body: &str) -> Note {
        Note {
            no,
            body: body.to_string(),
            tag: None,
        }
    }

    fn engine() -> Engine {
        Engine::open(
            Box::new(InMemoryBackend::new()),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        )
        .unwrap()
    }

    fn reopen(engine: Engine) -> Engine {
        let data = engine.backend.read_all().unwrap();
        Engine::open(
            Box::new(InMemoryBackend::with_data(data)),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        )
        .unwrap()
    }

    #[test]
    fn new_store_writes_header_only() {
        let engine = engine();
        assert_eq!(engine.schema_version(), SchemaVersion::new(1));
        assert_eq!(engine.stats().unwrap().file_bytes, HEADER_LEN as u64);
        assert_eq!(engine.frames(), 0);
    }

    #[test]
    fn missing_store_is_not_created_when_disabled() {
        let result = Engine::open(
            Box::new(InMemoryBackend::new()),
            &StoreConfig::new().create_if_missing(false),
            SchemaVersion::new(1),
        );
        assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    }

    #[test]
    fn commits_survive_replay() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine.create(note(2, "candle")).unwrap();
        engine.delete(note(1, "mug")).unwrap();

        let engine = reopen(engine);
        assert_eq!(engine.frames(), 3);
        assert_eq!(engine.seq(), SequenceNumber::new(3));
        let all = engine.read_all::<Note>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body, "candle");
    }

    #[test]
    fn failed_closure_writes_nothing() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        let size = engine.stats().unwrap().file_bytes;

        let result = engine.upsert_all(
            vec![note(2, "new"), note(3, "missing")],
            UpdatePolicy::ErrorIfMissing,
        );
        assert!(matches!(result, Err(CoreError::NotFound { .. })));
        assert_eq!(engine.stats().unwrap().file_bytes, size);
        assert_eq!(engine.count("Note"), 1);
        assert_eq!(engine.seq(), SequenceNumber::new(1));
    }

    #[test]
    fn torn_tail_is_truncated() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine.create(note(2, "candle")).unwrap();
        let mut data = engine.backend.read_all().unwrap();
        data.truncate(data.len() - 3);

        let engine = Engine::open(
            Box::new(InMemoryBackend::with_data(data)),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        )
        .unwrap();
        assert_eq!(engine.count("Note"), 1);
        assert_eq!(engine.frames(), 1);
        let scan = Scan::read(&engine.backend.read_all().unwrap()).unwrap();
        assert!(scan.torn.is_none());
    }

    #[test]
    fn corruption_before_last_frame_is_fatal() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine.create(note(2, "candle")).unwrap();
        let mut data = engine.backend.read_all().unwrap();
        data[HEADER_LEN + 20] ^= 0xFF;

        let result = Engine::open(
            Box::new(InMemoryBackend::with_data(data)),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        );
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
    }

    #[test]
    fn damaged_first_frame_length_is_fatal_and_leaves_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("favor.store");
        let mut engine = Engine::open(
            Box::new(favordb_storage::FileBackend::open(&path).unwrap()),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        )
        .unwrap();
        for no in 1..=3 {
            engine.create(note(no, "draft")).unwrap();
        }
        drop(engine);

        let mut data = std::fs::read(&path).unwrap();
        data[HEADER_LEN + 3] = 0x7F;
        std::fs::write(&path, &data).unwrap();

        let result = Engine::open(
            Box::new(favordb_storage::FileBackend::open(&path).unwrap()),
            &StoreConfig::default(),
            SchemaVersion::new(1),
        );
        assert!(matches!(result, Err(CoreError::Corrupted { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), data);
    }

    #[test]
    fn undecodable_records_are_still_deleted() {
        let mut engine = engine();
        engine
            .write(|txn| {
                txn.put("Note", PrimaryKey::new(1), Record::new());
                Ok(())
            })
            .unwrap();
        engine.create(note(2, "candle")).unwrap();

        let removed = engine.delete(note(1, "stand-in")).unwrap();
        assert_eq!(removed.body, "stand-in");
        assert_eq!(engine.count("Note"), 1);

        engine
            .write(|txn| {
                txn.put("Note", PrimaryKey::new(3), Record::new());
                Ok(())
            })
            .unwrap();
        let removed = engine.retain_only::<Note>(BTreeSet::new()).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].key(), PrimaryKey::new(2));
        assert_eq!(engine.count("Note"), 0);

        let engine = reopen(engine);
        assert_eq!(engine.count("Note"), 0);
    }

    #[test]
    fn compacting_an_emptied_store_keeps_its_seq() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine.delete(note(1, "mug")).unwrap();
        let seq = engine.seq();
        assert_eq!(seq, SequenceNumber::new(2));

        engine.compact().unwrap();
        assert_eq!(engine.frames(), 1);

        let mut engine = reopen(engine);
        assert_eq!(engine.seq(), seq);
        assert_eq!(engine.count("Note"), 0);
        let created = engine.create(note(2, "candle")).unwrap();
        assert!(created.seq() > seq);
    }

    #[test]
    fn compaction_preserves_contents() {
        let mut engine = engine();
        for no in 1..=20 {
            engine.create(note(no, "draft")).unwrap();
        }
        engine.retain_only::<Note>([PrimaryKey::new(4)].into_iter().collect()).unwrap();

        let stats = engine.compact().unwrap();
        assert!(stats.bytes_after < stats.bytes_before);
        assert_eq!(stats.frames_before, 21);
        assert_eq!(engine.frames(), 1);

        let engine = reopen(engine);
        let all = engine.read_all::<Note>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].key(), PrimaryKey::new(4));
    }

    #[test]
    fn modified_merges_and_all_replaces() {
        let mut engine = engine();
        let tagged = Note {
            tag: Some("gift".to_string()),
            ..note(1, "mug")
        };
        engine.create(tagged).unwrap();

        let merged = engine.upsert(note(1, "big mug"), UpdatePolicy::Modified).unwrap();
        assert_eq!(merged.body, "big mug");
        assert_eq!(merged.tag.as_deref(), Some("gift"));

        let replaced = engine.upsert(note(1, "cup"), UpdatePolicy::All).unwrap();
        assert_eq!(replaced.tag, None);
        let stored = engine.get::<Note>(PrimaryKey::new(1)).unwrap().unwrap();
        assert_eq!(stored.tag, None);
    }

    #[test]
    fn is_current_tracks_later_writes() {
        let mut engine = engine();
        let frozen = engine.create(note(1, "mug")).unwrap();
        engine.create(note(2, "candle")).unwrap();
        assert!(engine.is_current("Note", frozen.key(), frozen.seq()));

        engine.upsert(note(1, "cup"), UpdatePolicy::All).unwrap();
        assert!(!engine.is_current("Note", frozen.key(), frozen.seq()));
        assert_eq!(frozen.body, "mug");
    }

    #[test]
    fn migrate_rewrites_at_new_version() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine.create(note(2, "candle")).unwrap();

        let table = MigrationTable::new(SchemaVersion::new(3))
            .with(AddDefault::new(3, "Note", "tag", "untagged"))
            .unwrap();
        assert_eq!(engine.preview_migration(&table).unwrap().records_touched(), 2);
        assert_eq!(engine.schema_version(), SchemaVersion::new(1));

        let report = engine.migrate(&table).unwrap();
        assert_eq!(report.to, SchemaVersion::new(3));
        assert_eq!(engine.frames(), 1);

        let engine = reopen(engine);
        assert_eq!(engine.schema_version(), SchemaVersion::new(3));
        let first = engine.get::<Note>(PrimaryKey::new(1)).unwrap().unwrap();
        assert_eq!(first.tag.as_deref(), Some("untagged"));
    }

    #[test]
    fn clear_all_then_put_in_one_frame() {
        let mut engine = engine();
        engine.create(note(1, "mug")).unwrap();
        engine
            .write(|txn| {
                txn.clear_all();
                txn.put("Other", PrimaryKey::new(9), Record::new().with("x", Value::Null));
                Ok(())
            })
            .unwrap();
        let engine = reopen(engine);
        assert_eq!(engine.count("Note"), 0);
        assert_eq!(engine.count("Other"), 1);
    }

    /// Backend whose appends fail after a given number of calls.
    struct FailingAppend {
        inner: InMemoryBackend,
        appends_left: usize,
    }

    impl StorageBackend for FailingAppend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.appends_left == 0 {
                self.inner.append(&data[..data.len() / 2])?;
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.appends_left -= 1;
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }

        fn rewrite(&mut self, data: &[u8]) -> StorageResult<()> {
            self.inner.rewrite(data)
        }
    }

    #[test]
    fn failed_append_rolls_back() {
        let backend = FailingAppend {
            inner: InMemoryBackend::new(),
            appends_left: 2,
        };
        let mut engine =
            Engine::open(Box::new(backend), &StoreConfig::default(), SchemaVersion::new(1)).unwrap();
        engine.create(note(1, "mug")).unwrap();
        let size = engine.stats().unwrap().file_bytes;

        let result = engine.create(note(2, "candle"));
        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert_eq!(engine.stats().unwrap().file_bytes, size);
        assert_eq!(engine.count("Note"), 1);
        assert_eq!(engine.seq(), SequenceNumber::new(1));
    }
}
