//! The store handle and its async CRUD façade.
//!
//! A [`Store`] owns one [`Engine`] on a dedicated, named OS thread. Every
//! method enqueues a job on that thread at call time and returns a
//! [`Pending`] future; jobs run one at a time in submission order, and the
//! result travels back over a one-shot channel to whichever task awaits it.
//!
//! ```text
//! caller task ── Command::Run(job) ──► mpsc ──► store thread
//!      ▲                                           │ job(&mut engine)
//!      └────────────── oneshot result ◄────────────┘
//! ```
//!
//! Dropping a `Pending` does not cancel its job: the write still commits,
//! only the result is discarded.

use crate::config::StoreConfig;
use crate::engine::{CompactionStats, Engine, StoreStats, UpdatePolicy};
use crate::entity::Entity;
use crate::error::{CoreError, CoreResult};
use crate::lock::StoreLock;
use crate::migration::{MigrationReport, MigrationTable};
use crate::snapshot::{Frozen, LiveView};
use crate::types::{PrimaryKey, SchemaVersion};
use favordb_storage::{FileBackend, InMemoryBackend, StorageBackend};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

type Job = Box<dyn FnOnce(&mut Engine) + Send>;

/// A message to the store thread.
enum Command {
    /// Run a job against the engine.
    Run(Job),
    /// Drain, sync and stop. The sender, if any, is told the sync outcome.
    Shutdown(Option<oneshot::Sender<CoreResult<()>>>),
}

/// A result on its way back from the store thread.
///
/// Resolves to [`CoreError::StoreClosed`] if the store stopped before
/// running the job.
#[must_use = "the job runs regardless; await the Pending to observe its result"]
pub struct Pending<T> {
    rx: oneshot::Receiver<CoreResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = CoreResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CoreError::StoreClosed)))
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

struct Shared {
    tx: mpsc::UnboundedSender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
    thread_id: ThreadId,
    path: Option<PathBuf>,
    schema_version: SchemaVersion,
    report: MigrationReport,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let _ = self.tx.send(Command::Shutdown(None));
        if thread::current().id() == self.thread_id {
            // Last handle dropped by a job; the thread exits after it.
            return;
        }
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                error!("store thread panicked");
            }
        }
    }
}

/// Handle to an open store.
///
/// Cheap to clone; all clones share one store thread. The thread stops when
/// the last clone is dropped or [`Store::shutdown`] is awaited.
#[derive(Clone)]
pub struct Store {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.shared.path)
            .field("schema_version", &self.shared.schema_version)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Opens (or creates) the store file at `path` and migrates it.
    ///
    /// Parent directories are created. The file is locked for the lifetime
    /// of the store; a second opener gets `DatabaseLocked`.
    ///
    /// # Errors
    ///
    /// - `DatabaseLocked` if the store is already open
    /// - `InvalidOperation` if the file is missing and `create_if_missing`
    ///   is off
    /// - `InvalidFormat`, `ChecksumMismatch` or `Corrupted` for a damaged file
    /// - `SchemaTooNew` or `MigrationFailed` from the migration table; the
    ///   file is then left at its old version
    pub fn open(
        path: impl AsRef<Path>,
        config: StoreConfig,
        migrations: &MigrationTable,
    ) -> CoreResult<Self> {
        let path = path.as_ref();
        if !config.create_if_missing && !path.exists() {
            return Err(CoreError::invalid_operation(format!(
                "store does not exist: {}",
                path.display()
            )));
        }

        let lock = StoreLock::acquire(path)?;
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::start(
            Box::new(backend),
            Some(path.to_path_buf()),
            Some(lock),
            config,
            migrations,
        )
    }

    /// Opens a fresh store in memory.
    ///
    /// # Errors
    ///
    /// Only if the store thread cannot be spawned.
    pub fn open_in_memory(config: StoreConfig, migrations: &MigrationTable) -> CoreResult<Self> {
        Self::open_with_backend(Box::new(InMemoryBackend::new()), config, migrations)
    }

    /// Opens the store held by an arbitrary backend.
    ///
    /// # Errors
    ///
    /// As [`Store::open`], minus locking.
    pub fn open_with_backend(
        backend: Box<dyn StorageBackend>,
        config: StoreConfig,
        migrations: &MigrationTable,
    ) -> CoreResult<Self> {
        Self::start(backend, None, None, config, migrations)
    }

    fn start(
        backend: Box<dyn StorageBackend>,
        path: Option<PathBuf>,
        lock: Option<StoreLock>,
        config: StoreConfig,
        migrations: &MigrationTable,
    ) -> CoreResult<Self> {
        let mut engine = Engine::open(backend, &config, migrations.target())?;
        let report = engine.migrate(migrations)?;

        let threshold = config.compact_on_open_threshold;
        if threshold > 0 && engine.frames() > threshold {
            engine.compact()?;
        }

        let schema_version = engine.schema_version();
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(engine, rx, lock))?;

        info!(
            path = ?path,
            version = %schema_version,
            migrated = report.migrated(),
            thread = %config.thread_name,
            "store opened"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                tx,
                thread_id: handle.thread().id(),
                thread: Mutex::new(Some(handle)),
                path,
                schema_version,
                report,
            }),
        })
    }

    /// On-disk location of the store, `None` for in-memory stores.
    #[must_use]
    pub fn locate(&self) -> Option<&Path> {
        let path = self.shared.path.as_deref();
        debug!(path = ?path, "store location");
        path
    }

    /// Schema version the store runs at.
    #[must_use]
    pub fn schema_version(&self) -> SchemaVersion {
        self.shared.schema_version
    }

    /// What migration ran at open.
    #[must_use]
    pub fn migration_report(&self) -> &MigrationReport {
        &self.shared.report
    }

    fn submit<R, F>(&self, job: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Engine) -> CoreResult<R> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let command = Command::Run(Box::new(move |engine: &mut Engine| {
            if tx.send(job(engine)).is_err() {
                warn!("result dropped: caller stopped waiting");
            }
        }));
        if self.shared.tx.send(command).is_err() {
            debug!("store thread is gone");
        }
        Pending { rx }
    }

    /// Inserts a new record.
    ///
    /// Fails with `WriteConflict` if the key exists; the stored record is
    /// left unchanged.
    pub fn create<T: Entity>(&self, value: T) -> Pending<Frozen<T>> {
        self.submit(move |engine| engine.create(value))
    }

    /// Replaces every record of `T` with `value`, in one transaction.
    pub fn recreate<T: Entity>(&self, value: T) -> Pending<Frozen<T>> {
        self.submit(move |engine| engine.recreate(value))
    }

    /// Frozen snapshots of every record of `T`, in key order.
    pub fn read_all<T: Entity>(&self) -> Pending<Vec<Frozen<T>>> {
        self.submit(|engine| engine.read_all::<T>())
    }

    /// Point lookup. Absent is `Ok(None)`.
    pub fn get<T: Entity>(&self, key: PrimaryKey) -> Pending<Option<Frozen<T>>> {
        self.submit(move |engine| engine.get::<T>(key))
    }

    /// Number of records of `T`.
    pub fn count<T: Entity>(&self) -> Pending<usize> {
        self.submit(|engine| Ok(engine.count(T::TYPE_NAME)))
    }

    /// Runs `f` on the store thread with a live view of `T`'s table.
    ///
    /// The view cannot leave `f`: the result type must not borrow from it.
    pub fn with_live<T, R, F>(&self, f: F) -> Pending<R>
    where
        T: Entity,
        R: Send + 'static,
        F: for<'a> FnOnce(LiveView<'a, T>) -> R + Send + 'static,
    {
        self.submit(move |engine| Ok(f(engine.live::<T>())))
    }

    /// Whether `frozen` still matches the stored record.
    pub fn is_current<T: Entity>(&self, frozen: &Frozen<T>) -> Pending<bool> {
        let (key, seq) = (frozen.key(), frozen.seq());
        self.submit(move |engine| Ok(engine.is_current(T::TYPE_NAME, key, seq)))
    }

    /// Upserts one record using [`UpdatePolicy::Modified`].
    pub fn update<T: Entity>(&self, value: T) -> Pending<Frozen<T>> {
        self.update_with(value, UpdatePolicy::Modified)
    }

    /// Upserts one record with an explicit policy.
    pub fn update_with<T: Entity>(&self, value: T, policy: UpdatePolicy) -> Pending<Frozen<T>> {
        self.submit(move |engine| engine.upsert(value, policy))
    }

    /// Upserts many records in one transaction using [`UpdatePolicy::All`].
    pub fn update_all<T: Entity>(&self, values: Vec<T>) -> Pending<Vec<Frozen<T>>> {
        self.update_all_with(values, UpdatePolicy::All)
    }

    /// Upserts many records in one transaction: all of them or none.
    pub fn update_all_with<T: Entity>(
        &self,
        values: Vec<T>,
        policy: UpdatePolicy,
    ) -> Pending<Vec<Frozen<T>>> {
        self.submit(move |engine| engine.upsert_all(values, policy))
    }

    /// Deletes one record by key, returning its last stored state.
    ///
    /// `NotFound` if it is no longer stored. A stored record that no longer
    /// decodes as `T` is deleted anyway and `value` is returned in its place.
    pub fn delete<T: Entity>(&self, value: T) -> Pending<Frozen<T>> {
        self.submit(move |engine| engine.delete(value))
    }

    /// Deletes exactly the given records in one transaction.
    ///
    /// `NotFound` on the first missing key; nothing is deleted then. Deleted
    /// records that no longer decode are left out of the result.
    pub fn delete_many<T: Entity>(&self, values: &[T]) -> Pending<Vec<Frozen<T>>> {
        let keys: Vec<PrimaryKey> = values.iter().map(Entity::primary_key).collect();
        self.submit(move |engine| engine.delete_keys::<T>(keys))
    }

    /// Deletes every record of `T` **except** the given ones.
    ///
    /// This is a set difference: the argument is the survivor set. Returns
    /// what was deleted, in key order. Keys in `keep` that are not stored
    /// are ignored. Stored records that no longer decode are deleted too but
    /// left out of the result.
    pub fn retain_only<T: Entity>(&self, keep: &[T]) -> Pending<Vec<Frozen<T>>> {
        let keep: BTreeSet<PrimaryKey> = keep.iter().map(Entity::primary_key).collect();
        self.submit(move |engine| engine.retain_only::<T>(keep))
    }

    /// Alias of [`Store::retain_only`].
    pub fn delete_complement<T: Entity>(&self, keep: &[T]) -> Pending<Vec<Frozen<T>>> {
        self.retain_only(keep)
    }

    /// Deletes every record of every type. Irreversible.
    pub fn delete_all(&self) -> Pending<()> {
        self.submit(Engine::delete_all)
    }

    /// Rewrites the file as one snapshot frame.
    pub fn compact(&self) -> Pending<CompactionStats> {
        self.submit(Engine::compact)
    }

    /// Current counters.
    pub fn stats(&self) -> Pending<StoreStats> {
        self.submit(|engine| engine.stats())
    }

    /// Runs the queued jobs, syncs the file and stops the store thread.
    ///
    /// Jobs submitted afterwards, from any clone, fail with `StoreClosed`.
    ///
    /// # Errors
    ///
    /// Storage errors from the final sync, or `StoreClosed` if the thread
    /// had already stopped.
    pub async fn shutdown(self) -> CoreResult<()> {
        let (tx, rx) = oneshot::channel();
        if self.shared.tx.send(Command::Shutdown(Some(tx))).is_err() {
            return Err(CoreError::StoreClosed);
        }
        let synced = rx.await.unwrap_or(Err(CoreError::StoreClosed));
        let handle = self.shared.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("store thread panicked");
            }
        }
        synced
    }
}

/// Serves jobs until shutdown. The file lock lives here so it is released
/// only after the engine, whichever thread drops the last handle.
fn run(mut engine: Engine, mut rx: mpsc::UnboundedReceiver<Command>, lock: Option<StoreLock>) {
    debug!("store thread started");
    while let Some(command) = rx.blocking_recv() {
        match command {
            Command::Run(job) => job(&mut engine),
            Command::Shutdown(done) => {
                let synced = engine.sync();
                if let Err(e) = &synced {
                    warn!(error = %e, "final sync failed");
                }
                if let Some(done) = done {
                    let _ = done.send(synced);
                }
                break;
            }
        }
    }
    drop(engine);
    drop(lock);
    debug!("store thread stopped");
}

/// One-time, process-wide store initialization.
///
/// The first caller opens the store; concurrent callers block until that
/// single open finishes and then share its handle.
///
/// ```
/// use favordb_core::{MigrationTable, SchemaVersion, SharedStore, Store, StoreConfig};
///
/// static STORE: SharedStore = SharedStore::new();
///
/// let store = STORE
///     .get_or_open(|| {
///         Store::open_in_memory(StoreConfig::default(), &MigrationTable::new(SchemaVersion::new(1)))
///     })
///     .unwrap();
/// assert_eq!(store.schema_version(), SchemaVersion::new(1));
/// ```
#[derive(Debug, Default)]
pub struct SharedStore {
    cell: OnceCell<Store>,
}

impl SharedStore {
    /// Creates an uninitialized slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the store, opening it with `open` on first use.
    ///
    /// If `open` fails the slot stays empty and the next caller retries.
    ///
    /// # Errors
    ///
    /// Whatever `open` returns.
    pub fn get_or_open<F>(&self, open: F) -> CoreResult<Store>
    where
        F: FnOnce() -> CoreResult<Store>,
    {
        self.cell.get_or_try_init(open).cloned()
    }

    /// Like [`SharedStore::get_or_open`], but aborts the process if the store
    /// cannot be opened.
    pub fn get_or_open_or_abort<F>(&self, open: F) -> Store
    where
        F: FnOnce() -> CoreResult<Store>,
    {
        match self.get_or_open(open) {
            Ok(store) => store,
            Err(e) => {
                error!(error = %e, "cannot open store; aborting");
                std::process::abort();
            }
        }
    }

    /// The store, if already opened.
    #[must_use]
    pub fn get(&self) -> Option<Store> {
        self.cell.get().cloned()
    }
}
