//! Schema migration table.
//!
//! A [`MigrationTable`] is built for one target [`SchemaVersion`] and holds
//! the [`MigrationStep`]s that lead there. Each step transforms every record
//! of one entity type and declares `applies_below`: it runs only when the
//! store's version is strictly lower.
//!
//! Migrations are:
//! - **Forward-only**: a store newer than the target is refused
//! - **Ordered**: steps run in ascending `applies_below`, ties in
//!   registration order, none skipped
//! - **All or nothing**: every step runs on a staged copy; the first error
//!   discards it and the store stays at its old version
//!
//! ```
//! use favordb_codec::Value;
//! use favordb_core::migration::{AddDefault, MigrationTable, RequireFields};
//! use favordb_core::SchemaVersion;
//! use favordb_codec::ValueKind;
//!
//! let mut table = MigrationTable::new(SchemaVersion::new(6));
//! table
//!     .register(RequireFields::new(5, "RecentSearch").field("search_text", ValueKind::Text))
//!     .unwrap();
//! table
//!     .register(AddDefault::new(6, "User", "anniversary_list", Value::List(vec![])))
//!     .unwrap();
//!
//! assert_eq!(table.plan(SchemaVersion::new(5)).len(), 1);
//! assert!(table.plan(SchemaVersion::new(6)).is_empty());
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{PrimaryKey, SchemaVersion};
use favordb_codec::{CodecError, CodecResult, Record, Value, ValueKind};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;
use tracing::{debug, info};

/// Records of every entity type, keyed by type name then primary key.
pub type RecordTables = BTreeMap<String, BTreeMap<PrimaryKey, Record>>;

/// Errors raised by migration steps and table registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// A legacy field the step relies on is absent.
    #[error("missing field `{field}`")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A legacy field has an unexpected shape.
    #[error("field `{field}` is {found}, expected {expected}")]
    WrongKind {
        /// Field name.
        field: String,
        /// Kind the step expects.
        expected: ValueKind,
        /// Kind found in the record.
        found: ValueKind,
    },

    /// Any other record codec failure.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// A step rejected a record for its own reasons.
    #[error("{message}")]
    Invalid {
        /// Description of the problem.
        message: String,
    },

    /// A step failed on a specific record.
    #[error("step `{step}` ({version}) failed on {entity_type} {key}: {source}")]
    Step {
        /// Step name.
        step: String,
        /// The step's `applies_below` version.
        version: SchemaVersion,
        /// Entity type being migrated.
        entity_type: String,
        /// Key of the offending record.
        key: PrimaryKey,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// The table was built inconsistently.
    #[error("invalid migration table: {message}")]
    Registration {
        /// Description of the problem.
        message: String,
    },
}

impl MigrationError {
    /// Creates an invalid record error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a registration error.
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    /// Returns the innermost error, unwrapping step context.
    #[must_use]
    pub fn root_cause(&self) -> &MigrationError {
        match self {
            Self::Step { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<CodecError> for MigrationError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::MissingField { field } => Self::MissingField { field },
            CodecError::WrongKind {
                field,
                expected,
                found,
            } => Self::WrongKind {
                field,
                expected,
                found,
            },
            other => Self::Codec(other),
        }
    }
}

/// Result type for migration steps.
pub type MigrationResult<T> = Result<T, MigrationError>;

/// One versioned, per-record transformation.
pub trait MigrationStep: Send + Sync {
    /// The step runs when the store's version is strictly below this.
    fn applies_below(&self) -> SchemaVersion;

    /// Step name, unique per `(applies_below, entity_type)`.
    fn name(&self) -> &str;

    /// Entity type whose records the step transforms.
    fn entity_type(&self) -> &str;

    /// Transforms one record.
    ///
    /// # Errors
    ///
    /// Fails if the legacy record does not have the expected shape. The
    /// whole migration is then abandoned.
    fn migrate(&self, key: PrimaryKey, record: Record) -> MigrationResult<Record>;
}

/// What a single step did during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedStep {
    /// The step's `applies_below`.
    pub version: SchemaVersion,
    /// Step name.
    pub name: String,
    /// Entity type.
    pub entity_type: String,
    /// Number of records transformed.
    pub records: usize,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Version before the run.
    pub from: SchemaVersion,
    /// Version after the run.
    pub to: SchemaVersion,
    /// Steps in the order they ran.
    pub applied: Vec<AppliedStep>,
}

impl MigrationReport {
    /// Report for a store that was already current.
    #[must_use]
    pub fn up_to_date(version: SchemaVersion) -> Self {
        Self {
            from: version,
            to: version,
            applied: Vec::new(),
        }
    }

    /// Whether the version advanced.
    #[must_use]
    pub fn migrated(&self) -> bool {
        self.to > self.from
    }

    /// Total records transformed across all steps.
    #[must_use]
    pub fn records_touched(&self) -> usize {
        self.applied.iter().map(|s| s.records).sum()
    }
}

/// Ordered set of migration steps for one target version.
pub struct MigrationTable {
    target: SchemaVersion,
    steps: Vec<Box<dyn MigrationStep>>,
}

impl fmt::Debug for MigrationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self
            .steps
            .iter()
            .map(|s| format!("{}:{}:{}", s.applies_below(), s.entity_type(), s.name()))
            .collect();
        f.debug_struct("MigrationTable")
            .field("target", &self.target)
            .field("steps", &steps)
            .finish()
    }
}

impl MigrationTable {
    /// Creates an empty table migrating to `target`.
    #[must_use]
    pub fn new(target: SchemaVersion) -> Self {
        Self {
            target,
            steps: Vec::new(),
        }
    }

    /// Target version.
    #[must_use]
    pub fn target(&self) -> SchemaVersion {
        self.target
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Registers a step.
    ///
    /// # Errors
    ///
    /// Rejects a step whose `applies_below` is zero or above the target (it
    /// could never run) and a duplicate `(applies_below, entity_type, name)`.
    pub fn register(&mut self, step: impl MigrationStep + 'static) -> MigrationResult<()> {
        let version = step.applies_below();
        if version.as_u64() == 0 || version > self.target {
            return Err(MigrationError::registration(format!(
                "step `{}` applies below {version}, outside 1..={}",
                step.name(),
                self.target
            )));
        }
        let duplicate = self.steps.iter().any(|s| {
            s.applies_below() == version
                && s.entity_type() == step.entity_type()
                && s.name() == step.name()
        });
        if duplicate {
            return Err(MigrationError::registration(format!(
                "step `{}` for {} at {version} registered twice",
                step.name(),
                step.entity_type()
            )));
        }

        let at = self.steps.partition_point(|s| s.applies_below() <= version);
        self.steps.insert(at, Box::new(step));
        Ok(())
    }

    /// Builder form of [`MigrationTable::register`].
    ///
    /// # Errors
    ///
    /// See [`MigrationTable::register`].
    pub fn with(mut self, step: impl MigrationStep + 'static) -> MigrationResult<Self> {
        self.register(step)?;
        Ok(self)
    }

    /// Steps that a store at `from` needs, in the order they run.
    #[must_use]
    pub fn plan(&self, from: SchemaVersion) -> Vec<&dyn MigrationStep> {
        self.steps
            .iter()
            .filter(|s| s.applies_below() > from)
            .map(|s| &**s)
            .collect()
    }

    /// Migrates `tables` from `from` to the target.
    ///
    /// Consumes the tables and returns the migrated copy; on error nothing
    /// is returned, so the caller's persisted state is untouched.
    ///
    /// # Errors
    ///
    /// `SchemaTooNew` if `from` is above the target, `MigrationFailed` if a
    /// step rejects a record.
    pub fn run(
        &self,
        from: SchemaVersion,
        mut tables: RecordTables,
    ) -> CoreResult<(RecordTables, MigrationReport)> {
        if from > self.target {
            return Err(CoreError::SchemaTooNew {
                on_disk: from,
                target: self.target,
            });
        }
        if from == self.target {
            return Ok((tables, MigrationReport::up_to_date(from)));
        }

        info!(from = %from, to = %self.target, "running schema migration");
        let mut applied = Vec::new();
        for step in self.plan(from) {
            let records = match tables.get_mut(step.entity_type()) {
                Some(table) => migrate_table(step, table)?,
                None => 0,
            };
            debug!(
                version = %step.applies_below(),
                step = step.name(),
                entity_type = step.entity_type(),
                records,
                "migration step applied"
            );
            applied.push(AppliedStep {
                version: step.applies_below(),
                name: step.name().to_string(),
                entity_type: step.entity_type().to_string(),
                records,
            });
        }

        Ok((
            tables,
            MigrationReport {
                from,
                to: self.target,
                applied,
            },
        ))
    }
}

fn migrate_table(
    step: &dyn MigrationStep,
    table: &mut BTreeMap<PrimaryKey, Record>,
) -> MigrationResult<usize> {
    let records = std::mem::take(table);
    let count = records.len();
    for (key, record) in records {
        let migrated = step.migrate(key, record).map_err(|e| MigrationError::Step {
            step: step.name().to_string(),
            version: step.applies_below(),
            entity_type: step.entity_type().to_string(),
            key,
            source: Box::new(e),
        })?;
        table.insert(key, migrated);
    }
    Ok(count)
}

/// A step backed by a closure.
pub struct FnStep<F> {
    applies_below: SchemaVersion,
    entity_type: String,
    name: String,
    f: F,
}

impl<F> FnStep<F>
where
    F: Fn(PrimaryKey, Record) -> MigrationResult<Record> + Send + Sync,
{
    /// Creates a closure step.
    pub fn new(
        applies_below: u64,
        entity_type: impl Into<String>,
        name: impl Into<String>,
        f: F,
    ) -> Self {
        Self {
            applies_below: SchemaVersion::new(applies_below),
            entity_type: entity_type.into(),
            name: name.into(),
            f,
        }
    }
}

impl<F> MigrationStep for FnStep<F>
where
    F: Fn(PrimaryKey, Record) -> MigrationResult<Record> + Send + Sync,
{
    fn applies_below(&self) -> SchemaVersion {
        self.applies_below
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn migrate(&self, key: PrimaryKey, record: Record) -> MigrationResult<Record> {
        (self.f)(key, record)
    }
}

/// A typed view of the fields a migration step reads or writes.
///
/// Shapes only need to cover the fields they touch.
pub trait RecordShape: Sized {
    /// Reads the shape out of a record.
    ///
    /// # Errors
    ///
    /// Fails if a field is missing or has the wrong kind.
    fn from_record(key: PrimaryKey, record: &Record) -> CodecResult<Self>;

    /// Writes the shape's fields.
    fn to_record(&self) -> Record;
}

/// A step that decodes the legacy fields into `Old`, converts them, and
/// writes `New`'s fields over the record.
///
/// Fields not covered by `New` are kept as they were.
pub struct TypedStep<Old, New, F> {
    applies_below: SchemaVersion,
    entity_type: String,
    name: String,
    convert: F,
    _shapes: PhantomData<fn(Old) -> New>,
}

impl<Old, New, F> TypedStep<Old, New, F>
where
    Old: RecordShape,
    New: RecordShape,
    F: Fn(Old) -> MigrationResult<New> + Send + Sync,
{
    /// Creates a typed step.
    pub fn new(
        applies_below: u64,
        entity_type: impl Into<String>,
        name: impl Into<String>,
        convert: F,
    ) -> Self {
        Self {
            applies_below: SchemaVersion::new(applies_below),
            entity_type: entity_type.into(),
            name: name.into(),
            convert,
            _shapes: PhantomData,
        }
    }
}

impl<Old, New, F> MigrationStep for TypedStep<Old, New, F>
where
    Old: RecordShape,
    New: RecordShape,
    F: Fn(Old) -> MigrationResult<New> + Send + Sync,
{
    fn applies_below(&self) -> SchemaVersion {
        self.applies_below
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn migrate(&self, key: PrimaryKey, mut record: Record) -> MigrationResult<Record> {
        let old = Old::from_record(key, &record)?;
        let new = (self.convert)(old)?;
        record.merge(new.to_record());
        Ok(record)
    }
}

/// Adds a field with a default value.
///
/// By default an existing value is kept; [`AddDefault::overwrite`] resets
/// the field on every record.
#[derive(Debug, Clone)]
pub struct AddDefault {
    applies_below: SchemaVersion,
    entity_type: String,
    name: String,
    field: String,
    default: Value,
    overwrite: bool,
}

impl AddDefault {
    /// Creates a step adding `field = default` where absent.
    pub fn new(
        applies_below: u64,
        entity_type: impl Into<String>,
        field: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        let field = field.into();
        Self {
            applies_below: SchemaVersion::new(applies_below),
            entity_type: entity_type.into(),
            name: format!("add_{field}"),
            field,
            default: default.into(),
            overwrite: false,
        }
    }

    /// Sets the field even where a value is present.
    #[must_use]
    pub fn overwrite(mut self) -> Self {
        self.overwrite = true;
        self.name = format!("reset_{}", self.field);
        self
    }
}

impl MigrationStep for AddDefault {
    fn applies_below(&self) -> SchemaVersion {
        self.applies_below
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn migrate(&self, _key: PrimaryKey, mut record: Record) -> MigrationResult<Record> {
        if self.overwrite || !record.contains(&self.field) {
            record.insert(self.field.clone(), self.default.clone());
        }
        Ok(record)
    }
}

/// Renames a field. Fails on records that lack it.
#[derive(Debug, Clone)]
pub struct RenameField {
    applies_below: SchemaVersion,
    entity_type: String,
    name: String,
    from: String,
    to: String,
}

impl RenameField {
    /// Creates a rename step.
    pub fn new(
        applies_below: u64,
        entity_type: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            applies_below: SchemaVersion::new(applies_below),
            entity_type: entity_type.into(),
            name: format!("rename_{from}_to_{to}"),
            from,
            to,
        }
    }
}

impl MigrationStep for RenameField {
    fn applies_below(&self) -> SchemaVersion {
        self.applies_below
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn migrate(&self, _key: PrimaryKey, mut record: Record) -> MigrationResult<Record> {
        if record.rename(&self.from, self.to.clone()) {
            Ok(record)
        } else {
            Err(MigrationError::MissingField {
                field: self.from.clone(),
            })
        }
    }
}

/// Checks that legacy fields are present with the expected kind and carries
/// them over unchanged.
#[derive(Debug, Clone)]
pub struct RequireFields {
    applies_below: SchemaVersion,
    entity_type: String,
    name: String,
    fields: Vec<(String, ValueKind, bool)>,
}

impl RequireFields {
    /// Creates an empty check for `entity_type`.
    pub fn new(applies_below: u64, entity_type: impl Into<String>) -> Self {
        Self {
            applies_below: SchemaVersion::new(applies_below),
            entity_type: entity_type.into(),
            name: "require_fields".to_string(),
            fields: Vec::new(),
        }
    }

    /// Requires `field` to be present and of `kind`.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push((field.into(), kind, false));
        self
    }

    /// Requires `field` to be present and either null or of `kind`.
    #[must_use]
    pub fn nullable(mut self, field: impl Into<String>, kind: ValueKind) -> Self {
        self.fields.push((field.into(), kind, true));
        self
    }

    /// Overrides the step name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl MigrationStep for RequireFields {
    fn applies_below(&self) -> SchemaVersion {
        self.applies_below
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn migrate(&self, _key: PrimaryKey, record: Record) -> MigrationResult<Record> {
        for (field, kind, nullable) in &self.fields {
            let value = record.field(field)?;
            let ok = value.kind() == *kind || (*nullable && value.is_null());
            if !ok {
                return Err(MigrationError::WrongKind {
                    field: field.clone(),
                    expected: *kind,
                    found: value.kind(),
                });
            }
        }
        Ok(record)
    }
}
