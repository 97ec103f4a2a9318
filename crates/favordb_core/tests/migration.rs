//! Open-time schema migration against store files on disk.

use favordb_codec::{Record, Value, ValueKind};
use favordb_core::format::{Frame, Header, Op};
use favordb_core::migration::{AddDefault, FnStep, MigrationError, RequireFields};
use favordb_core::{
    CoreError, Engine, MigrationTable, PrimaryKey, Scan, SchemaVersion, SequenceNumber, Store,
    StoreConfig,
};
use favordb_storage::FileBackend;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Writes a store file at `version` holding `records` of type `Note`.
fn seed(path: &Path, version: u64, records: Vec<(u64, Record)>) {
    let mut bytes = Header::new(SchemaVersion::new(version)).encode().to_vec();
    let ops = records
        .into_iter()
        .map(|(key, record)| Op::Put {
            entity_type: "Note".to_string(),
            key: PrimaryKey::new(key),
            record,
        })
        .collect();
    bytes.extend(
        Frame {
            seq: SequenceNumber::new(1),
            ops,
        }
        .encode()
        .unwrap(),
    );
    fs::write(path, bytes).unwrap();
}

fn header_version(path: &Path) -> SchemaVersion {
    Scan::read(&fs::read(path).unwrap())
        .unwrap()
        .header
        .schema_version
}

fn stored_notes(path: &Path) -> Vec<(PrimaryKey, Record)> {
    let backend = FileBackend::open(path).unwrap();
    let engine = Engine::open(
        Box::new(backend),
        &StoreConfig::default(),
        SchemaVersion::new(0),
    )
    .unwrap();
    engine
        .records("Note")
        .map(|(key, record)| (key, record.clone()))
        .collect()
}

fn defaults_table(target: u64) -> MigrationTable {
    let mut table = MigrationTable::new(SchemaVersion::new(target));
    for v in 4..=target {
        table
            .register(AddDefault::new(v, "Note", format!("field_v{v}"), Value::Null))
            .unwrap();
    }
    table
}

#[tokio::test]
async fn v3_to_v7_appends_each_default() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    seed(
        &path,
        3,
        vec![
            (1, Record::new().with("body", "one")),
            (2, Record::new().with("body", "two")),
        ],
    );

    let store = Store::open(&path, StoreConfig::default(), &defaults_table(7)).unwrap();
    let report = store.migration_report().clone();
    assert_eq!(report.from, SchemaVersion::new(3));
    assert_eq!(report.to, SchemaVersion::new(7));
    let versions: Vec<u64> = report.applied.iter().map(|s| s.version.as_u64()).collect();
    assert_eq!(versions, vec![4, 5, 6, 7]);
    assert!(report.applied.iter().all(|s| s.records == 2));
    assert_eq!(store.schema_version(), SchemaVersion::new(7));
    store.shutdown().await.unwrap();

    assert_eq!(header_version(&path), SchemaVersion::new(7));
    for (_, record) in stored_notes(&path) {
        for v in 4..=7 {
            assert!(record.contains(&format!("field_v{v}")));
        }
    }
}

#[tokio::test]
async fn reopening_a_current_store_runs_nothing() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    seed(&path, 3, vec![(1, Record::new().with("body", "one"))]);

    drop(Store::open(&path, StoreConfig::default(), &defaults_table(7)).unwrap());
    let store = Store::open(&path, StoreConfig::default(), &defaults_table(7)).unwrap();
    assert!(!store.migration_report().migrated());
    assert!(store.migration_report().applied.is_empty());
}

#[test]
fn failed_step_leaves_file_untouched() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    seed(
        &path,
        3,
        vec![
            (1, Record::new().with("body", "one").with("date", 1)),
            (2, Record::new().with("body", "two")),
        ],
    );
    let before = fs::read(&path).unwrap();

    let table = defaults_table(5)
        .with(
            RequireFields::new(5, "Note")
                .field("body", ValueKind::Text)
                .field("date", ValueKind::Integer),
        )
        .unwrap();
    let err = Store::open(&path, StoreConfig::default(), &table).unwrap_err();
    match err {
        CoreError::MigrationFailed(e) => {
            assert!(matches!(e, MigrationError::Step { key, .. } if key == PrimaryKey::new(2)));
            assert_eq!(
                e.root_cause(),
                &MigrationError::MissingField {
                    field: "date".to_string()
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(fs::read(&path).unwrap(), before);
    assert_eq!(header_version(&path), SchemaVersion::new(3));
}

#[test]
fn newer_store_is_refused() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    seed(&path, 9, vec![(1, Record::new())]);
    let before = fs::read(&path).unwrap();

    let err = Store::open(&path, StoreConfig::default(), &defaults_table(7)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::SchemaTooNew { on_disk, target }
            if on_disk == SchemaVersion::new(9) && target == SchemaVersion::new(7)
    ));
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[test]
fn new_store_starts_at_target() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    let store = Store::open(&path, StoreConfig::default(), &defaults_table(7)).unwrap();
    assert_eq!(store.schema_version(), SchemaVersion::new(7));
    assert!(store.migration_report().applied.is_empty());
    drop(store);
    assert_eq!(header_version(&path), SchemaVersion::new(7));
}

#[test]
fn closure_steps_transform_records() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    seed(&path, 1, vec![(1, Record::new().with("body", "Hello"))]);

    let table = MigrationTable::new(SchemaVersion::new(2))
        .with(FnStep::new(2, "Note", "lowercase_body", |_, mut record: Record| {
            let body = record.text("body")?.to_lowercase();
            record.insert("body", body);
            Ok(record)
        }))
        .unwrap();
    drop(Store::open(&path, StoreConfig::default(), &table).unwrap());

    let notes = stored_notes(&path);
    assert_eq!(notes[0].1.text("body").unwrap(), "hello");
}

#[test]
fn garbage_file_is_invalid() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    fs::write(&path, b"not a favor store at all").unwrap();
    let err = Store::open(&path, StoreConfig::default(), &defaults_table(4)).unwrap_err();
    assert!(matches!(err, CoreError::InvalidFormat { .. }));
}
