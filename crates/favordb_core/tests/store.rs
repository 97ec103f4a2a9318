//! Store handle and CRUD façade.

mod common;

use common::{item, key, memory_store, no_migrations, tag, Item, Tag};
use favordb_core::{
    CoreError, Entity, LiveView, PrimaryKey, SchemaVersion, SharedStore, Store, StoreConfig,
    UpdatePolicy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn create_then_get_roundtrips() {
    let store = memory_store();
    let created = store.create(item(1, "mug")).await.unwrap();
    assert_eq!(created.key(), key(1));

    let found = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(*found, item(1, "mug"));
    assert!(store.get::<Item>(key(2)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_create_conflicts_and_keeps_first() {
    let store = memory_store();
    store.create(item(1, "mug")).await.unwrap();

    let err = store.create(item(1, "candle")).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::WriteConflict { ref entity_type, key: k } if entity_type == "Item" && k == key(1)
    ));
    let stored = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(stored.name, "mug");
}

#[tokio::test]
async fn read_all_is_frozen_and_ordered() {
    let store = memory_store();
    for no in [3, 1, 2] {
        store.create(item(no, "gift")).await.unwrap();
    }
    store.create(tag(1, "birthday")).await.unwrap();

    let before = store.read_all::<Item>().await.unwrap();
    let keys: Vec<u64> = before.iter().map(|f| f.key().as_u64()).collect();
    assert_eq!(keys, vec![1, 2, 3]);

    store.delete_all().await.unwrap();
    assert_eq!(before.len(), 3);
    assert_eq!(before[0].name, "gift");
    assert!(store.read_all::<Item>().await.unwrap().is_empty());
    assert_eq!(store.count::<Tag>().await.unwrap(), 0);
}

#[tokio::test]
async fn frozen_snapshots_go_stale_not_wrong() {
    let store = memory_store();
    let first = store.create(item(1, "mug")).await.unwrap();
    assert!(store.is_current(&first).await.unwrap());

    store
        .update_with(item(1, "cup"), UpdatePolicy::All)
        .await
        .unwrap();
    assert!(!store.is_current(&first).await.unwrap());
    assert_eq!(first.name, "mug");

    let handle = tokio::spawn(async move { first.name.clone() });
    assert_eq!(handle.await.unwrap(), "mug");
}

#[tokio::test]
async fn update_default_merges_fields() {
    let store = memory_store();
    let noted = Item {
        note: Some("for Jiwoo".to_string()),
        ..item(1, "mug")
    };
    store.create(noted).await.unwrap();

    let merged = store.update(item(1, "big mug")).await.unwrap();
    assert_eq!(merged.name, "big mug");
    assert_eq!(merged.note.as_deref(), Some("for Jiwoo"));

    let inserted = store.update(item(2, "candle")).await.unwrap();
    assert_eq!(inserted.key(), key(2));
    assert_eq!(store.count::<Item>().await.unwrap(), 2);
}

#[tokio::test]
async fn update_error_if_missing() {
    let store = memory_store();
    let err = store
        .update_with(item(9, "ghost"), UpdatePolicy::ErrorIfMissing)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert_eq!(store.count::<Item>().await.unwrap(), 0);
}

#[tokio::test]
async fn update_all_replaces_and_is_atomic() {
    let store = memory_store();
    let noted = Item {
        note: Some("keep?".to_string()),
        ..item(1, "mug")
    };
    store.create(noted).await.unwrap();

    let updated = store
        .update_all(vec![item(1, "cup"), item(2, "candle")])
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);
    let first = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(first.note, None);

    let err = store
        .update_all_with(
            vec![item(1, "plate"), item(3, "missing")],
            UpdatePolicy::ErrorIfMissing,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    let first = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(first.name, "cup");
}

#[tokio::test]
async fn delete_returns_removed_state() {
    let store = memory_store();
    let mug = item(1, "mug");
    store.create(mug.clone()).await.unwrap();

    let removed = store.delete(mug.clone()).await.unwrap();
    assert_eq!(*removed, mug);
    assert!(store.get::<Item>(key(1)).await.unwrap().is_none());

    let err = store.delete(mug.clone()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}

#[tokio::test]
async fn retain_only_deletes_the_complement() {
    let store = memory_store();
    for no in [1, 2, 3] {
        store.create(item(no, "gift")).await.unwrap();
    }
    store.create(tag(1, "anniversary")).await.unwrap();

    let removed = store.retain_only(&[item(2, "gift")]).await.unwrap();
    let removed: Vec<PrimaryKey> = removed.iter().map(|f| f.key()).collect();
    assert_eq!(removed, vec![key(1), key(3)]);

    let left = store.read_all::<Item>().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].key(), key(2));
    assert_eq!(store.count::<Tag>().await.unwrap(), 1);
}

#[tokio::test]
async fn delete_complement_with_empty_keep_clears_type() {
    let store = memory_store();
    store.create(item(1, "mug")).await.unwrap();
    store.create(item(2, "cup")).await.unwrap();

    let removed = store.delete_complement::<Item>(&[]).await.unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(store.count::<Item>().await.unwrap(), 0);
}

#[tokio::test]
async fn delete_many_deletes_exactly_the_given_set() {
    let store = memory_store();
    for no in 1..=4 {
        store.create(item(no, "gift")).await.unwrap();
    }

    let removed = store
        .delete_many(&[item(1, "gift"), item(3, "gift")])
        .await
        .unwrap();
    assert_eq!(removed.len(), 2);
    let left: Vec<u64> = store
        .read_all::<Item>()
        .await
        .unwrap()
        .iter()
        .map(|f| f.key().as_u64())
        .collect();
    assert_eq!(left, vec![2, 4]);

    let err = store
        .delete_many(&[item(2, "gift"), item(9, "gift")])
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
    assert_eq!(store.count::<Item>().await.unwrap(), 2);
}

#[tokio::test]
async fn recreate_leaves_a_single_record() {
    let store = memory_store();
    for no in 1..=3 {
        store.create(item(no, "old")).await.unwrap();
    }
    store.recreate(item(7, "only")).await.unwrap();

    let all = store.read_all::<Item>().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key(), key(7));
}

#[tokio::test]
async fn submissions_run_in_order() {
    let store = memory_store();
    let a = store.create(item(1, "a"));
    let b = store.update_with(item(1, "b"), UpdatePolicy::All);
    let c = store.update_with(item(1, "c"), UpdatePolicy::All);
    let read = store.get::<Item>(key(1));

    assert_eq!(read.await.unwrap().unwrap().name, "c");
    assert_eq!(c.await.unwrap().name, "c");
    assert_eq!(b.await.unwrap().name, "b");
    assert_eq!(a.await.unwrap().name, "a");
}

#[tokio::test]
async fn dropped_pending_still_commits() {
    let store = memory_store();
    drop(store.create(item(1, "mug")));

    let found = store.get::<Item>(key(1)).await.unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn live_view_runs_on_the_store_thread() {
    let store = memory_store();
    store.create(item(1, "mug")).await.unwrap();
    store.create(item(2, "cup")).await.unwrap();

    let (thread, names, len) = store
        .with_live(|view: LiveView<'_, Item>| {
            let names: Vec<String> = view.iter().map(|i| i.unwrap().name).collect();
            (
                std::thread::current().name().map(str::to_string),
                names,
                view.len(),
            )
        })
        .await
        .unwrap();
    assert_eq!(thread.as_deref(), Some("favordb-store"));
    assert_eq!(names, vec!["mug", "cup"]);
    assert_eq!(len, 2);

    let frozen = store
        .with_live(|view: LiveView<'_, Item>| view.freeze(key(2)))
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frozen.name, "cup");
}

#[tokio::test]
async fn thread_name_comes_from_config() {
    let store = Store::open_in_memory(
        StoreConfig::new().thread_name("favor-db-test"),
        &no_migrations(),
    )
    .unwrap();
    let name = store
        .with_live(|_: LiveView<'_, Tag>| std::thread::current().name().map(str::to_string))
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("favor-db-test"));
}

#[tokio::test]
async fn shutdown_closes_every_clone() {
    let store = memory_store();
    let other = store.clone();
    store.create(item(1, "mug")).await.unwrap();

    store.shutdown().await.unwrap();
    let err = other.get::<Item>(key(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::StoreClosed));
}

#[tokio::test]
async fn file_store_persists_and_locks() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("nested").join("favor.store");

    let store = Store::open(&path, StoreConfig::default(), &no_migrations()).unwrap();
    assert_eq!(store.locate(), Some(path.as_path()));
    store.create(item(1, "mug")).await.unwrap();
    store.create(tag(5, "pinned")).await.unwrap();

    let second = Store::open(&path, StoreConfig::default(), &no_migrations());
    assert!(matches!(second, Err(CoreError::DatabaseLocked)));

    store.shutdown().await.unwrap();

    let store = Store::open(&path, StoreConfig::default(), &no_migrations()).unwrap();
    assert_eq!(store.schema_version(), SchemaVersion::new(1));
    let found = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(found.name, "mug");
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.entities.get("Tag"), Some(&1));
    assert_eq!(stats.frames, 2);
}

#[tokio::test]
async fn lock_outlives_engine_when_last_handle_drops_on_store_thread() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    let store = Store::open(&path, StoreConfig::default(), &no_migrations()).unwrap();
    store.create(item(1, "mug")).await.unwrap();

    let (go, wait) = std::sync::mpsc::channel::<()>();
    let last = store.clone();
    let reopen_path = path.clone();
    let done = store.with_live(move |_: LiveView<'_, Item>| {
        wait.recv().unwrap();
        drop(last);
        // The engine is still alive on this thread.
        matches!(
            Store::open(&reopen_path, StoreConfig::default(), &no_migrations()),
            Err(CoreError::DatabaseLocked)
        )
    });
    drop(store);
    go.send(()).unwrap();
    assert!(done.await.unwrap());

    let mut reopened = None;
    for _ in 0..200 {
        match Store::open(&path, StoreConfig::default(), &no_migrations()) {
            Ok(store) => {
                reopened = Some(store);
                break;
            }
            Err(CoreError::DatabaseLocked) => {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            Err(e) => panic!("reopen failed: {e}"),
        }
    }
    let store = reopened.expect("lock released after the store thread stopped");
    let found = store.get::<Item>(key(1)).await.unwrap().unwrap();
    assert_eq!(found.name, "mug");
}

#[tokio::test]
async fn missing_file_is_not_created_when_disabled() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("absent.store");
    let result = Store::open(
        &path,
        StoreConfig::new().create_if_missing(false),
        &no_migrations(),
    );
    assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
    assert!(!path.exists());
}

#[tokio::test]
async fn open_compacts_past_threshold() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("favor.store");
    let config = StoreConfig::new().compact_on_open_threshold(4);

    let store = Store::open(&path, config.clone(), &no_migrations()).unwrap();
    for no in 1..=10 {
        store.create(item(no, "gift")).await.unwrap();
    }
    assert_eq!(store.stats().await.unwrap().frames, 10);
    drop(store);

    let store = Store::open(&path, config, &no_migrations()).unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.frames, 1);
    assert_eq!(stats.entities.get("Item"), Some(&10));
}

#[tokio::test]
async fn explicit_compaction_keeps_records() {
    let store = memory_store();
    for no in 1..=5 {
        store.create(item(no, "gift")).await.unwrap();
    }
    store.retain_only(&[item(5, "gift")]).await.unwrap();

    let stats = store.compact().await.unwrap();
    assert!(stats.bytes_after < stats.bytes_before);
    assert_eq!(store.count::<Item>().await.unwrap(), 1);
}

#[test]
fn shared_store_opens_once() {
    let shared = Arc::new(SharedStore::new());
    let opens = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let shared = Arc::clone(&shared);
            let opens = Arc::clone(&opens);
            std::thread::spawn(move || {
                shared
                    .get_or_open(|| {
                        opens.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(20));
                        Store::open_in_memory(StoreConfig::default(), &no_migrations())
                    })
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert!(shared.get().is_some());
}

#[test]
fn shared_store_retries_after_failed_open() {
    let shared = SharedStore::new();
    let failed = shared.get_or_open(|| Err(CoreError::DatabaseLocked));
    assert!(failed.is_err());
    assert!(shared.get().is_none());

    let store = shared.get_or_open(common::memory_store_result).unwrap();
    assert_eq!(store.schema_version(), SchemaVersion::new(1));
}

#[test]
fn entity_keys_are_caller_assigned() {
    assert_eq!(item(42, "x").primary_key(), key(42));
}
