mod common;

use bifrost::dns::enums::DNSResourceType;
use bifrost::zone::{
    RecordStore, ReloadOutcome, ZoneError, ZoneLoader, ZoneSnapshot, ZoneWatcher, load_initial,
};
use common::{a_record, create_test_query, engine_for_zone};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn set_mtime(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

#[tokio::test]
async fn test_reload_safety_under_parse_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("example.zone");
    fs::write(&path, "www.example.com. 300 IN A 1.2.3.4\n").unwrap();
    set_mtime(&path, 1_000);

    let (store, engine) = engine_for_zone(&path, None).await;
    let before = store.snapshot();
    let mut watcher = ZoneWatcher::polling(
        ZoneLoader::new(&path, None),
        store.clone(),
        Duration::from_secs(30),
    );

    fs::write(&path, "www.example.com. 300 IN A 1.2.3\n").unwrap();
    set_mtime(&path, 2_000);

    match watcher.tick().await {
        ReloadOutcome::Failed(ZoneError::MalformedZone { line, .. }) => assert_eq!(line, 1),
        other => panic!("expected a failed reload, got {:?}", other),
    }
    assert_eq!(*store.snapshot(), *before);

    // Still serving the old data
    let query = create_test_query("www.example.com", DNSResourceType::A);
    let answer = engine.resolve(&query).await;
    assert_eq!(answer.answers[0].rdata, vec![1, 2, 3, 4]);

    // The failed attempt is not retried until the file changes again
    assert!(matches!(watcher.tick().await, ReloadOutcome::Unchanged));

    fs::write(&path, "www.example.com. 300 IN A 5.6.7.8\n").unwrap();
    set_mtime(&path, 3_000);
    assert!(matches!(
        watcher.tick().await,
        ReloadOutcome::Reloaded { records: 1 }
    ));
    let answer = engine.resolve(&query).await;
    assert_eq!(answer.answers[0].rdata, vec![5, 6, 7, 8]);
}

#[tokio::test]
async fn test_unreadable_source_during_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("example.zone");
    fs::write(&path, "www.example.com. 300 IN A 1.2.3.4\n").unwrap();

    let loader = ZoneLoader::new(&path, None);
    let store = Arc::new(RecordStore::new());
    load_initial(&loader, &store).await.unwrap();

    let mut watcher = ZoneWatcher::polling(loader, store.clone(), Duration::from_secs(30));
    fs::remove_file(&path).unwrap();
    watcher.request_reload();

    assert!(matches!(
        watcher.tick().await,
        ReloadOutcome::Failed(ZoneError::SourceUnreadable { .. })
    ));
    assert_eq!(store.snapshot().len(), 1);
}

#[tokio::test]
async fn test_idempotent_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("example.zone");
    fs::write(
        &path,
        "$ORIGIN example.com.\n@ 300 IN NS ns1\nns1 300 IN A 192.0.2.1\nwww 300 IN CNAME ns1\n",
    )
    .unwrap();

    let loader = ZoneLoader::new(&path, None);
    let first = loader.load().await.unwrap();
    let second = loader.load().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.ns_records().len(), 1);
}

#[tokio::test]
async fn test_startup_load_failure_is_fatal() {
    let loader = ZoneLoader::new("/nonexistent/bifrost/example.zone", None);
    let store = RecordStore::new();
    assert!(load_initial(&loader, &store).await.is_err());
    assert!(store.snapshot().is_empty());
}

#[test]
fn test_snapshot_atomicity_under_concurrent_readers() {
    let old = ZoneSnapshot::from_records(
        (0..50)
            .map(|i| a_record(&format!("old{}.example.", i), 60, [10, 0, 0, 1]))
            .collect(),
    );
    let new = ZoneSnapshot::from_records(
        (0..80)
            .map(|i| a_record(&format!("new{}.example.", i), 60, [10, 0, 0, 2]))
            .collect(),
    );

    let store = Arc::new(RecordStore::new());
    store.replace(old.clone());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    let snapshot = store.snapshot();
                    let olds = snapshot
                        .records()
                        .iter()
                        .filter(|r| r.name().starts_with("old"))
                        .count();
                    // Either entirely old or entirely new
                    assert!(
                        (olds == 50 && snapshot.len() == 50) || (olds == 0 && snapshot.len() == 80)
                    );
                }
            })
        })
        .collect();

    for i in 0..200 {
        if i % 2 == 0 {
            store.replace(new.clone());
        } else {
            store.replace(old.clone());
        }
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
}
