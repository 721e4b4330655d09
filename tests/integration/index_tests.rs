use chrono::{TimeZone, Utc};
use dupindex::index::{FileIndex, FileRecord};
use dupindex::scanner::Fingerprint;
use std::path::PathBuf;
use tempfile::tempdir;

fn record(path: &str, fp: u64) -> FileRecord {
    FileRecord::new(
        PathBuf::from(path),
        Fingerprint::from_u64(fp),
        42,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
    )
}

#[test]
fn test_one_record_per_path() {
    let index = FileIndex::open_in_memory().unwrap();

    index.upsert_one(&record("/data/a", 1)).unwrap();
    index.upsert_one(&record("/data/a", 2)).unwrap();
    let outcome = index
        .upsert_batch(&[record("/data/a", 3), record("/data/b", 3)])
        .unwrap();

    assert_eq!(outcome.written, 2);
    assert_eq!(index.len().unwrap(), 2);
    assert_eq!(
        index.get(&PathBuf::from("/data/a")).unwrap().unwrap().fingerprint,
        Fingerprint::from_u64(3)
    );
}

#[test]
fn test_index_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("file_index.db");

    {
        let index = FileIndex::open(&db).unwrap();
        index
            .upsert_batch(&[record("/x/1", 7), record("/x/2", 7)])
            .unwrap();
    }

    let index = FileIndex::open(&db).unwrap();
    assert_eq!(index.location(), Some(db.as_path()));
    assert_eq!(
        index.query_duplicate_fingerprints().unwrap(),
        vec![Fingerprint::from_u64(7)]
    );
    let stored = index.get(&PathBuf::from("/x/1")).unwrap().unwrap();
    assert_eq!(stored.size, 42);
    assert_eq!(
        stored.last_modified,
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    );
}

#[test]
fn test_upsert_refreshes_last_checked() {
    let index = FileIndex::open_in_memory().unwrap();
    let mut old = record("/data/a", 1);
    old.last_checked = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();

    index.upsert_one(&old).unwrap();
    let stored = index.get(&PathBuf::from("/data/a")).unwrap().unwrap();
    assert!(stored.last_checked > old.last_checked);
}

#[test]
fn test_fingerprint_grouping_follows_updates() {
    let index = FileIndex::open_in_memory().unwrap();
    index
        .upsert_batch(&[record("/a", 1), record("/b", 1), record("/c", 2)])
        .unwrap();
    assert_eq!(
        index.query_paths_for_fingerprint(Fingerprint::from_u64(1)).unwrap(),
        vec![PathBuf::from("/a"), PathBuf::from("/b")]
    );

    index.upsert_one(&record("/b", 2)).unwrap();
    assert_eq!(
        index.query_duplicate_fingerprints().unwrap(),
        vec![Fingerprint::from_u64(2)]
    );

    assert!(index.remove_by_path(&PathBuf::from("/c")).unwrap());
    assert!(index.query_duplicate_fingerprints().unwrap().is_empty());
    assert!(!index.remove_by_path(&PathBuf::from("/c")).unwrap());
}
