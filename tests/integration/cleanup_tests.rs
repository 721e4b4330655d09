use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
use dupindex::index::FileIndex;
use dupindex::indexer::{Indexer, IndexerConfig};
use dupindex::scanner::path_utils::normalize_path;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_missing_files_are_removed_and_leave_groups() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a");
    let b = dir.path().join("b");
    fs::write(&a, "twin").unwrap();
    fs::write(&b, "twin").unwrap();

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let indexer =
        Indexer::new(Arc::clone(&index), IndexerConfig::default().with_workers(2)).unwrap();
    indexer.index_tree(dir.path()).unwrap();
    assert_eq!(
        find_duplicate_groups(&index, None, &PreferencePolicy::default())
            .unwrap()
            .len(),
        1
    );

    fs::remove_file(&b).unwrap();
    assert_eq!(indexer.cleanup_missing(None).unwrap(), 1);

    assert!(index.get(&normalize_path(&b).unwrap()).unwrap().is_none());
    assert!(index.get(&normalize_path(&a).unwrap()).unwrap().is_some());
    assert!(find_duplicate_groups(&index, None, &PreferencePolicy::default())
        .unwrap()
        .is_empty());
}

#[test]
fn test_cleanup_limited_to_subtree() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("keep")).unwrap();
    fs::create_dir_all(dir.path().join("check")).unwrap();
    let outside = dir.path().join("keep/gone");
    let inside = dir.path().join("check/gone");
    fs::write(&outside, "1").unwrap();
    fs::write(&inside, "2").unwrap();

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let indexer =
        Indexer::new(Arc::clone(&index), IndexerConfig::default().with_workers(1)).unwrap();
    indexer.index_tree(dir.path()).unwrap();

    fs::remove_file(&outside).unwrap();
    fs::remove_file(&inside).unwrap();
    let removed = indexer
        .cleanup_missing(Some(&dir.path().join("check")))
        .unwrap();

    assert_eq!(removed, 1);
    assert!(index.get(&normalize_path(&outside).unwrap()).unwrap().is_some());
    assert!(index.get(&normalize_path(&inside).unwrap()).unwrap().is_none());
}

#[test]
fn test_cleanup_stops_on_shutdown() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("f");
    fs::write(&file, "x").unwrap();

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    Indexer::new(Arc::clone(&index), IndexerConfig::default().with_workers(1))
        .unwrap()
        .index_tree(dir.path())
        .unwrap();
    fs::remove_file(&file).unwrap();

    let stopped = Indexer::new(
        Arc::clone(&index),
        IndexerConfig::default()
            .with_workers(1)
            .with_shutdown_flag(Arc::new(AtomicBool::new(true))),
    )
    .unwrap();
    assert_eq!(stopped.cleanup_missing(None).unwrap(), 0);
    assert_eq!(index.len().unwrap(), 1);
}
