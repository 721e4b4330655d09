use dupindex::actions::{delete_duplicates, DeleteConfig, DeleteError};
use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
use dupindex::index::FileIndex;
use dupindex::indexer::{Indexer, IndexerConfig};
use dupindex::scanner::path_utils::normalize_path;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    normalize_path(&path).unwrap()
}

fn indexed(root: &Path) -> Arc<FileIndex> {
    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    Indexer::new(Arc::clone(&index), IndexerConfig::default().with_workers(2))
        .unwrap()
        .index_tree(root)
        .unwrap();
    index
}

#[test]
fn test_delete_keeps_preferred_original_and_updates_index() {
    let dir = tempdir().unwrap();
    let kept = write(dir.path(), "archive/photo.jpg", b"pixels");
    let copy1 = write(dir.path(), "p.jpg", b"pixels");
    let copy2 = write(dir.path(), "inbox/photo.jpg", b"pixels");

    let index = indexed(dir.path());
    let policy =
        PreferencePolicy::with_directories(vec![normalize_path(&dir.path().join("archive")).unwrap()]);
    let groups = find_duplicate_groups(&index, None, &policy).unwrap();

    let summary = delete_duplicates(&groups, &index, &DeleteConfig::default()).unwrap();

    assert_eq!(summary.deleted.len(), 2);
    assert_eq!(summary.bytes_freed, 12);
    assert_eq!(summary.records_removed, 2);
    assert!(kept.exists());
    assert!(!copy1.exists() && !copy2.exists());
    assert_eq!(index.len().unwrap(), 1);
    assert!(find_duplicate_groups(&index, None, &policy).unwrap().is_empty());
}

#[test]
fn test_groups_without_preferred_original_are_untouched() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a/f", b"same");
    let b = write(dir.path(), "b/f", b"same");

    let index = indexed(dir.path());
    let policy = PreferencePolicy::with_directories(vec![PathBuf::from("/not/here")]);
    let groups = find_duplicate_groups(&index, None, &policy).unwrap();
    let summary = delete_duplicates(&groups, &index, &DeleteConfig::default()).unwrap();

    assert_eq!(summary.groups_skipped, 1);
    assert!(summary.deleted.is_empty());
    assert!(a.exists() && b.exists());
    assert_eq!(index.len().unwrap(), 2);
}

#[test]
fn test_simulate_leaves_disk_and_index_alone() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");

    let index = indexed(dir.path());
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
    let config = DeleteConfig::default().with_simulate(true);
    let summary = delete_duplicates(&groups, &index, &config).unwrap();

    assert_eq!(summary.simulated, vec![b.clone()]);
    assert!(b.exists());
    assert_eq!(index.len().unwrap(), 2);
}

#[test]
fn test_verify_catches_stale_index() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");

    let index = indexed(dir.path());
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
    fs::write(&b, b"edited after indexing").unwrap();

    let config = DeleteConfig::default().with_verify(true);
    let summary = delete_duplicates(&groups, &index, &config).unwrap();

    assert!(b.exists());
    assert!(summary.deleted.is_empty());
    assert!(matches!(
        summary.failures.as_slice(),
        [DeleteError::ContentMismatch { .. }]
    ));
    assert_eq!(index.len().unwrap(), 2);
}

#[test]
fn test_verify_treats_vanished_duplicate_as_already_gone() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");

    let index = indexed(dir.path());
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
    fs::remove_file(&b).unwrap();

    let config = DeleteConfig::default().with_verify(true);
    let summary = delete_duplicates(&groups, &index, &config).unwrap();

    assert!(summary.failures.is_empty());
    assert_eq!(summary.already_missing, 1);
    assert_eq!(summary.records_removed, 1);
    assert!(index.get(&b).unwrap().is_none());
}
