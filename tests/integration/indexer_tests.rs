use chrono::{TimeZone, Utc};
use dupindex::index::FileIndex;
use dupindex::indexer::{Indexer, IndexerConfig};
use dupindex::scanner::path_utils::normalize_path;
use dupindex::scanner::Fingerprint;
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::tempdir;

fn indexer(index: &Arc<FileIndex>, config: IndexerConfig) -> Indexer {
    Indexer::new(Arc::clone(index), config).unwrap()
}

fn write(root: &Path, rel: &str, content: &[u8]) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    normalize_path(&path).unwrap()
}

#[test]
fn test_index_tree_records_every_file() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.txt", b"alpha");
    write(dir.path(), "sub/b.txt", b"beta");
    write(dir.path(), "sub/deeper/c.txt", b"alpha");
    write(dir.path(), "empty", b"");

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let summary = indexer(&index, IndexerConfig::default().with_workers(3))
        .index_tree(dir.path())
        .unwrap();

    assert_eq!(summary.discovered, 4);
    assert_eq!(summary.hashed, 4);
    assert_eq!(summary.written, 4);
    assert_eq!(summary.bytes_hashed, 14);
    assert!(!summary.interrupted);
    assert!(!summary.has_recovered_errors());
    assert_eq!(summary.batches_flushed, 2);

    let record = index.get(&a).unwrap().unwrap();
    assert_eq!(record.fingerprint, Fingerprint::of_bytes(b"alpha"));
    assert_eq!(record.size, 5);
    assert_eq!(index.query_duplicate_fingerprints().unwrap().len(), 1);
}

#[test]
fn test_rescan_of_unchanged_tree_is_idempotent() {
    let dir = tempdir().unwrap();
    for i in 0..7 {
        write(dir.path(), &format!("d{}/f{}.bin", i % 3, i), &[i as u8; 100]);
    }

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let engine = indexer(&index, IndexerConfig::default().with_workers(2));

    engine.index_tree(dir.path()).unwrap();
    let mut first: Vec<_> = index
        .query_all_paths()
        .unwrap()
        .into_iter()
        .map(|p| index.get(&p).unwrap().unwrap())
        .collect();
    first.sort_by(|a, b| a.path.cmp(&b.path));

    engine.index_tree(dir.path()).unwrap();
    assert_eq!(index.len().unwrap(), first.len());
    for before in &first {
        let after = index.get(&before.path).unwrap().unwrap();
        assert_eq!(after.fingerprint, before.fingerprint);
        assert_eq!(after.size, before.size);
        assert_eq!(after.last_modified, before.last_modified);
        assert!(after.last_checked >= before.last_checked);
    }
}

#[test]
fn test_skip_existing_hashes_only_new_files() {
    let dir = tempdir().unwrap();
    write(dir.path(), "old1", b"1");
    write(dir.path(), "old2", b"2");

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    indexer(&index, IndexerConfig::default().with_workers(2))
        .index_tree(dir.path())
        .unwrap();

    write(dir.path(), "new", b"3");
    let summary = indexer(
        &index,
        IndexerConfig::default()
            .with_workers(2)
            .with_skip_existing(true),
    )
    .index_tree(dir.path())
    .unwrap();

    assert_eq!(summary.discovered, 3);
    assert_eq!(summary.skipped_existing, 2);
    assert_eq!(summary.hashed, 1);
    assert_eq!(index.len().unwrap(), 3);
}

#[test]
fn test_changed_content_moves_fingerprint() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a", b"same");
    let b = write(dir.path(), "b", b"same");

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let engine = indexer(&index, IndexerConfig::default().with_workers(2));
    engine.index_tree(dir.path()).unwrap();
    assert_eq!(index.query_duplicate_fingerprints().unwrap().len(), 1);

    fs::write(&b, b"different now").unwrap();
    let summary = engine.rescan_duplicates().unwrap();

    assert_eq!(summary.discovered, 2);
    assert!(index.query_duplicate_fingerprints().unwrap().is_empty());
    assert_eq!(
        index.get(&b).unwrap().unwrap().fingerprint,
        Fingerprint::of_bytes(b"different now")
    );
    assert_eq!(
        index.get(&a).unwrap().unwrap().fingerprint,
        Fingerprint::of_bytes(b"same")
    );
}

#[test]
fn test_rescan_drops_vanished_members() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a", b"twin");
    let b = write(dir.path(), "b", b"twin");
    write(dir.path(), "c", b"twin");

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let engine = indexer(&index, IndexerConfig::default().with_workers(2));
    engine.index_tree(dir.path()).unwrap();

    fs::remove_file(&b).unwrap();
    let summary = engine.rescan_duplicates().unwrap();

    assert_eq!(summary.missing_removed, 1);
    assert!(index.get(&b).unwrap().is_none());
    assert_eq!(index.len().unwrap(), 2);
    assert_eq!(index.query_duplicate_fingerprints().unwrap().len(), 1);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_counted_not_fatal() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    write(dir.path(), "ok", b"fine");
    let locked = write(dir.path(), "locked", b"secret");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::File::open(&locked).is_ok() {
        // Running with privileges that ignore file modes
        return;
    }

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let summary = indexer(&index, IndexerConfig::default().with_workers(2))
        .index_tree(dir.path())
        .unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    assert_eq!(summary.hashed, 1);
    assert_eq!(summary.hash_failures, 1);
    assert!(summary.has_recovered_errors());
    assert!(index.get(&locked).unwrap().is_none());
}

#[test]
fn test_record_keeps_file_mtime() {
    let dir = tempdir().unwrap();
    let path = write(dir.path(), "dated", b"contents");
    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 250_000_000)).unwrap();

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    indexer(&index, IndexerConfig::default().with_workers(1))
        .index_tree(dir.path())
        .unwrap();

    let record = index.get(&path).unwrap().unwrap();
    assert_eq!(
        record.last_modified,
        Utc.timestamp_opt(1_600_000_000, 250_000_000).unwrap()
    );
}

#[cfg(unix)]
#[test]
fn test_rescan_drops_path_replaced_by_symlink() {
    use dupindex::actions::{delete_duplicates, DeleteConfig};
    use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};

    let dir = tempdir().unwrap();
    let b = write(dir.path(), "b.txt", b"same");
    let c = write(dir.path(), "c.txt", b"same");
    let real = write(dir.path(), "real.bin", b"precious");

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    let engine = indexer(&index, IndexerConfig::default().with_workers(2));
    engine.index_tree(dir.path()).unwrap();

    fs::remove_file(&b).unwrap();
    std::os::unix::fs::symlink(&real, &b).unwrap();
    let summary = engine.rescan_duplicates().unwrap();

    assert_eq!(summary.missing_removed, 1);
    assert!(index.get(&b).unwrap().is_none());
    assert!(index.get(&c).unwrap().is_some());
    assert_eq!(
        index.get(&real).unwrap().unwrap().fingerprint,
        Fingerprint::of_bytes(b"precious")
    );

    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();
    assert!(groups.is_empty());
    let config = DeleteConfig::default().with_verify(true);
    let deleted = delete_duplicates(&groups, &index, &config).unwrap();
    assert!(deleted.deleted.is_empty());
    assert_eq!(fs::read(&real).unwrap(), b"precious");
}
