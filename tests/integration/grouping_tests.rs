use dupindex::duplicates::{find_duplicate_groups, GroupStats, PreferencePolicy};
use dupindex::index::FileIndex;
use dupindex::indexer::{Indexer, IndexerConfig};
use dupindex::scanner::path_utils::normalize_path;
use dupindex::scanner::Fingerprint;
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
fn test_groups_are_exactly_equal_fingerprints() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/1", b"one");
    write(dir.path(), "b/1", b"one");
    write(dir.path(), "c/1", b"one");
    write(dir.path(), "a/2", b"two");
    write(dir.path(), "b/2", b"two");
    write(dir.path(), "unique", b"three");

    let index = indexed(dir.path());
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();

    assert_eq!(groups.len(), 2);
    for group in &groups {
        for path in &group.paths {
            assert_eq!(index.get(path).unwrap().unwrap().fingerprint, group.fingerprint);
        }
    }
    let fingerprints: Vec<Fingerprint> = groups.iter().map(|g| g.fingerprint).collect();
    let mut sorted = fingerprints.clone();
    sorted.sort();
    assert_eq!(fingerprints, sorted);
    assert!(!fingerprints.contains(&Fingerprint::of_bytes(b"three")));

    let stats = GroupStats::from_groups(&groups);
    assert_eq!(stats.duplicate_files, 3);
    assert_eq!(stats.reclaimable_bytes, 3 * 2 + 3);
}

#[test]
fn test_original_prefers_shallow_then_short() {
    let dir = tempdir().unwrap();
    let shallow = write(dir.path(), "x.txt", b"dup");
    let deep = write(dir.path(), "nested/x.txt", b"dup");

    let index = indexed(dir.path());
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].original, shallow);
    assert_eq!(groups[0].duplicates, vec![deep]);
    assert!(!groups[0].no_matching_original);
}

#[test]
fn test_preferred_directory_wins_over_depth() {
    let dir = tempdir().unwrap();
    write(dir.path(), "x.txt", b"dup");
    let kept = write(dir.path(), "archive/deep/x.txt", b"dup");

    let index = indexed(dir.path());
    let policy =
        PreferencePolicy::with_directories(vec![normalize_path(&dir.path().join("archive")).unwrap()]);
    let groups = find_duplicate_groups(&index, None, &policy).unwrap();

    assert_eq!(groups[0].original, kept);
    assert!(!groups[0].no_matching_original);
}

#[test]
fn test_unmatched_preference_is_flagged() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a/x", b"dup");
    write(dir.path(), "b/x", b"dup");

    let index = indexed(dir.path());
    let policy = PreferencePolicy::with_directories(vec![PathBuf::from("/nowhere/archive")]);
    let groups = find_duplicate_groups(&index, None, &policy).unwrap();

    assert_eq!(groups.len(), 1);
    assert!(groups[0].no_matching_original);
    assert_eq!(groups[0].original, normalize_path(&dir.path().join("a/x")).unwrap());
}

#[test]
fn test_subtree_restricts_members() {
    let dir = tempdir().unwrap();
    write(dir.path(), "in/a", b"dup");
    write(dir.path(), "in/b", b"dup");
    write(dir.path(), "out/c", b"dup");
    write(dir.path(), "in/solo", b"pair");
    write(dir.path(), "out/solo", b"pair");

    let index = indexed(dir.path());
    let subtree = normalize_path(&dir.path().join("in")).unwrap();
    let groups =
        find_duplicate_groups(&index, Some(&subtree), &PreferencePolicy::default()).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert!(groups[0].paths.iter().all(|p| p.starts_with(&subtree)));
}
