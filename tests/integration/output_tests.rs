use dupindex::duplicates::{find_duplicate_groups, PreferencePolicy};
use dupindex::index::FileIndex;
use dupindex::indexer::{Indexer, IndexerConfig};
use dupindex::output::{CsvReport, OutputTarget, TextReport, WriteMode};
use dupindex::scanner::path_utils::normalize_path;
use dupindex::scanner::Fingerprint;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_reports_from_indexed_tree() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("copies")).unwrap();
    fs::write(dir.path().join("orig.txt"), "hello").unwrap();
    fs::write(dir.path().join("copies/orig.txt"), "hello").unwrap();

    let index = Arc::new(FileIndex::open_in_memory().unwrap());
    Indexer::new(Arc::clone(&index), IndexerConfig::default().with_workers(2))
        .unwrap()
        .index_tree(dir.path())
        .unwrap();
    let groups = find_duplicate_groups(&index, None, &PreferencePolicy::default()).unwrap();

    let original = normalize_path(&dir.path().join("orig.txt")).unwrap();
    let copy = normalize_path(&dir.path().join("copies/orig.txt")).unwrap();

    let mut text = Vec::new();
    TextReport::new(&groups).write_to(&mut text).unwrap();
    assert_eq!(String::from_utf8(text).unwrap(), format!("{}\n", copy.display()));

    let fp = Fingerprint::of_bytes(b"hello").to_hex();
    let csv = CsvReport::new(&groups).render().unwrap();
    assert_eq!(
        csv,
        format!(
            "status,path,fingerprint\noriginal,{},{fp}\nduplicate,{},{fp}\n",
            original.display(),
            copy.display()
        )
    );
}

#[test]
fn test_csv_append_writes_single_header() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("report.csv");
    let groups = Vec::new();
    let target = OutputTarget::from_option(Some(out.clone()), WriteMode::Append);

    for _ in 0..2 {
        let (writer, continuing) = target.open().unwrap();
        CsvReport::new(&groups).write_to(writer, continuing).unwrap();
    }

    let content = fs::read_to_string(&out).unwrap();
    assert_eq!(content.matches("status,path,fingerprint").count(), 1);
}
