use clap::Parser;
use dupindex::cli::Cli;
use dupindex::config::ConfigError;
use dupindex::error::ExitCode;
use dupindex::index::FileIndex;
use dupindex::run_app;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn run(db: &Path, args: &[&str]) -> anyhow::Result<ExitCode> {
    let mut argv = vec!["dupindex", "-q", "--database"];
    let db = db.to_str().unwrap();
    argv.push(db);
    argv.extend_from_slice(args);
    run_app(Cli::try_parse_from(argv).unwrap())
}

#[test]
fn test_process_then_list_csv_then_delete() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(data.join("keep")).unwrap();
    fs::write(data.join("keep/a.txt"), "dup").unwrap();
    fs::write(data.join("a.txt"), "dup").unwrap();
    fs::write(data.join("b.txt"), "unique").unwrap();
    let db = dir.path().join("index.db");
    let data_str = data.to_str().unwrap();

    assert_eq!(run(&db, &["process", data_str]).unwrap(), ExitCode::Success);
    assert_eq!(FileIndex::open(&db).unwrap().len().unwrap(), 3);

    let report = dir.path().join("report.csv");
    let keep = data.join("keep");
    let code = run(
        &db,
        &[
            "list-duplicates-csv",
            "--prefer-directory",
            keep.to_str().unwrap(),
            "-o",
            report.to_str().unwrap(),
        ],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    let csv = fs::read_to_string(&report).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "status,path,fingerprint");
    assert!(lines[1].starts_with("original,") && lines[1].contains("keep"));
    assert!(lines[2].starts_with("duplicate,"));

    let code = run(
        &db,
        &["delete-duplicates", "--prefer-directory", keep.to_str().unwrap(), "--verify"],
    )
    .unwrap();
    assert_eq!(code, ExitCode::Success);
    assert!(data.join("keep/a.txt").exists());
    assert!(!data.join("a.txt").exists());
    assert_eq!(FileIndex::open(&db).unwrap().len().unwrap(), 2);
}

#[test]
fn test_existing_output_is_a_config_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");
    let out = dir.path().join("out.txt");
    fs::write(&out, "previous").unwrap();

    let err = run(&db, &["list-duplicates", "-o", out.to_str().unwrap()]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::OutputExists(_))
    ));
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
}

#[test]
fn test_missing_root_is_a_config_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");
    let missing = dir.path().join("absent");

    let err = run(&db, &["process", missing.to_str().unwrap()]).unwrap_err();
    assert_eq!(ExitCode::for_error(&err), ExitCode::ConfigError);
}

#[test]
fn test_zero_workers_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("index.db");

    let err = run(
        &db,
        &["process", dir.path().to_str().unwrap(), "--workers", "0"],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::InvalidWorkers)
    ));
}

#[test]
fn test_cleanup_and_rescan_commands() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("x"), "twin").unwrap();
    fs::write(data.join("y"), "twin").unwrap();
    let db = dir.path().join("index.db");

    run(&db, &["process", data.to_str().unwrap(), "--workers", "1"]).unwrap();
    fs::remove_file(data.join("y")).unwrap();

    assert_eq!(run(&db, &["rescan-duplicates"]).unwrap(), ExitCode::Success);
    assert_eq!(FileIndex::open(&db).unwrap().len().unwrap(), 1);

    fs::remove_file(data.join("x")).unwrap();
    assert_eq!(run(&db, &["cleanup"]).unwrap(), ExitCode::Success);
    assert!(FileIndex::open(&db).unwrap().is_empty().unwrap());
}
