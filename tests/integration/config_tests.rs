use dupindex::config::Config;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_config_defaults_extract() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_env_overrides_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "workers = 2\nchunk_size = 4096\n").unwrap();

    std::env::set_var("DUPINDEX_TEST_LAYER_CHUNK_SIZE", "8192");
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DUPINDEX_TEST_LAYER_"))
        .extract()
        .unwrap();
    std::env::remove_var("DUPINDEX_TEST_LAYER_CHUNK_SIZE");

    assert_eq!(config.workers, Some(2));
    assert_eq!(config.chunk_size, 8192);
}

#[test]
fn test_load_explicit_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dupindex.toml");
    let db = dir.path().join("idx.db");
    fs::write(
        &path,
        format!(
            "database = {:?}\npreferred_directories = [\"/keep\"]\ncleanup_missing = true\n",
            db.to_string_lossy()
        ),
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.database, db);
    assert_eq!(config.preferred_directories, vec![PathBuf::from("/keep")]);
    assert!(config.cleanup_missing);
    assert!(config.validate().is_ok());
}

#[test]
fn test_saved_config_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let config = Config {
        database: dir.path().join("saved.db"),
        workers: Some(6),
        preferred_directories: vec![PathBuf::from("/a"), PathBuf::from("/b")],
        ..Config::default()
    };
    fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

    let loaded: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract()
        .unwrap();
    assert_eq!(loaded, config);
}
