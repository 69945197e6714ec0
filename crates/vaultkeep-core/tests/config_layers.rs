//! Layered configuration: defaults < file < environment < overrides.

use std::collections::HashMap;
use std::fs;

use pretty_assertions::assert_eq;

use vaultkeep_core::{ConfigLoader, RetentionConfig, RetentionOverrides, VaultError};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_full_precedence_chain() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("vaultkeep.toml");
    fs::write(
        &file,
        r#"
[cleanup]
warnAtPercent = 70

[cleanup.sessions]
retentionDays = 60
keepMinSessions = 20

[cleanup.backups]
maxCount = 4
"#,
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_file(&file)
        .unwrap()
        .with_env(env(&[
            ("VAULTKEEP_CLEANUP_KEEP_MIN_SESSIONS", "30"),
            ("VAULTKEEP_CLEANUP_BACKUPS_MAX_COUNT", "6"),
        ]))
        .unwrap()
        .with_overrides(RetentionOverrides {
            backups_max_count: Some(2),
            ..Default::default()
        })
        .load();

    let mut expected = RetentionConfig::default();
    expected.warn_at_percent = 70;
    expected.sessions.retention_days = 60;
    expected.sessions.keep_min_sessions = 30;
    expected.backups.max_count = 2;
    assert_eq!(config, expected);
}

#[test]
fn test_missing_file_means_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigLoader::new()
        .with_file(&dir.path().join("absent.toml"))
        .unwrap()
        .load();
    assert_eq!(config, RetentionConfig::default());
}

#[test]
fn test_unparseable_file_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.toml");
    fs::write(&file, "[cleanup.sessions]\nretentionDays = \"soon\"\n").unwrap();
    let err = ConfigLoader::new().with_file(&file).unwrap_err();
    assert!(matches!(err, VaultError::Config { .. }));
    assert!(err.to_string().contains("broken.toml"));
}
