//! End-to-end tests for retention cleanup against on-disk vault fixtures.

use std::fs;

use chrono::{Duration, NaiveDate, Utc};
use pretty_assertions::assert_eq;

use vaultkeep_core::retention::{classify, CleanupExecutor, CleanupOptions, SessionState};
use vaultkeep_core::storage::{calculate_node_storage_as_of, list_sessions_as_of};
use vaultkeep_core::{should_auto_cleanup, RetentionConfig, VaultPaths};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
}

/// Create one session per age (in days before `today()`), each holding `bytes`.
fn vault_with_sessions(ages: &[i64], bytes: usize) -> (tempfile::TempDir, VaultPaths) {
    let dir = tempfile::tempdir().unwrap();
    let vault = VaultPaths::new("research", dir.path()).unwrap();
    for (i, age) in ages.iter().enumerate() {
        let date = today() - Duration::days(*age);
        let session = vault
            .sessions_dir()
            .join(date.format("%Y/%m/%d").to_string())
            .join(format!("session-{i:04}"));
        fs::create_dir_all(&session).unwrap();
        fs::write(session.join("transcript.json"), vec![b'x'; bytes]).unwrap();
    }
    (dir, vault)
}

fn options(keep: usize, dry_run: bool) -> CleanupOptions {
    CleanupOptions {
        older_than_days: 90,
        archive_only: false,
        dry_run,
        keep_min_sessions: keep,
    }
}

#[test]
fn test_150_sessions_20_expired_floor_100() {
    let mut ages: Vec<i64> = (0..130).map(|i| i % 60).collect();
    ages.extend((0..20).map(|i| 100 + i));
    let (_dir, vault) = vault_with_sessions(&ages, 16);
    let config = RetentionConfig::default();

    let result = CleanupExecutor::new(&config).cleanup_node_as_of(
        &vault,
        &options(100, false),
        today(),
        Utc::now(),
    );

    assert_eq!(result.sessions_deleted, 20);
    assert!(result.failures.is_empty());
    assert_eq!(list_sessions_as_of(&vault, today()).len(), 130);
}

#[test]
fn test_floor_always_holds() {
    for (n, keep) in [(5usize, 10usize), (10, 10), (50, 10), (30, 0)] {
        let ages: Vec<i64> = (0..n as i64).map(|i| 200 + i).collect();
        let (_dir, vault) = vault_with_sessions(&ages, 1);
        let config = RetentionConfig::default();
        CleanupExecutor::new(&config).cleanup_node_as_of(
            &vault,
            &options(keep, false),
            today(),
            Utc::now(),
        );
        let remaining = list_sessions_as_of(&vault, today()).len();
        assert!(remaining >= keep.min(n), "n={n} keep={keep} remaining={remaining}");
        assert_eq!(remaining, keep.min(n));
    }
}

#[test]
fn test_survivors_are_the_newest() {
    let (_dir, vault) = vault_with_sessions(&[300, 250, 200, 150], 1);
    let config = RetentionConfig::default();
    CleanupExecutor::new(&config).cleanup_node_as_of(&vault, &options(2, false), today(), Utc::now());
    let ages: Vec<i64> = list_sessions_as_of(&vault, today())
        .iter()
        .map(|s| s.age_days)
        .collect();
    assert_eq!(ages, vec![200, 150]);
}

#[test]
fn test_dry_run_matches_live_run_without_deleting() {
    let ages = [400, 300, 200, 120, 95, 60, 10, 1];
    let (_dry_dir, dry_vault) = vault_with_sessions(&ages, 2048);
    let (_live_dir, live_vault) = vault_with_sessions(&ages, 2048);
    let mut config = RetentionConfig::default();
    config.backups.max_count = 1;
    config.backups.max_age_days = 0;
    for v in [&dry_vault, &live_vault] {
        fs::create_dir_all(v.backups_dir()).unwrap();
        for name in ["research-1.tar.gz", "research-2.tar.gz", "research-3.tar.gz"] {
            fs::write(v.backups_dir().join(name), vec![0u8; 4096]).unwrap();
        }
    }
    let executor = CleanupExecutor::new(&config);

    let dry = executor.cleanup_node_as_of(&dry_vault, &options(3, true), today(), Utc::now());
    let live = executor.cleanup_node_as_of(&live_vault, &options(3, false), today(), Utc::now());

    assert!(dry.dry_run);
    assert!(!live.dry_run);
    assert_eq!(dry.sessions_deleted, live.sessions_deleted);
    assert_eq!(dry.backups_deleted, live.backups_deleted);
    assert_eq!(dry.space_freed_mb, live.space_freed_mb);
    assert_eq!(dry.sessions_deleted, 5);
    assert_eq!(dry.backups_deleted, 2);

    assert_eq!(list_sessions_as_of(&dry_vault, today()).len(), ages.len());
    assert_eq!(fs::read_dir(dry_vault.backups_dir()).unwrap().count(), 3);
    assert_eq!(list_sessions_as_of(&live_vault, today()).len(), 3);
    assert_eq!(fs::read_dir(live_vault.backups_dir()).unwrap().count(), 1);
}

#[test]
fn test_classify_matches_config() {
    let (_dir, vault) = vault_with_sessions(&[120, 45, 2], 1);
    let mut config = RetentionConfig::default();
    config.sessions.keep_min_sessions = 1;
    let sessions = list_sessions_as_of(&vault, today());
    let states: Vec<SessionState> = classify(&sessions, &config.sessions)
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    assert_eq!(
        states,
        vec![SessionState::Deletable, SessionState::Archivable, SessionState::Active]
    );
}

#[test]
fn test_storage_then_auto_cleanup_threshold() {
    let (_dir, vault) = vault_with_sessions(&[1, 2], 1024 * 1024);
    let mut config = RetentionConfig::default();
    config.sessions.max_storage_mb = 1;

    let usage = calculate_node_storage_as_of(&vault, config.sessions.max_storage_mb, today());
    assert_eq!(usage.percent_used, 200);
    assert!(usage.is_warning(&config));

    assert!(!should_auto_cleanup(&vault, &config));
    config.auto_cleanup = true;
    assert!(should_auto_cleanup(&vault, &config));

    config.sessions.max_storage_mb = 100;
    assert!(!should_auto_cleanup(&vault, &config));
}
