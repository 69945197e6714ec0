//! Cleanup executor: reconciles a vault's sessions and backups against policy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::policy::plan_cleanup;
use crate::config::RetentionConfig;
use crate::obs;
use crate::storage::inventory::{calculate_directory_size, list_sessions_as_of};
use crate::storage::usage::{calculate_node_storage_as_of, to_mb};
use crate::vault::VaultPaths;

/// Usage above this percentage triggers automatic cleanup.
pub const AUTO_CLEANUP_PERCENT: u32 = 95;

const BACKUP_SUFFIX: &str = ".tar.gz";

/// Per-invocation cleanup knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOptions {
    pub older_than_days: u32,
    /// Account for selected sessions as archived instead of deleting them.
    pub archive_only: bool,
    pub dry_run: bool,
    pub keep_min_sessions: usize,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            older_than_days: 90,
            archive_only: false,
            dry_run: false,
            keep_min_sessions: 100,
        }
    }
}

impl CleanupOptions {
    pub fn from_config(config: &RetentionConfig) -> Self {
        Self {
            older_than_days: config.sessions.retention_days,
            keep_min_sessions: config.sessions.keep_min_sessions,
            ..Self::default()
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn archive_only(mut self, archive_only: bool) -> Self {
        self.archive_only = archive_only;
        self
    }
}

/// A deletion that failed; excluded from the tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of one cleanup invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub sessions_deleted: usize,
    pub sessions_archived: usize,
    pub backups_deleted: usize,
    #[serde(rename = "spaceFreedMB")]
    pub space_freed_mb: f64,
    pub duration_ms: u64,
    pub dry_run: bool,
    pub failures: Vec<CleanupFailure>,
}

/// A backup archive found under `<root>/backups`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Filesystem mutations of a live cleanup.
pub(crate) trait Remover {
    fn remove_session(&self, path: &Path) -> io::Result<()>;
    fn remove_backup(&self, path: &Path) -> io::Result<()>;
}

struct FsRemover;

impl Remover for FsRemover {
    fn remove_session(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn remove_backup(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Applies a [`RetentionConfig`] to vaults.
#[derive(Debug, Clone, Copy)]
pub struct CleanupExecutor<'a> {
    config: &'a RetentionConfig,
}

impl<'a> CleanupExecutor<'a> {
    pub fn new(config: &'a RetentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetentionConfig {
        self.config
    }

    /// Run (or simulate) cleanup of `vault` as of now.
    pub fn cleanup_node(&self, vault: &VaultPaths, options: &CleanupOptions) -> CleanupResult {
        self.cleanup_node_as_of(vault, options, Local::now().date_naive(), Utc::now())
    }

    /// Run (or simulate) cleanup with explicit clocks for session and backup ages.
    pub fn cleanup_node_as_of(
        &self,
        vault: &VaultPaths,
        options: &CleanupOptions,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> CleanupResult {
        self.cleanup_with(vault, options, today, now, &FsRemover)
    }

    pub(crate) fn cleanup_with(
        &self,
        vault: &VaultPaths,
        options: &CleanupOptions,
        today: NaiveDate,
        now: DateTime<Utc>,
        remover: &dyn Remover,
    ) -> CleanupResult {
        let started = Instant::now();
        let _span = obs::CleanupSpan::enter(vault.id(), options.dry_run);
        let mut result = CleanupResult {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let mut freed_bytes = 0u64;

        let sessions = list_sessions_as_of(vault, today);
        let selected = if self.config.sessions.enabled {
            plan_cleanup(&sessions, options.older_than_days, options.keep_min_sessions)
        } else {
            tracing::debug!(vault_id = %vault.id(), "session cleanup disabled by config");
            Vec::new()
        };
        obs::emit_cleanup_started(vault.id(), selected.len(), sessions.len());

        let sessions_root = vault.sessions_dir();
        for session in selected {
            if options.archive_only {
                result.sessions_archived += 1;
                continue;
            }
            let bytes = calculate_directory_size(&session.path);
            if !options.dry_run {
                if let Err(e) = remover.remove_session(&session.path) {
                    record_failure(&mut result, &session.path, &e);
                    continue;
                }
                prune_empty_parents(&session.path, &sessions_root);
            }
            result.sessions_deleted += 1;
            freed_bytes += bytes;
        }

        if !options.archive_only {
            let backups = list_backups(&vault.backups_dir());
            for backup in select_backups_for_rotation(&backups, self.config, now) {
                if !options.dry_run {
                    if let Err(e) = remover.remove_backup(&backup.path) {
                        record_failure(&mut result, &backup.path, &e);
                        continue;
                    }
                }
                result.backups_deleted += 1;
                freed_bytes += backup.size_bytes;
            }
        }

        result.space_freed_mb = to_mb(freed_bytes);
        result.duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_cleanup_finished(vault.id(), &result);
        result
    }

    /// Whether storage pressure warrants cleanup without being asked.
    pub fn should_auto_cleanup(&self, vault: &VaultPaths) -> bool {
        should_auto_cleanup(vault, self.config)
    }
}

/// `true` only when auto cleanup is enabled and usage exceeds
/// [`AUTO_CLEANUP_PERCENT`]. `warn_at_percent` is advisory and plays no part.
pub fn should_auto_cleanup(vault: &VaultPaths, config: &RetentionConfig) -> bool {
    if !config.auto_cleanup {
        return false;
    }
    let usage =
        calculate_node_storage_as_of(vault, config.sessions.max_storage_mb, Local::now().date_naive());
    usage.percent_used > AUTO_CLEANUP_PERCENT
}

/// Backups newest first. A missing directory has no backups.
pub fn list_backups(dir: &Path) -> Vec<BackupRecord> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %dir.display(), error = %e, "cannot list backups");
            }
            return Vec::new();
        }
    };

    let mut backups: Vec<BackupRecord> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(BACKUP_SUFFIX))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().ok()?;
            Some(BackupRecord {
                path: entry.path(),
                modified: DateTime::<Utc>::from(modified),
                size_bytes: meta.len(),
            })
        })
        .collect();

    backups.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.path.cmp(&a.path)));
    backups
}

/// Everything past the newest `max_count`, plus anything older than
/// `max_age_days`. The newest backup is never rotated out by age alone.
fn select_backups_for_rotation<'b>(
    backups: &'b [BackupRecord],
    config: &RetentionConfig,
    now: DateTime<Utc>,
) -> Vec<&'b BackupRecord> {
    let max_age = i64::from(config.backups.max_age_days);
    backups
        .iter()
        .enumerate()
        .filter(|(i, b)| {
            let over_count = *i >= config.backups.max_count;
            let too_old = max_age > 0 && *i > 0 && (now - b.modified).num_days() > max_age;
            over_count || too_old
        })
        .map(|(_, b)| b)
        .collect()
}

fn record_failure(result: &mut CleanupResult, path: &Path, error: &io::Error) {
    obs::emit_deletion_failed(path, error);
    result.failures.push(CleanupFailure {
        path: path.to_path_buf(),
        message: error.to_string(),
    });
}

/// Remove now-empty `DD`, `MM` and `YYYY` directories above a deleted session.
fn prune_empty_parents(session_path: &Path, sessions_root: &Path) {
    let mut current = session_path.parent();
    while let Some(dir) = current {
        if dir == sessions_root || !dir.starts_with(sessions_root) {
            break;
        }
        let is_empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !is_empty || fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}
