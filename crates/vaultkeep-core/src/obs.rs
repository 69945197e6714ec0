//! Structured observability hooks for the memory lifecycle.
//!
//! This module provides:
//! - A vault-scoped cleanup span via the `CleanupSpan` RAII guard
//! - Emission functions for storage measurement, cleanup, archive scans and restore previews
//!
//! Events are emitted at `info!` (failures at `warn!`) and filtered through
//! `VAULTKEEP_LOG`. For JSON output, initialise with [`crate::LogFormat::Json`].

use std::path::Path;

use tracing::{info, warn};

use crate::retention::CleanupResult;
use crate::storage::StorageUsage;

/// RAII guard that enters a vault-scoped span for the duration of a cleanup.
///
/// # Example
///
/// ```ignore
/// let _span = CleanupSpan::enter("notes", true);
/// // every event below carries vault_id = "notes", dry_run = true
/// ```
pub struct CleanupSpan {
    _span: tracing::span::EnteredSpan,
}

impl CleanupSpan {
    pub fn enter(vault_id: &str, dry_run: bool) -> Self {
        let span = tracing::info_span!("vaultkeep.cleanup", vault_id = %vault_id, dry_run = dry_run);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: storage measured for a vault.
pub fn emit_storage_measured(vault_id: &str, usage: &StorageUsage) {
    info!(
        event = "storage.measured",
        vault_id = %vault_id,
        total_mb = usage.total_size_mb,
        percent_used = usage.percent_used,
        active = usage.active_sessions.count,
        archived = usage.archived_sessions.count,
    );
}

/// Emit event: cleanup plan computed.
pub fn emit_cleanup_started(vault_id: &str, candidates: usize, total_sessions: usize) {
    info!(
        event = "cleanup.started",
        vault_id = %vault_id,
        candidates = candidates,
        total_sessions = total_sessions,
    );
}

/// Emit event: cleanup finished with its tallies.
pub fn emit_cleanup_finished(vault_id: &str, result: &CleanupResult) {
    info!(
        event = "cleanup.finished",
        vault_id = %vault_id,
        sessions_deleted = result.sessions_deleted,
        sessions_archived = result.sessions_archived,
        backups_deleted = result.backups_deleted,
        space_freed_mb = result.space_freed_mb,
        duration_ms = result.duration_ms,
        failures = result.failures.len(),
        dry_run = result.dry_run,
    );
}

/// Emit event: one deletion failed; the batch continues (warning level).
pub fn emit_deletion_failed(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "cleanup.delete_failed", path = %path.display(), error = %error);
}

/// Emit event: an unreadable archive file was skipped during a scan (warning level).
pub fn emit_archive_skipped(path: &Path, error: &dyn std::fmt::Display) {
    warn!(event = "archive.skipped", path = %path.display(), error = %error);
}

/// Emit event: the same session id lives in more than one month file (warning level).
pub fn emit_duplicates_detected(vault_id: &str, session_ids: &[String]) {
    warn!(
        event = "archive.duplicates",
        vault_id = %vault_id,
        count = session_ids.len(),
        session_ids = ?session_ids,
    );
}

/// Emit event: restore preview computed.
pub fn emit_restore_previewed(vault_id: &str, mode: &str, matches: usize) {
    info!(event = "restore.previewed", vault_id = %vault_id, mode = %mode, matches = matches);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_span_create() {
        let _span = CleanupSpan::enter("test-vault", false);
    }
}
