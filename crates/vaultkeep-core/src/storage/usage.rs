//! Storage pressure reporting for a vault.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::inventory::{calculate_directory_size, try_list_sessions};
use crate::config::RetentionConfig;
use crate::vault::VaultPaths;

/// Sessions younger than this count as active for reporting.
pub const ACTIVE_WINDOW_DAYS: i64 = 30;

/// Archived sessions are reported at this fraction of their raw size.
///
/// An estimate of what compaction would leave behind, not a measurement.
pub const ARCHIVED_SIZE_ESTIMATE_RATIO: f64 = 0.3;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Count and size of one session partition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBucket {
    pub count: usize,
    #[serde(rename = "sizeMB")]
    pub size_mb: f64,
    /// `true` when `size_mb` is derived from [`ARCHIVED_SIZE_ESTIMATE_RATIO`].
    pub is_estimate: bool,
}

/// Snapshot of a vault's storage footprint.
///
/// `percent_used == round(total_size_mb / max_storage_mb * 100)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    #[serde(rename = "sessionsSizeMB")]
    pub sessions_size_mb: f64,
    pub active_sessions: SessionBucket,
    pub archived_sessions: SessionBucket,
    #[serde(rename = "backupsSizeMB")]
    pub backups_size_mb: f64,
    #[serde(rename = "totalSizeMB")]
    pub total_size_mb: f64,
    pub percent_used: u32,
    #[serde(rename = "maxStorageMB")]
    pub max_storage_mb: u64,
}

impl StorageUsage {
    /// All-zero usage, reported when measurement fails.
    pub fn zeroed(max_storage_mb: u64) -> Self {
        Self {
            max_storage_mb,
            archived_sessions: SessionBucket {
                is_estimate: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Advisory threshold for UI warnings.
    pub fn is_warning(&self, config: &RetentionConfig) -> bool {
        self.percent_used >= config.warn_at_percent
    }
}

/// Measure a vault against `max_storage_mb`. Never fails.
pub fn calculate_node_storage(vault: &VaultPaths, max_storage_mb: u64) -> StorageUsage {
    calculate_node_storage_as_of(vault, max_storage_mb, Local::now().date_naive())
}

pub fn calculate_node_storage_as_of(
    vault: &VaultPaths,
    max_storage_mb: u64,
    today: NaiveDate,
) -> StorageUsage {
    let sessions = match try_list_sessions(&vault.sessions_dir(), today) {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!(
                vault_id = %vault.id(),
                error = %e,
                "storage measurement failed, reporting zero usage"
            );
            return StorageUsage::zeroed(max_storage_mb);
        }
    };

    let mut active_bytes = 0u64;
    let mut active_count = 0usize;
    let mut archived_bytes = 0u64;
    let mut archived_count = 0usize;
    for session in &sessions {
        let bytes = calculate_directory_size(&session.path);
        if session.age_days <= ACTIVE_WINDOW_DAYS {
            active_count += 1;
            active_bytes += bytes;
        } else {
            archived_count += 1;
            archived_bytes += bytes;
        }
    }

    let sessions_size_mb = to_mb(calculate_directory_size(&vault.sessions_dir()));
    let backups_size_mb = to_mb(calculate_directory_size(&vault.backups_dir()));
    let total_size_mb = round2(sessions_size_mb + backups_size_mb);

    let usage = StorageUsage {
        sessions_size_mb,
        active_sessions: SessionBucket {
            count: active_count,
            size_mb: to_mb(active_bytes),
            is_estimate: false,
        },
        archived_sessions: SessionBucket {
            count: archived_count,
            size_mb: round2(archived_bytes as f64 / BYTES_PER_MB * ARCHIVED_SIZE_ESTIMATE_RATIO),
            is_estimate: true,
        },
        backups_size_mb,
        total_size_mb,
        percent_used: percent_used(total_size_mb, max_storage_mb),
        max_storage_mb,
    };
    crate::obs::emit_storage_measured(vault.id(), &usage);
    usage
}

/// `round(total / max * 100)`; an unlimited (zero) ceiling reports 0%.
pub fn percent_used(total_size_mb: f64, max_storage_mb: u64) -> u32 {
    if max_storage_mb == 0 {
        return 0;
    }
    (total_size_mb / max_storage_mb as f64 * 100.0).round() as u32
}

pub(crate) fn to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::fs;

    fn write_session(v: &VaultPaths, date: NaiveDate, id: &str, bytes: usize) {
        let dir = v
            .sessions_dir()
            .join(date.format("%Y/%m/%d").to_string())
            .join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("log.json"), vec![b'x'; bytes]).unwrap();
    }

    #[test]
    fn test_empty_vault_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        let v = VaultPaths::new("v", dir.path()).unwrap();
        let u = calculate_node_storage(&v, 100);
        assert_eq!(u.total_size_mb, 0.0);
        assert_eq!(u.percent_used, 0);
        assert_eq!(u.max_storage_mb, 100);
    }

    #[test]
    fn test_partitions_active_and_archived() {
        let dir = tempfile::tempdir().unwrap();
        let v = VaultPaths::new("v", dir.path()).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
        let mb = 1024 * 1024;
        write_session(&v, today - Duration::days(2), "fresh", mb);
        write_session(&v, today - Duration::days(30), "edge", mb);
        write_session(&v, today - Duration::days(31), "old", 2 * mb);
        fs::create_dir_all(v.backups_dir()).unwrap();
        fs::write(v.backups_dir().join("v-1.tar.gz"), vec![0u8; mb]).unwrap();

        let u = calculate_node_storage_as_of(&v, 10, today);
        assert_eq!(u.active_sessions.count, 2);
        assert_eq!(u.active_sessions.size_mb, 2.0);
        assert_eq!(u.archived_sessions.count, 1);
        assert_eq!(u.archived_sessions.size_mb, 0.6);
        assert!(u.archived_sessions.is_estimate);
        assert_eq!(u.sessions_size_mb, 4.0);
        assert_eq!(u.backups_size_mb, 1.0);
        assert_eq!(u.total_size_mb, 5.0);
        assert_eq!(u.percent_used, 50);
    }

    #[test]
    fn test_percent_invariant() {
        assert_eq!(percent_used(0.0, 0), 0);
        assert_eq!(percent_used(9.96, 10), 100);
        assert_eq!(percent_used(0.04, 10), 0);
        assert_eq!(percent_used(2.5, 10), 25);
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(StorageUsage::zeroed(50)).unwrap();
        assert!(json.get("sessionsSizeMB").is_some());
        assert!(json["activeSessions"].get("sizeMB").is_some());
        assert_eq!(json["maxStorageMB"], 50);
    }
}
