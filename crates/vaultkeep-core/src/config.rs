//! Layered retention configuration.
//!
//! Precedence, lowest first: built-in defaults, the `[cleanup]` table of a TOML
//! file, `VAULTKEEP_CLEANUP_*` environment variables, explicit overrides.
//! The merged [`RetentionConfig`] is built once per invocation and handed to
//! each component by reference.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

pub const ENV_PREFIX: &str = "VAULTKEEP_CLEANUP_";

/// Session retention knobs (`cleanup.sessions`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRetention {
    pub enabled: bool,
    pub retention_days: u32,
    pub archive_after_days: u32,
    #[serde(rename = "maxStorageMB")]
    pub max_storage_mb: u64,
    pub keep_min_sessions: usize,
}

impl Default for SessionRetention {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 90,
            archive_after_days: 30,
            max_storage_mb: 1024,
            keep_min_sessions: 100,
        }
    }
}

/// Backup rotation knobs (`cleanup.backups`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRetention {
    pub max_count: usize,
    /// Also rotate backups older than this many days. Zero (the default)
    /// leaves rotation purely count-based.
    pub max_age_days: u32,
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            max_count: 10,
            max_age_days: 0,
        }
    }
}

/// Full `cleanup` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    pub sessions: SessionRetention,
    pub backups: BackupRetention,
    pub auto_cleanup: bool,
    pub warn_at_percent: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            sessions: SessionRetention::default(),
            backups: BackupRetention::default(),
            auto_cleanup: false,
            warn_at_percent: 80,
        }
    }
}

/// Sparse set of values layered on top of a [`RetentionConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetentionOverrides {
    pub sessions_enabled: Option<bool>,
    pub retention_days: Option<u32>,
    pub archive_after_days: Option<u32>,
    pub max_storage_mb: Option<u64>,
    pub keep_min_sessions: Option<usize>,
    pub backups_max_count: Option<usize>,
    pub backups_max_age_days: Option<u32>,
    pub auto_cleanup: Option<bool>,
    pub warn_at_percent: Option<u32>,
}

impl RetentionConfig {
    /// Apply every value present in `layer`.
    pub fn apply(&mut self, layer: &RetentionOverrides) {
        if let Some(v) = layer.sessions_enabled {
            self.sessions.enabled = v;
        }
        if let Some(v) = layer.retention_days {
            self.sessions.retention_days = v;
        }
        if let Some(v) = layer.archive_after_days {
            self.sessions.archive_after_days = v;
        }
        if let Some(v) = layer.max_storage_mb {
            self.sessions.max_storage_mb = v;
        }
        if let Some(v) = layer.keep_min_sessions {
            self.sessions.keep_min_sessions = v;
        }
        if let Some(v) = layer.backups_max_count {
            self.backups.max_count = v;
        }
        if let Some(v) = layer.backups_max_age_days {
            self.backups.max_age_days = v;
        }
        if let Some(v) = layer.auto_cleanup {
            self.auto_cleanup = v;
        }
        if let Some(v) = layer.warn_at_percent {
            self.warn_at_percent = v;
        }
    }
}

// TOML file shape: every key optional so a file only overrides what it names.

#[derive(Debug, Default, Deserialize)]
struct FileRoot {
    #[serde(default)]
    cleanup: FileCleanup,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileCleanup {
    #[serde(default)]
    sessions: FileSessions,
    #[serde(default)]
    backups: FileBackups,
    auto_cleanup: Option<bool>,
    warn_at_percent: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileSessions {
    enabled: Option<bool>,
    retention_days: Option<u32>,
    archive_after_days: Option<u32>,
    #[serde(rename = "maxStorageMB")]
    max_storage_mb: Option<u64>,
    keep_min_sessions: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileBackups {
    max_count: Option<usize>,
    max_age_days: Option<u32>,
}

impl From<FileRoot> for RetentionOverrides {
    fn from(root: FileRoot) -> Self {
        let c = root.cleanup;
        Self {
            sessions_enabled: c.sessions.enabled,
            retention_days: c.sessions.retention_days,
            archive_after_days: c.sessions.archive_after_days,
            max_storage_mb: c.sessions.max_storage_mb,
            keep_min_sessions: c.sessions.keep_min_sessions,
            backups_max_count: c.backups.max_count,
            backups_max_age_days: c.backups.max_age_days,
            auto_cleanup: c.auto_cleanup,
            warn_at_percent: c.warn_at_percent,
        }
    }
}

/// Builds a [`RetentionConfig`] from its layers.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    layers: Vec<RetentionOverrides>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer the `[cleanup]` table of a TOML file. A missing file adds nothing.
    pub fn with_file(mut self, path: &Path) -> VaultResult<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self),
            Err(e) => return Err(VaultError::io(path, e)),
        };
        self.layers.push(parse_toml(&raw, &path.display().to_string())?);
        Ok(self)
    }

    /// Layer `VAULTKEEP_CLEANUP_*` values read through `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> VaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.layers.push(overrides_from_env(lookup)?);
        Ok(self)
    }

    /// Layer values from the real process environment.
    pub fn with_process_env(self) -> VaultResult<Self> {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Layer explicit caller overrides; these win over everything else.
    pub fn with_overrides(mut self, overrides: RetentionOverrides) -> Self {
        self.layers.push(overrides);
        self
    }

    pub fn load(self) -> RetentionConfig {
        let mut config = RetentionConfig::default();
        for layer in &self.layers {
            config.apply(layer);
        }
        config
    }
}

fn parse_toml(raw: &str, source_name: &str) -> VaultResult<RetentionOverrides> {
    let root: FileRoot = toml::from_str(raw).map_err(|e| VaultError::Config {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;
    Ok(root.into())
}

fn overrides_from_env<F>(lookup: F) -> VaultResult<RetentionOverrides>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(RetentionOverrides {
        sessions_enabled: env_value(&lookup, "SESSIONS_ENABLED")?,
        retention_days: env_value(&lookup, "RETENTION_DAYS")?,
        archive_after_days: env_value(&lookup, "ARCHIVE_AFTER_DAYS")?,
        max_storage_mb: env_value(&lookup, "MAX_STORAGE_MB")?,
        keep_min_sessions: env_value(&lookup, "KEEP_MIN_SESSIONS")?,
        backups_max_count: env_value(&lookup, "BACKUPS_MAX_COUNT")?,
        backups_max_age_days: env_value(&lookup, "BACKUPS_MAX_AGE_DAYS")?,
        auto_cleanup: env_value(&lookup, "AUTO_CLEANUP")?,
        warn_at_percent: env_value(&lookup, "WARN_AT_PERCENT")?,
    })
}

fn env_value<F, T>(lookup: &F, suffix: &str) -> VaultResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    let Some(raw) = lookup(&key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| VaultError::Config {
            source_name: key,
            message: format!("cannot parse value '{raw}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let c = ConfigLoader::new().load();
        assert_eq!(c.sessions.retention_days, 90);
        assert_eq!(c.sessions.archive_after_days, 30);
        assert_eq!(c.sessions.keep_min_sessions, 100);
        assert_eq!(c.backups.max_count, 10);
        assert_eq!(c.backups.max_age_days, 0);
        assert!(!c.auto_cleanup);
        assert_eq!(c.warn_at_percent, 80);
    }

    #[test]
    fn test_toml_layer_is_sparse() {
        let layer = parse_toml(
            r#"
            [cleanup]
            autoCleanup = true

            [cleanup.sessions]
            retentionDays = 45
            maxStorageMB = 512
            "#,
            "inline",
        )
        .unwrap();
        let c = ConfigLoader::new().with_overrides(layer).load();
        assert_eq!(c.sessions.retention_days, 45);
        assert_eq!(c.sessions.max_storage_mb, 512);
        assert!(c.auto_cleanup);
        assert_eq!(c.sessions.keep_min_sessions, 100);
    }

    #[test]
    fn test_bad_toml_names_source() {
        let err = parse_toml("[cleanup\nbroken", "vault.toml").unwrap_err();
        assert!(err.to_string().contains("vault.toml"));
    }

    #[test]
    fn test_env_over_defaults() {
        let c = ConfigLoader::new()
            .with_env(env(&[
                ("VAULTKEEP_CLEANUP_KEEP_MIN_SESSIONS", "5"),
                ("VAULTKEEP_CLEANUP_AUTO_CLEANUP", "true"),
            ]))
            .unwrap()
            .load();
        assert_eq!(c.sessions.keep_min_sessions, 5);
        assert!(c.auto_cleanup);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let err = ConfigLoader::new()
            .with_env(env(&[("VAULTKEEP_CLEANUP_RETENTION_DAYS", "ninety")]))
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("VAULTKEEP_CLEANUP_RETENTION_DAYS"));
    }

    #[test]
    fn test_overrides_win() {
        let c = ConfigLoader::new()
            .with_env(env(&[("VAULTKEEP_CLEANUP_RETENTION_DAYS", "10")]))
            .unwrap()
            .with_overrides(RetentionOverrides {
                retention_days: Some(3),
                ..Default::default()
            })
            .load();
        assert_eq!(c.sessions.retention_days, 3);
    }

    #[test]
    fn test_json_field_names() {
        let json = serde_json::to_value(RetentionConfig::default()).unwrap();
        assert_eq!(json["sessions"]["maxStorageMB"], 1024);
        assert_eq!(json["sessions"]["keepMinSessions"], 100);
        assert_eq!(json["backups"]["maxAgeDays"], 0);
        assert_eq!(json["warnAtPercent"], 80);
    }
}
