//! Session discovery and size measurement.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::vault::VaultPaths;

/// One session directory found under `sessions/<vault>/YYYY/MM/DD/`.
///
/// Recomputed on every pass; the path is its identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub path: PathBuf,
    pub session_id: String,
    pub date: NaiveDate,
    pub age_days: i64,
}

impl SessionRecord {
    /// `YYYY-MM-DD` key derived from the directory position.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

fn year_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}$").expect("static pattern"))
}

fn two_digit_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}$").expect("static pattern"))
}

/// List the vault's sessions, oldest first, aged against today's local date.
pub fn list_sessions(vault: &VaultPaths) -> Vec<SessionRecord> {
    list_sessions_as_of(vault, Local::now().date_naive())
}

/// List sessions aged against `today`. Unreadable trees yield an empty list.
pub fn list_sessions_as_of(vault: &VaultPaths, today: NaiveDate) -> Vec<SessionRecord> {
    match try_list_sessions(&vault.sessions_dir(), today) {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!(vault_id = %vault.id(), error = %e, "session listing failed");
            Vec::new()
        }
    }
}

/// Walk the four fixed levels. A missing root is an empty vault and an
/// unreadable root propagates, so storage accounting can tell "empty" from
/// "broken". Below the root, an unreadable year, month or day directory is
/// logged and skipped; the rest of the tree is still listed.
pub(crate) fn try_list_sessions(root: &Path, today: NaiveDate) -> io::Result<Vec<SessionRecord>> {
    let mut out = Vec::new();
    let years = match named_subdirs(root, year_pattern()) {
        Ok(dirs) => dirs,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(out),
        Err(e) => return Err(e),
    };

    for (year_name, year_dir) in years {
        for (month_name, month_dir) in subdirs_or_skip(&year_dir, two_digit_pattern()) {
            for (day_name, day_dir) in subdirs_or_skip(&month_dir, two_digit_pattern()) {
                let Some(date) = parse_ymd(&year_name, &month_name, &day_name) else {
                    tracing::debug!(path = %day_dir.display(), "skipping impossible date");
                    continue;
                };
                let sessions = match session_dirs(&day_dir) {
                    Ok(sessions) => sessions,
                    Err(e) => {
                        warn_skipped(&day_dir, &e);
                        continue;
                    }
                };
                out.extend(sessions.into_iter().map(|(session_id, path)| SessionRecord {
                    path,
                    session_id,
                    date,
                    age_days: (today - date).num_days(),
                }));
            }
        }
    }

    // Oldest first, then path for deterministic ordering within a day.
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(out)
}

fn subdirs_or_skip(dir: &Path, pattern: &Regex) -> Vec<(String, PathBuf)> {
    named_subdirs(dir, pattern).unwrap_or_else(|e| {
        warn_skipped(dir, &e);
        Vec::new()
    })
}

fn warn_skipped(dir: &Path, error: &io::Error) {
    tracing::warn!(path = %dir.display(), error = %error, "skipping unreadable session directory");
}

fn session_dirs(day_dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(day_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    Ok(dirs)
}

fn named_subdirs(dir: &Path, pattern: &Regex) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if pattern.is_match(&name) {
            dirs.push((name, entry.path()));
        }
    }
    Ok(dirs)
}

fn parse_ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// Recursive size of `path` in bytes. Any failure reports `0`.
pub fn calculate_directory_size(path: &Path) -> u64 {
    match try_directory_size(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "size measurement failed");
            0
        }
    }
}

fn try_directory_size(path: &Path) -> io::Result<u64> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }
    let mut total = 0u64;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += try_directory_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
