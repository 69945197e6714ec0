//! Monthly JSON archives of session-derived memories.
//!
//! Layout: `<sessions>/<vault>/.archives/memories-archive-<YYYY-MM>.json`.
//! One file per month, merged into rather than rewritten. There is no file
//! locking: concurrent writers to the same month are not supported.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::month::MonthKey;
use super::record::{MemoryQualityScore, MemoryRecord, UsageTracking};
use crate::error::{VaultError, VaultResult};
use crate::obs;
use crate::vault::VaultPaths;

const FILE_PREFIX: &str = "memories-archive-";
const FILE_SUFFIX: &str = ".json";

/// One archived memory. Immutable once written; identified by
/// `session_id` within its month file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveEntry {
    pub session_id: String,
    pub node_id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub content: String,
    pub archived_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ArchiveEntry {
    /// Text searched by restore queries: summary, content and tags joined
    /// by single spaces (tags among themselves too). A query spanning two
    /// fields matches only when it includes that separating space, so
    /// `"alpha beta"` finds summary `alpha` followed by content `beta` but
    /// `"alphabeta"` does not.
    pub fn search_text(&self) -> String {
        format!("{} {} {}", self.summary, self.content, self.tags.join(" "))
    }

    /// Lift into a rankable record. `metadata.command`, `metadata.quality`
    /// and `metadata.usage` are used when present and well-formed.
    pub fn to_memory_record(&self) -> MemoryRecord {
        let command = self
            .metadata
            .get("command")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let quality = self
            .metadata
            .get("quality")
            .and_then(|v| serde_json::from_value::<MemoryQualityScore>(v.clone()).ok())
            .map(|q| MemoryQualityScore::new(q.overall, q.relevance_to_command, q.completeness, q.accuracy));
        let usage = self
            .metadata
            .get("usage")
            .and_then(|v| serde_json::from_value::<UsageTracking>(v.clone()).ok());
        MemoryRecord {
            id: self.session_id.clone(),
            command,
            summary: self.summary.clone(),
            content: self.content.clone(),
            tags: self.tags.clone(),
            created_at: self.archived_at,
            quality,
            usage,
        }
    }
}

/// Contents of one month file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveFile {
    pub entries: Vec<ArchiveEntry>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// An entry found during a scan, tagged with its month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedEntry {
    pub month: MonthKey,
    pub entry: ArchiveEntry,
}

/// A file a scan could not use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedArchive {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of reading every month file of a vault.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveScan {
    pub entries: Vec<ScannedEntry>,
    pub months: Vec<MonthKey>,
    pub skipped: Vec<SkippedArchive>,
}

/// A session id present in more than one month file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSession {
    pub session_id: String,
    pub months: Vec<MonthKey>,
}

/// Outcome of merging entries into a month file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    pub month: MonthKey,
    pub added: usize,
    pub skipped_existing: usize,
    pub total_entries: usize,
}

fn file_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^memories-archive-(\d{4}-\d{2})\.json$").expect("static pattern")
    })
}

/// Reads and writes a vault's month files.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn for_vault(vault: &VaultPaths) -> Self {
        Self::new(vault.archives_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, month: MonthKey) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{month}{FILE_SUFFIX}"))
    }

    /// Month files present, ascending. A missing directory has none.
    pub fn list_months(&self) -> VaultResult<Vec<MonthKey>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(VaultError::io(&self.dir, e)),
        };
        let mut months = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| VaultError::io(&self.dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(caps) = file_pattern().captures(&name) {
                if let Ok(month) = caps[1].parse::<MonthKey>() {
                    months.push(month);
                }
            }
        }
        months.sort();
        Ok(months)
    }

    /// Read one month. Missing is `Ok(None)`; unparseable is
    /// [`VaultError::CorruptArchive`] naming the file.
    pub fn read_month(&self, month: MonthKey) -> VaultResult<Option<ArchiveFile>> {
        let path = self.path_for(month);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VaultError::io(path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| VaultError::CorruptArchive { path, source })
    }

    /// Read every month file, skipping those that cannot be read or parsed.
    pub fn scan(&self) -> VaultResult<ArchiveScan> {
        let mut scan = ArchiveScan::default();
        for month in self.list_months()? {
            match self.read_month(month) {
                Ok(Some(file)) => {
                    scan.months.push(month);
                    scan.entries.extend(
                        file.entries
                            .into_iter()
                            .map(|entry| ScannedEntry { month, entry }),
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    let path = self.path_for(month);
                    obs::emit_archive_skipped(&path, &e);
                    scan.skipped.push(SkippedArchive {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(scan)
    }

    /// Merge `entries` into the month file, creating it if needed.
    ///
    /// Entries whose `session_id` already exists in that month are skipped.
    /// A corrupt existing file is left untouched and reported.
    pub fn append(&self, month: MonthKey, entries: Vec<ArchiveEntry>) -> VaultResult<AppendOutcome> {
        self.append_at(month, entries, Utc::now())
    }

    pub fn append_at(
        &self,
        month: MonthKey,
        entries: Vec<ArchiveEntry>,
        now: DateTime<Utc>,
    ) -> VaultResult<AppendOutcome> {
        let mut file = self.read_month(month)?.unwrap_or_else(|| ArchiveFile {
            entries: Vec::new(),
            created_at: now,
            last_updated: now,
        });

        let mut known: BTreeSet<String> =
            file.entries.iter().map(|e| e.session_id.clone()).collect();
        let mut added = 0;
        let mut skipped_existing = 0;
        for entry in entries {
            if known.insert(entry.session_id.clone()) {
                file.entries.push(entry);
                added += 1;
            } else {
                skipped_existing += 1;
            }
        }
        file.last_updated = now;

        self.write_month(month, &file)?;
        tracing::debug!(
            month = %month,
            added = added,
            skipped = skipped_existing,
            "archive month updated"
        );
        Ok(AppendOutcome {
            month,
            added,
            skipped_existing,
            total_entries: file.entries.len(),
        })
    }

    fn write_month(&self, month: MonthKey, file: &ArchiveFile) -> VaultResult<()> {
        let path = self.path_for(month);
        fs::create_dir_all(&self.dir).map_err(|e| VaultError::io(&self.dir, e))?;
        let json = serde_json::to_vec_pretty(file)?;

        // Atomic write: temp file in the same directory, then rename.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| VaultError::io(&self.dir, e))?;
        tmp.write_all(&json).map_err(|e| VaultError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| VaultError::io(&path, e.error))?;
        Ok(())
    }

    /// Session ids appearing in more than one month file. Which copy is
    /// canonical is left to the caller.
    pub fn duplicate_session_ids(&self) -> VaultResult<Vec<DuplicateSession>> {
        Ok(find_duplicates(&self.scan()?.entries))
    }
}

/// Group scanned entries by session id and keep ids seen in two or more months.
pub fn find_duplicates(entries: &[ScannedEntry]) -> Vec<DuplicateSession> {
    let mut by_id: BTreeMap<&str, BTreeSet<MonthKey>> = BTreeMap::new();
    for e in entries {
        by_id.entry(e.entry.session_id.as_str()).or_default().insert(e.month);
    }
    by_id
        .into_iter()
        .filter(|(_, months)| months.len() > 1)
        .map(|(id, months)| DuplicateSession {
            session_id: id.to_string(),
            months: months.into_iter().collect(),
        })
        .collect()
}
