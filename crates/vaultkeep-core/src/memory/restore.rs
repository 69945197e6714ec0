//! Restore previews over a vault's monthly archives.
//!
//! A preview answers "what would be restored" for one month, a text query,
//! or everything. It never touches the filesystem beyond reads; carrying out
//! a restore is left to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::archive::{find_duplicates, ArchiveStore, DuplicateSession, ScannedEntry, SkippedArchive};
use super::month::{parse_restore_month, MonthKey};
use super::ranking::{ranking_score_at, RankingConfig};
use crate::error::{VaultError, VaultResult};
use crate::obs;
use crate::vault::VaultPaths;

/// Raw restore options as a caller collects them. Exactly one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreRequest {
    pub date: Option<String>,
    pub search: Option<String>,
    pub all: bool,
}

impl RestoreRequest {
    /// Validate into a filter before any I/O happens.
    pub fn into_filter(self) -> VaultResult<RestoreFilter> {
        let search = self.search.filter(|q| !q.trim().is_empty());
        let mut given = Vec::new();
        if self.date.is_some() {
            given.push("date");
        }
        if search.is_some() {
            given.push("search");
        }
        if self.all {
            given.push("all");
        }
        if given.len() > 1 {
            return Err(VaultError::ConflictingRestoreFilters {
                given: given.join(", "),
            });
        }
        if let Some(date) = self.date {
            return Ok(RestoreFilter::Date(parse_restore_month(&date)?));
        }
        if let Some(query) = search {
            return Ok(RestoreFilter::Search(query));
        }
        if self.all {
            return Ok(RestoreFilter::All);
        }
        Err(VaultError::MissingRestoreFilter)
    }
}

/// Which archived memories a restore targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "mode", content = "value")]
pub enum RestoreFilter {
    Date(MonthKey),
    Search(String),
    All,
}

impl RestoreFilter {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Date(_) => "date",
            Self::Search(_) => "search",
            Self::All => "all",
        }
    }
}

/// Candidate set and summary for a restore, without side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestorePreview {
    pub filter: RestoreFilter,
    /// Candidates, highest ranking score first.
    pub entries: Vec<ScannedEntry>,
    pub total_entries: usize,
    /// Serialized size of the candidates.
    pub estimated_bytes: u64,
    pub months: Vec<MonthKey>,
    pub skipped: Vec<SkippedArchive>,
    pub duplicates: Vec<DuplicateSession>,
    /// Set when a by-date lookup found no archive for that month.
    pub no_archive_for: Option<MonthKey>,
}

impl RestorePreview {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Answers restore questions for one vault.
#[derive(Debug, Clone)]
pub struct RestoreService {
    vault_id: String,
    store: ArchiveStore,
    ranking: RankingConfig,
}

impl RestoreService {
    pub fn new(vault: &VaultPaths, ranking: RankingConfig) -> Self {
        Self {
            vault_id: vault.id().to_string(),
            store: ArchiveStore::for_vault(vault),
            ranking,
        }
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn preview(&self, filter: &RestoreFilter) -> VaultResult<RestorePreview> {
        self.preview_at(filter, Utc::now())
    }

    pub fn preview_at(&self, filter: &RestoreFilter, now: DateTime<Utc>) -> VaultResult<RestorePreview> {
        let preview = match filter {
            RestoreFilter::Date(month) => self.by_date(*month, now)?,
            RestoreFilter::Search(query) => self.by_search(query, now)?,
            RestoreFilter::All => self.by_all(now)?,
        };
        obs::emit_restore_previewed(&self.vault_id, filter.mode(), preview.total_entries);
        if !preview.duplicates.is_empty() {
            let ids: Vec<String> = preview.duplicates.iter().map(|d| d.session_id.clone()).collect();
            obs::emit_duplicates_detected(&self.vault_id, &ids);
        }
        Ok(preview)
    }

    /// One month file. Missing is reported; corrupt is an error naming the file.
    fn by_date(&self, month: MonthKey, now: DateTime<Utc>) -> VaultResult<RestorePreview> {
        let filter = RestoreFilter::Date(month);
        let Some(file) = self.store.read_month(month)? else {
            let mut preview = self.build(filter, Vec::new(), Vec::new(), now);
            preview.no_archive_for = Some(month);
            return Ok(preview);
        };
        let entries = file
            .entries
            .into_iter()
            .map(|entry| ScannedEntry { month, entry })
            .collect();
        Ok(self.build(filter, entries, Vec::new(), now))
    }

    /// Case-insensitive substring match over summary, content and tags.
    fn by_search(&self, query: &str, now: DateTime<Utc>) -> VaultResult<RestorePreview> {
        let scan = self.store.scan()?;
        let needle = query.to_lowercase();
        let entries = scan
            .entries
            .into_iter()
            .filter(|e| e.entry.search_text().to_lowercase().contains(&needle))
            .collect();
        Ok(self.build(RestoreFilter::Search(query.to_string()), entries, scan.skipped, now))
    }

    fn by_all(&self, now: DateTime<Utc>) -> VaultResult<RestorePreview> {
        let scan = self.store.scan()?;
        Ok(self.build(RestoreFilter::All, scan.entries, scan.skipped, now))
    }

    fn build(
        &self,
        filter: RestoreFilter,
        entries: Vec<ScannedEntry>,
        skipped: Vec<SkippedArchive>,
        now: DateTime<Utc>,
    ) -> RestorePreview {
        let mut scored: Vec<(f64, ScannedEntry)> = entries
            .into_iter()
            .map(|e| (ranking_score_at(&e.entry.to_memory_record(), &self.ranking, now), e))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        let entries: Vec<ScannedEntry> = scored.into_iter().map(|(_, e)| e).collect();

        let estimated_bytes = entries
            .iter()
            .map(|e| serde_json::to_vec(&e.entry).map_or(0, |v| v.len() as u64))
            .sum();
        let mut months: Vec<MonthKey> = entries.iter().map(|e| e.month).collect();
        months.sort();
        months.dedup();

        RestorePreview {
            filter,
            total_entries: entries.len(),
            estimated_bytes,
            months,
            skipped,
            duplicates: find_duplicates(&entries),
            no_archive_for: None,
            entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_exactly_one() {
        assert!(matches!(
            RestoreRequest::default().into_filter(),
            Err(VaultError::MissingRestoreFilter)
        ));
        let both = RestoreRequest {
            date: Some("2025-01".into()),
            all: true,
            ..Default::default()
        };
        match both.into_filter() {
            Err(VaultError::ConflictingRestoreFilters { given }) => assert_eq!(given, "date, all"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blank_search_is_missing() {
        let r = RestoreRequest {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert!(matches!(r.into_filter(), Err(VaultError::MissingRestoreFilter)));
    }

    #[test]
    fn test_date_request_resolves_month() {
        let r = RestoreRequest {
            date: Some("2025-01-15".into()),
            ..Default::default()
        };
        assert_eq!(
            r.into_filter().unwrap(),
            RestoreFilter::Date("2025-01".parse().unwrap())
        );
    }

    #[test]
    fn test_bad_date_rejected_before_io() {
        let r = RestoreRequest {
            date: Some("the ides of march".into()),
            ..Default::default()
        };
        match r.into_filter() {
            Err(VaultError::InvalidDate { input }) => assert_eq!(input, "the ides of march"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_missing_month_reported_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let vault = VaultPaths::new("v", dir.path()).unwrap();
        let svc = RestoreService::new(&vault, RankingConfig::default());
        let month: MonthKey = "2020-02".parse().unwrap();
        let p = svc.preview(&RestoreFilter::Date(month)).unwrap();
        assert!(p.is_empty());
        assert_eq!(p.no_archive_for, Some(month));
        assert!(!vault.archives_dir().exists());
    }
}
