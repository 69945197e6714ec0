//! Memory subsystem: quality ranking, monthly archives and restore previews.
//!
//! Archived session memories live in one JSON file per month. The ranker
//! orders memories by recency, quality and usage; restore previews use both.

pub mod archive;
pub mod month;
pub mod ranking;
pub mod record;
pub mod restore;

pub use archive::{
    find_duplicates, AppendOutcome, ArchiveEntry, ArchiveFile, ArchiveScan, ArchiveStore,
    DuplicateSession, ScannedEntry, SkippedArchive,
};
pub use month::{parse_restore_month, parse_restore_month_as_of, MonthKey};
pub use ranking::{
    auto_quality_score, effective_quality, filter_by_quality, load_top_memories,
    load_top_memories_at, rank_memories, rank_memories_at, ranking_score, ranking_score_at,
    recency_score, recency_score_at, update_usage_tracking, update_usage_tracking_at,
    usage_weight, RankingConfig, DEFAULT_QUALITY_THRESHOLD, DEFAULT_TOP_LIMIT, RECENCY_FLOOR,
};
pub use record::{AccessTrend, MemoryQualityScore, MemoryRecord, UsageTracking};
pub use restore::{RestoreFilter, RestorePreview, RestoreRequest, RestoreService};
