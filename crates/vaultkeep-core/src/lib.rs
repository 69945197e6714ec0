//! vaultkeep core library
//!
//! Session memory lifecycle for AI-assisted vaults: storage accounting,
//! retention cleanup, memory ranking and restore previews over monthly
//! archives. Every entry point takes explicit configuration and returns a
//! plain value; nothing here holds state between calls.

pub mod config;
pub mod error;
pub mod memory;
pub mod obs;
pub mod retention;
pub mod storage;
pub mod telemetry;
pub mod vault;

pub use config::{
    BackupRetention, ConfigLoader, RetentionConfig, RetentionOverrides, SessionRetention,
};
pub use error::{VaultError, VaultResult};
pub use memory::{
    filter_by_quality, load_top_memories, rank_memories, ArchiveEntry, ArchiveStore,
    MemoryQualityScore, MemoryRecord, MonthKey, RankingConfig, RestoreFilter, RestorePreview,
    RestoreRequest, RestoreService, UsageTracking,
};
pub use obs::{
    emit_archive_skipped, emit_cleanup_finished, emit_cleanup_started, emit_deletion_failed,
    emit_duplicates_detected, emit_restore_previewed, emit_storage_measured, CleanupSpan,
};
pub use retention::{
    should_auto_cleanup, CleanupExecutor, CleanupOptions, CleanupResult, SessionState,
};
pub use storage::{calculate_node_storage, list_sessions, SessionRecord, StorageUsage};
pub use telemetry::{init_tracing, LogFormat};
pub use vault::VaultPaths;

/// vaultkeep version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
