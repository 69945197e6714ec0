//! Retention policy engine: lifecycle classification, the retention floor,
//! and the cleanup executor that applies them to sessions and backups.

pub mod cleanup;
pub mod policy;

pub use cleanup::{
    list_backups, should_auto_cleanup, BackupRecord, CleanupExecutor, CleanupFailure,
    CleanupOptions, CleanupResult, AUTO_CLEANUP_PERCENT,
};
pub use policy::{classify, plan_cleanup, removable_prefix_len, SessionState};
