//! Storage inventory: session discovery, size measurement and pressure.

pub mod inventory;
pub mod usage;

pub use inventory::{calculate_directory_size, list_sessions, list_sessions_as_of, SessionRecord};
pub use usage::{
    calculate_node_storage, calculate_node_storage_as_of, percent_used, SessionBucket,
    StorageUsage, ACTIVE_WINDOW_DAYS, ARCHIVED_SIZE_ESTIMATE_RATIO,
};
