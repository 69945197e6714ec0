//! Session lifecycle states and the retention floor.
//!
//! `Active -> Archivable (age > archive_after_days) -> Deletable (age >
//! retention_days and outside the floor)`. The floor: with sessions sorted
//! oldest first, only the first `total - keep_min_sessions` are ever
//! eligible for removal.

use serde::{Deserialize, Serialize};

use crate::config::SessionRetention;
use crate::storage::SessionRecord;

/// Lifecycle state of one session under a given policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Archivable,
    Deletable,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Archivable => write!(f, "archivable"),
            Self::Deletable => write!(f, "deletable"),
        }
    }
}

/// Number of oldest sessions that may be removed while keeping the floor.
pub fn removable_prefix_len(total: usize, keep_min_sessions: usize) -> usize {
    total.saturating_sub(keep_min_sessions)
}

/// Sessions older than `older_than_days`, restricted to the removable
/// prefix. `sessions` must be sorted oldest first.
pub fn plan_cleanup(
    sessions: &[SessionRecord],
    older_than_days: u32,
    keep_min_sessions: usize,
) -> Vec<&SessionRecord> {
    let prefix = removable_prefix_len(sessions.len(), keep_min_sessions);
    sessions[..prefix]
        .iter()
        .filter(|s| s.age_days > i64::from(older_than_days))
        .collect()
}

/// State of every session, in input order. `sessions` must be sorted oldest first.
pub fn classify<'a>(
    sessions: &'a [SessionRecord],
    policy: &SessionRetention,
) -> Vec<(&'a SessionRecord, SessionState)> {
    let prefix = removable_prefix_len(sessions.len(), policy.keep_min_sessions);
    sessions
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let state = if i < prefix && s.age_days > i64::from(policy.retention_days) {
                SessionState::Deletable
            } else if s.age_days > i64::from(policy.archive_after_days) {
                SessionState::Archivable
            } else {
                SessionState::Active
            };
            (s, state)
        })
        .collect()
}
