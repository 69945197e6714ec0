//! Scoring and ordering of retained memories.
//!
//! A memory's ranking score is a normalized weighted sum of three signals in
//! `[0, 1]`: recency (linear decay to a floor), quality (explicit or
//! heuristic) and usage (saturating at ten uses). Every signal is
//! non-decreasing in its input, so the combined score is too.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::record::{unit, AccessTrend, MemoryQualityScore, MemoryRecord, UsageTracking};
use crate::error::{VaultError, VaultResult};

pub const RECENCY_FLOOR: f64 = 0.1;
pub const DEFAULT_MAX_AGE_DAYS: u32 = 365;
/// Uses at which the usage weight saturates.
pub const USAGE_SATURATION: u64 = 10;
pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_TOP_LIMIT: usize = 3;
/// Access timestamps kept per memory for trend detection.
pub const RECENT_ACCESS_WINDOW: usize = 20;

const TREND_WINDOW_DAYS: i64 = 7;
const SECONDS_PER_DAY: f64 = 86_400.0;
const ERROR_MARKERS: &[&str] = &["error", "failed", "exception", "panic", "traceback"];

/// Weights for combining recency, quality and usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingConfig {
    pub recency_weight: f64,
    pub quality_weight: f64,
    pub usage_weight: f64,
    pub max_age_days: u32,
}

impl Default for RankingConfig {
    /// Recency and quality balanced, usage as a secondary boost.
    fn default() -> Self {
        Self {
            recency_weight: 0.4,
            quality_weight: 0.4,
            usage_weight: 0.2,
            max_age_days: DEFAULT_MAX_AGE_DAYS,
        }
    }
}

impl RankingConfig {
    /// Validate and normalize weights so they sum to 1.
    pub fn new(recency: f64, quality: f64, usage: f64, max_age_days: u32) -> VaultResult<Self> {
        let weights = [recency, quality, usage];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(VaultError::InvalidRankingConfig(format!(
                "weights must be finite and non-negative, got {weights:?}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(VaultError::InvalidRankingConfig(
                "at least one weight must be positive".to_string(),
            ));
        }
        if max_age_days == 0 {
            return Err(VaultError::InvalidRankingConfig(
                "max_age_days must be positive".to_string(),
            ));
        }
        Ok(Self {
            recency_weight: recency / sum,
            quality_weight: quality / sum,
            usage_weight: usage / sum,
            max_age_days,
        })
    }
}

/// Recency of `timestamp` relative to now, in `[0.1, 1.0]`.
pub fn recency_score(timestamp: DateTime<Utc>, max_age_days: u32) -> f64 {
    recency_score_at(timestamp, Utc::now(), max_age_days)
}

/// `1.0` under a day old, then linear from `1.0` at day 1 to `0.1` at
/// `max_age_days`, then flat at the floor. Future timestamps count as fresh.
pub fn recency_score_at(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age_days: u32) -> f64 {
    let age_days = (now - timestamp).num_seconds() as f64 / SECONDS_PER_DAY;
    if age_days < 1.0 {
        return 1.0;
    }
    let horizon = f64::from(max_age_days);
    if horizon <= 1.0 || age_days >= horizon {
        return RECENCY_FLOOR;
    }
    let decayed = 1.0 - (1.0 - RECENCY_FLOOR) * (age_days - 1.0) / (horizon - 1.0);
    decayed.clamp(RECENCY_FLOOR, 1.0)
}

/// `min(times_used / 10, 1.0)`.
pub fn usage_weight(times_used: u64) -> f64 {
    (times_used.min(USAGE_SATURATION) as f64) / USAGE_SATURATION as f64
}

/// Explicit `quality.overall`, or the heuristic estimate when unscored.
pub fn effective_quality(record: &MemoryRecord) -> f64 {
    match &record.quality {
        Some(q) => unit(q.overall),
        None => auto_quality_score(record).overall,
    }
}

pub fn ranking_score(record: &MemoryRecord, config: &RankingConfig) -> f64 {
    ranking_score_at(record, config, Utc::now())
}

pub fn ranking_score_at(record: &MemoryRecord, config: &RankingConfig, now: DateTime<Utc>) -> f64 {
    let recency = recency_score_at(record.created_at, now, config.max_age_days);
    let quality = effective_quality(record);
    let usage = usage_weight(record.times_used());
    let total = config.recency_weight + config.quality_weight + config.usage_weight;
    if total <= 0.0 {
        return 0.0;
    }
    unit(
        (config.recency_weight * recency + config.quality_weight * quality + config.usage_weight * usage)
            / total,
    )
}

/// Deterministic quality estimate for a record nobody has scored.
pub fn auto_quality_score(record: &MemoryRecord) -> MemoryQualityScore {
    let words = record.content.split_whitespace().count();
    let mut completeness = (words as f64 / 150.0).min(1.0) * 0.8;
    if !record.summary.trim().is_empty() {
        completeness += 0.2;
    }

    let haystack = format!(
        "{} {} {}",
        record.summary,
        record.content,
        record.tags.join(" ")
    )
    .to_lowercase();

    let relevance = match record.command.as_deref() {
        Some(command) => {
            let terms = terms(command);
            if terms.is_empty() {
                0.5
            } else {
                let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                0.3 + 0.7 * hits as f64 / terms.len() as f64
            }
        }
        None => 0.5,
    };

    let markers = ERROR_MARKERS.iter().filter(|m| haystack.contains(*m)).count();
    let accuracy = (1.0 - 0.15 * markers as f64).max(0.2);

    let overall = 0.4 * relevance + 0.3 * completeness + 0.3 * accuracy;
    MemoryQualityScore::new(overall, relevance, completeness, accuracy)
}

fn terms(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(|w| w.to_lowercase())
        .collect()
}

/// Record one more use of a memory as of now.
pub fn update_usage_tracking(existing: Option<&UsageTracking>) -> UsageTracking {
    update_usage_tracking_at(existing, Utc::now())
}

pub fn update_usage_tracking_at(existing: Option<&UsageTracking>, now: DateTime<Utc>) -> UsageTracking {
    let (times_used, mut recent) = match existing {
        Some(u) => (u.times_used.saturating_add(1), u.recent_access.clone()),
        None => (1, Vec::new()),
    };
    recent.push(now);
    if recent.len() > RECENT_ACCESS_WINDOW {
        let excess = recent.len() - RECENT_ACCESS_WINDOW;
        recent.drain(..excess);
    }
    UsageTracking {
        times_used,
        last_used: now,
        access_trend: access_trend(&recent, now),
        recent_access: recent,
    }
}

/// Compare accesses in the last week with the week before it.
fn access_trend(recent: &[DateTime<Utc>], now: DateTime<Utc>) -> AccessTrend {
    let week = Duration::days(TREND_WINDOW_DAYS);
    let this_week = recent.iter().filter(|t| now - **t < week).count();
    let last_week = recent
        .iter()
        .filter(|t| {
            let age = now - **t;
            age >= week && age < week * 2
        })
        .count();
    if this_week > last_week && this_week >= 2 {
        AccessTrend::Increasing
    } else if this_week < last_week {
        AccessTrend::Decreasing
    } else {
        AccessTrend::Stable
    }
}

/// Stable sort by ranking score, highest first.
pub fn rank_memories(records: Vec<MemoryRecord>, config: &RankingConfig) -> Vec<MemoryRecord> {
    rank_memories_at(records, config, Utc::now())
}

pub fn rank_memories_at(
    records: Vec<MemoryRecord>,
    config: &RankingConfig,
    now: DateTime<Utc>,
) -> Vec<MemoryRecord> {
    let mut scored: Vec<(f64, MemoryRecord)> = records
        .into_iter()
        .map(|r| (ranking_score_at(&r, config, now), r))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, r)| r).collect()
}

/// Keep unscored records and those with `quality.overall >= min_threshold`.
pub fn filter_by_quality(records: Vec<MemoryRecord>, min_threshold: f64) -> Vec<MemoryRecord> {
    records
        .into_iter()
        .filter(|r| r.quality.map_or(true, |q| q.overall >= min_threshold))
        .collect()
}

/// Filter by the default quality threshold, rank, and keep the first `limit`.
pub fn load_top_memories(
    records: Vec<MemoryRecord>,
    limit: usize,
    config: &RankingConfig,
) -> Vec<MemoryRecord> {
    load_top_memories_at(records, limit, config, Utc::now())
}

pub fn load_top_memories_at(
    records: Vec<MemoryRecord>,
    limit: usize,
    config: &RankingConfig,
    now: DateTime<Utc>,
) -> Vec<MemoryRecord> {
    let mut ranked = rank_memories_at(
        filter_by_quality(records, DEFAULT_QUALITY_THRESHOLD),
        config,
        now,
    );
    ranked.truncate(limit);
    ranked
}
