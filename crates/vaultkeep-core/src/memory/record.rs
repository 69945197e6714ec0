//! Rankable memory records with optional quality and usage annotations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Quality sub-scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryQualityScore {
    pub overall: f64,
    pub relevance_to_command: f64,
    pub completeness: f64,
    pub accuracy: f64,
}

impl MemoryQualityScore {
    /// Build a score, clamping every component into `[0, 1]`. NaN becomes 0.
    pub fn new(overall: f64, relevance_to_command: f64, completeness: f64, accuracy: f64) -> Self {
        Self {
            overall: unit(overall),
            relevance_to_command: unit(relevance_to_command),
            completeness: unit(completeness),
            accuracy: unit(accuracy),
        }
    }

    /// Score with every component equal to `overall`.
    pub fn uniform(overall: f64) -> Self {
        Self::new(overall, overall, overall, overall)
    }
}

pub(crate) fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Direction of recent access frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTrend {
    #[default]
    Stable,
    Increasing,
    Decreasing,
}

/// How often a memory has been surfaced. `times_used` never decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTracking {
    pub times_used: u64,
    pub last_used: DateTime<Utc>,
    pub access_trend: AccessTrend,
    /// Most recent access timestamps, oldest first, bounded.
    #[serde(default)]
    pub recent_access: Vec<DateTime<Utc>>,
}

/// A memory as seen by the ranker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<MemoryQualityScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageTracking>,
}

impl MemoryRecord {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            command: None,
            summary: String::new(),
            content: String::new(),
            tags: Vec::new(),
            created_at,
            quality: None,
            usage: None,
        }
    }

    pub fn with_command(mut self, command: &str) -> Self {
        self.command = Some(command.to_string());
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = summary.to_string();
        self
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_quality(mut self, quality: MemoryQualityScore) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_usage(mut self, usage: UsageTracking) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn times_used(&self) -> u64 {
        self.usage.as_ref().map_or(0, |u| u.times_used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_clamped() {
        let q = MemoryQualityScore::new(1.5, -0.2, f64::NAN, 0.7);
        assert_eq!(q.overall, 1.0);
        assert_eq!(q.relevance_to_command, 0.0);
        assert_eq!(q.completeness, 0.0);
        assert_eq!(q.accuracy, 0.7);
    }

    #[test]
    fn test_usage_defaults_recent_access() {
        let json = r#"{"timesUsed":3,"lastUsed":"2025-01-02T00:00:00Z","accessTrend":"increasing"}"#;
        let u: UsageTracking = serde_json::from_str(json).unwrap();
        assert_eq!(u.times_used, 3);
        assert_eq!(u.access_trend, AccessTrend::Increasing);
        assert!(u.recent_access.is_empty());
    }

    #[test]
    fn test_times_used_absent_is_zero() {
        assert_eq!(MemoryRecord::new("m", Utc::now()).times_used(), 0);
    }
}
