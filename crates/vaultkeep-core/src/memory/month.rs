//! Month keys (`YYYY-MM`) and date-string resolution for restore requests.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{VaultError, VaultResult};

/// Calendar month identifying one archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> VaultResult<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(VaultError::InvalidMonthKey {
                input: format!("{year:04}-{month:02}"),
            });
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn month_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("static pattern"))
}

fn day_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("static pattern"))
}

impl FromStr for MonthKey {
    type Err = VaultError;

    /// Strict `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VaultError::InvalidMonthKey {
            input: s.to_string(),
        };
        let caps = month_pattern().captures(s.trim()).ok_or_else(invalid)?;
        let year = caps[1].parse().map_err(|_| invalid())?;
        let month = caps[2].parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

const NATURAL_FORMATS: &[&str] = &[
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const MONTH_ONLY_FORMATS: &[&str] = &["%B %Y", "%b %Y"];

/// Resolve a restore date to its month.
///
/// Accepts `YYYY-MM`, `YYYY-MM-DD` and common calendar spellings; anything
/// else is rejected with the offending string.
pub fn parse_restore_month(input: &str) -> VaultResult<MonthKey> {
    parse_restore_month_as_of(input, Local::now().date_naive())
}

pub fn parse_restore_month_as_of(input: &str, today: NaiveDate) -> VaultResult<MonthKey> {
    let invalid = || VaultError::InvalidDate {
        input: input.to_string(),
    };
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    if month_pattern().is_match(s) {
        return s.parse::<MonthKey>().map_err(|_| invalid());
    }
    if day_pattern().is_match(s) {
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid())?;
        return Ok(MonthKey::from_date(date));
    }

    match s.to_lowercase().as_str() {
        "today" => return Ok(MonthKey::from_date(today)),
        "yesterday" => return Ok(MonthKey::from_date(today - Duration::days(1))),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(MonthKey::from_date(dt.date_naive()));
    }
    for fmt in NATURAL_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(MonthKey::from_date(date));
        }
    }
    for fmt in MONTH_ONLY_FORMATS {
        // chrono needs a day to build a date; pin the first of the month.
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {s}"), &format!("%d {fmt}")) {
            return Ok(MonthKey::from_date(date));
        }
    }
    Err(invalid())
}
