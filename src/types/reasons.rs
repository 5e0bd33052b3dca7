//! Downtime-reason allocation types.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::{AllocationKind, DateRange};

/// Policy for splitting a machine-day's residual downtime across its reasons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    /// Even split across the distinct buckets present.
    #[default]
    Equal,
    /// Proportional to each bucket's occurrence count.
    ByCount,
}

impl AllocationMode {
    /// Lenient parse: anything that is not a by-count spelling means `Equal`.
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "by_count" | "bycount" | "count" => Self::ByCount,
            _ => Self::Equal,
        }
    }
}

impl<'de> Deserialize<'de> for AllocationMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(text.as_deref().map_or(Self::Equal, Self::parse_lenient))
    }
}

/// Hours attributed to each canonical bucket for one machine-day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonAllocation {
    pub date: NaiveDate,
    pub line: String,
    pub residual_hours: f64,
    pub hours: BTreeMap<String, f64>,
}

impl ReasonAllocation {
    pub fn allocated_hours(&self) -> f64 {
        self.hours.values().sum()
    }
}

/// One row of the range summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonHours {
    pub reason: String,
    pub hours: f64,
}

/// Range-level reason attribution, descending by hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasonSummary {
    pub range: DateRange,
    pub kind: AllocationKind,
    pub mode: AllocationMode,
    pub weekdays_only: bool,
    pub machine: Option<String>,
    pub machine_days: usize,
    pub total_hours: f64,
    pub reasons: Vec<ReasonHours>,
    /// Display metadata from the mapping config, passed through untouched.
    pub buckets: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_mode_lenient() {
        assert_eq!(AllocationMode::parse_lenient("by_count"), AllocationMode::ByCount);
        assert_eq!(AllocationMode::parse_lenient("By-Count"), AllocationMode::ByCount);
        assert_eq!(AllocationMode::parse_lenient("equal"), AllocationMode::Equal);
        assert_eq!(AllocationMode::parse_lenient("weighted"), AllocationMode::Equal);
    }

    #[test]
    fn test_allocation_mode_deserialize() {
        let m: AllocationMode = serde_json::from_str("\"by_count\"").unwrap();
        assert_eq!(m, AllocationMode::ByCount);
        let m: AllocationMode = serde_json::from_str("null").unwrap();
        assert_eq!(m, AllocationMode::Equal);
        assert_eq!(serde_json::to_string(&AllocationMode::ByCount).unwrap(), "\"by_count\"");
    }
}
