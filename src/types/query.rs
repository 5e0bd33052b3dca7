//! Query parameters honored by the core.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Inclusive calendar-date range. Deserializing an inverted range fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRange")]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Deserialize)]
struct UncheckedRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl TryFrom<UncheckedRange> for DateRange {
    type Error = String;

    fn try_from(raw: UncheckedRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to).ok_or_else(|| format!("'from' ({}) is after 'to' ({})", raw.from, raw.to))
    }
}

impl DateRange {
    /// Build a range; `None` when `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// Single-day range.
    pub const fn day(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    /// Every date in the range, ascending.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let to = self.to;
        self.from.iter_days().take_while(move |d| *d <= to)
    }

    /// Number of calendar days covered.
    pub fn len_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Smallest range covering every date in `dates`.
    pub fn spanning(dates: impl IntoIterator<Item = NaiveDate>) -> Option<Self> {
        let mut iter = dates.into_iter();
        let first = iter.next()?;
        let (from, to) = iter.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Some(Self { from, to })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Saturday and Sunday are excluded by the weekday-only filter.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Which downtime component a reason allocation attributes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationKind {
    /// Residual production downtime, split across recorded reasons.
    #[default]
    Prod,
    /// Maintenance downtime. No reason capture exists for it, so it always lands in OTHER.
    Maint,
}

impl FromStr for AllocationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Self::Prod),
            "maint" | "maintenance" => Ok(Self::Maint),
            other => Err(format!("unknown allocation kind '{other}' (expected prod|maint)")),
        }
    }
}

impl fmt::Display for AllocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prod => write!(f, "prod"),
            Self::Maint => write!(f, "maint"),
        }
    }
}

/// Full set of options a caller may pass to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductionQuery {
    pub range: DateRange,
    /// Raw machine name; compared after line canonicalization.
    pub machine: Option<String>,
    pub weekdays_only: bool,
    pub kind: AllocationKind,
}

impl ProductionQuery {
    pub const fn new(range: DateRange) -> Self {
        Self {
            range,
            machine: None,
            weekdays_only: false,
            kind: AllocationKind::Prod,
        }
    }

    #[must_use]
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = Some(machine.into());
        self
    }

    #[must_use]
    pub const fn weekdays_only(mut self, enabled: bool) -> Self {
        self.weekdays_only = enabled;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: AllocationKind) -> Self {
        self.kind = kind;
        self
    }
}
