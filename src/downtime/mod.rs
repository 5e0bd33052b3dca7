//! Downtime-Reason Allocator
//!
//! Turns free-text downtime reasons into canonical buckets and splits each
//! machine-day's unexplained downtime across them.
//!
//! - `normalize_reason()` - uppercase, fold diacritics, collapse punctuation
//! - `ReasonResolver` - ordered strategy list, first match wins
//! - `allocate_range()` - range totals per bucket, `equal` or `by_count`

pub mod allocation;
pub mod normalize;
pub mod resolver;

pub use allocation::{
    allocate_machine_day, allocate_machine_days, allocate_range, reason_counts, MachineDay,
    ReasonCounts,
};
pub use normalize::normalize_reason;
pub use resolver::{ReasonMatch, ReasonResolver, ReasonStrategy, StrategyKind};
