//! Shared data structures for the production efficiency engine
//!
//! This module defines the types that flow through the core:
//! - Inputs: RawDayRecord, DowntimeReasonRecord (supplied by the data-access layer)
//! - Query: DateRange, ProductionQuery, AllocationKind
//! - Day metrics: DayMetrics, MachineDayDiagnostic (one per raw row)
//! - Fleet: MetricTotals, EfficiencyRatios, DailyAggregate, FleetSummary
//! - Downtime: AllocationMode, ReasonAllocation, ReasonHours, ReasonSummary

mod records;
mod query;
mod metrics;
mod reasons;

pub use records::*;
pub use query::*;
pub use metrics::*;
pub use reasons::*;
