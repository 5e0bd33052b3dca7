//! Production Metrics Module
//!
//! Deterministic efficiency calculations over daily machine records.
//! Every function here is pure: no I/O, no shared state, no errors.
//!
//! - `derive_day_metrics()` - reconcile one row into the 24h budget and price it at capacity
//! - `aggregate_by_date()` - fleet totals, availability, performance and OEE per date
//! - `machine_day_diagnostics()` - audit view of every intermediate quantity

pub mod day_metrics;
pub mod diagnostics;
pub mod fleet;

pub use day_metrics::{compute_day_metrics, derive_day, derive_day_metrics, DayInput, DerivedDay};
pub use diagnostics::machine_day_diagnostics;
pub use fleet::{aggregate_by_date, fleet_members};
