//! Day-Metrics Deriver: one raw production row to a reconciled 24h budget.
//!
//! Reported hour fields are operator-entered and frequently inconsistent
//! (run + maintenance > 24, negative values, blanks). Run hours always win;
//! maintenance is trimmed to fit, and whatever remains of the day is residual
//! production downtime.

use crate::config::defaults::HOURS_PER_DAY;
use crate::mapping::MappingResolver;
use crate::types::{CapacitySource, DayMetrics, RawDayRecord};

/// Sanitized numeric inputs for one machine-day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayInput {
    pub pounds: f64,
    pub run_hours: f64,
    pub maintenance_hours: f64,
}

impl DayInput {
    /// Safe-parse a raw row: unusable numbers become 0, negative pounds become 0.
    pub fn from_record(record: &RawDayRecord) -> Self {
        Self {
            pounds: record.pounds.value().max(0.0),
            run_hours: record.machine_run_hours.value(),
            maintenance_hours: record.maintenance_downtime_hours.value(),
        }
    }
}

/// Derived metrics plus where the capacity figure came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedDay {
    pub metrics: DayMetrics,
    pub capacity_source: CapacitySource,
}

fn clamp_hours(hours: f64, max: f64) -> f64 {
    if hours.is_finite() {
        hours.clamp(0.0, max)
    } else {
        0.0
    }
}

/// Reconcile one machine-day against a known capacity (lbs/hr).
///
/// `capacity == 0` with positive run hours infers `pounds / run_hours`.
/// Total and pure: never panics for any finite or non-finite input.
pub fn compute_day_metrics(input: DayInput, capacity: f64, source: CapacitySource) -> DerivedDay {
    let pounds = if input.pounds.is_finite() { input.pounds.max(0.0) } else { 0.0 };
    let mut run_hours = clamp_hours(input.run_hours, HOURS_PER_DAY);
    let mut maintenance_hours = clamp_hours(input.maintenance_hours, HOURS_PER_DAY);

    let (capacity, capacity_source) = if capacity == 0.0 && run_hours > 0.0 {
        (pounds / run_hours, CapacitySource::Inferred)
    } else {
        (if capacity.is_finite() { capacity } else { 0.0 }, source)
    };

    // Run hours take priority; maintenance gets what is left
    run_hours = clamp_hours(run_hours, HOURS_PER_DAY);
    maintenance_hours = clamp_hours(maintenance_hours, HOURS_PER_DAY - run_hours);
    let production_downtime_hours =
        clamp_hours(HOURS_PER_DAY - maintenance_hours - run_hours, HOURS_PER_DAY);

    let run_capacity_lbs = capacity * run_hours;

    DerivedDay {
        metrics: DayMetrics {
            pounds,
            run_hours_used: run_hours,
            maintenance_hours_used: maintenance_hours,
            production_downtime_hours_used: production_downtime_hours,
            capacity_lbs_per_hr: capacity,
            raw_capacity_lbs: capacity * HOURS_PER_DAY,
            adjusted_capacity_lbs: capacity * (HOURS_PER_DAY - maintenance_hours),
            run_capacity_lbs,
            under_performance_lbs: (run_capacity_lbs - pounds).max(0.0),
            missed_maintenance_lbs: capacity * maintenance_hours,
            missed_production_lbs: capacity * production_downtime_hours,
        },
        capacity_source,
    }
}

/// Resolve capacity for the row's line/material and derive its metrics.
pub fn derive_day(record: &RawDayRecord, resolver: &MappingResolver<'_>) -> DerivedDay {
    let (capacity, source) = resolver.resolve_capacity(&record.machine, record.material.as_deref());
    compute_day_metrics(DayInput::from_record(record), capacity, source)
}

/// Derived metrics for one raw row.
pub fn derive_day_metrics(record: &RawDayRecord, resolver: &MappingResolver<'_>) -> DayMetrics {
    derive_day(record, resolver).metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::HOURS_EPSILON;

    fn input(pounds: f64, run_hours: f64, maintenance_hours: f64) -> DayInput {
        DayInput { pounds, run_hours, maintenance_hours }
    }

    fn assert_budget(m: &DayMetrics) {
        assert!(
            (m.budget_hours() - HOURS_PER_DAY).abs() < HOURS_EPSILON,
            "24h identity broken: {m:?}"
        );
    }

    #[test]
    fn test_nominal_day() {
        let d = compute_day_metrics(input(1000.0, 20.0, 2.0), 60.0, CapacitySource::Line);
        let m = d.metrics;
        assert_eq!(m.production_downtime_hours_used, 2.0);
        assert_eq!(m.raw_capacity_lbs, 1440.0);
        assert_eq!(m.adjusted_capacity_lbs, 1320.0);
        assert_eq!(m.run_capacity_lbs, 1200.0);
        assert_eq!(m.under_performance_lbs, 200.0);
        assert_eq!(m.missed_maintenance_lbs, 120.0);
        assert_eq!(m.missed_production_lbs, 120.0);
        assert_eq!(d.capacity_source, CapacitySource::Line);
        assert_budget(&m);
    }

    #[test]
    fn test_capacity_inferred_when_unknown() {
        let d = compute_day_metrics(input(500.0, 10.0, 0.0), 0.0, CapacitySource::Unknown);
        assert_eq!(d.metrics.capacity_lbs_per_hr, 50.0);
        assert_eq!(d.metrics.run_capacity_lbs, 500.0);
        assert_eq!(d.metrics.under_performance_lbs, 0.0);
        assert_eq!(d.capacity_source, CapacitySource::Inferred);
    }

    #[test]
    fn test_no_inference_without_run_hours() {
        let d = compute_day_metrics(input(500.0, 0.0, 3.0), 0.0, CapacitySource::Unknown);
        assert_eq!(d.metrics.capacity_lbs_per_hr, 0.0);
        assert_eq!(d.capacity_source, CapacitySource::Unknown);
        assert_eq!(d.metrics.production_downtime_hours_used, 21.0);
        assert_budget(&d.metrics);
    }

    #[test]
    fn test_run_hours_win_over_maintenance() {
        let m = compute_day_metrics(input(0.0, 30.0, 5.0), 60.0, CapacitySource::Line).metrics;
        assert_eq!(m.run_hours_used, 24.0);
        assert_eq!(m.maintenance_hours_used, 0.0);
        assert_eq!(m.production_downtime_hours_used, 0.0);
        assert_budget(&m);
    }

    #[test]
    fn test_maintenance_trimmed_to_fit() {
        let m = compute_day_metrics(input(0.0, 18.0, 10.0), 60.0, CapacitySource::Line).metrics;
        assert_eq!(m.maintenance_hours_used, 6.0);
        assert_eq!(m.production_downtime_hours_used, 0.0);
    }

    #[test]
    fn test_negative_and_nonfinite_inputs() {
        let m = compute_day_metrics(input(f64::NAN, -4.0, f64::INFINITY), 60.0, CapacitySource::Line).metrics;
        assert_eq!(m.pounds, 0.0);
        assert_eq!(m.run_hours_used, 0.0);
        assert_eq!(m.maintenance_hours_used, 0.0);
        assert_eq!(m.production_downtime_hours_used, 24.0);
        assert_budget(&m);
    }

    #[test]
    fn test_identity_holds_over_grid() {
        let values = [-3.0, 0.0, 0.5, 7.25, 12.0, 23.9, 24.0, 31.0];
        for run in values {
            for maint in values {
                let m = compute_day_metrics(input(100.0, run, maint), 0.0, CapacitySource::Unknown).metrics;
                assert_budget(&m);
                assert!(m.production_downtime_hours_used >= 0.0);
            }
        }
    }
}
