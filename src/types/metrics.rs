//! Derived per-machine-day metrics and fleet aggregates.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::defaults::HOURS_PER_DAY;

// ============================================================================
// Day Metrics
// ============================================================================

/// Reconciled, capacity-priced metrics for one machine-day.
///
/// Invariant: `run_hours_used + maintenance_hours_used + production_downtime_hours_used == 24`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayMetrics {
    pub pounds: f64,
    pub run_hours_used: f64,
    pub maintenance_hours_used: f64,
    pub production_downtime_hours_used: f64,
    pub capacity_lbs_per_hr: f64,
    pub raw_capacity_lbs: f64,
    pub adjusted_capacity_lbs: f64,
    pub run_capacity_lbs: f64,
    pub under_performance_lbs: f64,
    pub missed_maintenance_lbs: f64,
    pub missed_production_lbs: f64,
}

impl DayMetrics {
    /// Total hours accounted for. Always 24 for a derived record.
    pub fn budget_hours(&self) -> f64 {
        self.run_hours_used + self.maintenance_hours_used + self.production_downtime_hours_used
    }
}

/// Where a machine-day's capacity figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacitySource {
    /// `capacityByLineMaterial[line][material]`
    Material,
    /// `capacityByLineMaterial[line]["DEFAULT"]`
    LineDefault,
    /// `capacityByLine[line]`
    Line,
    /// No mapping entry; inferred as pounds / run hours.
    Inferred,
    /// No mapping entry and nothing to infer from.
    Unknown,
}

/// Audit record exposing every intermediate quantity of one derivation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MachineDayDiagnostic {
    pub date: NaiveDate,
    pub machine: String,
    pub line: String,
    pub material: Option<String>,
    pub material_canonical: String,
    pub pounds_reported: Option<f64>,
    pub run_hours_reported: Option<f64>,
    pub maintenance_hours_reported: Option<f64>,
    pub capacity_source: CapacitySource,
    #[serde(flatten)]
    pub metrics: DayMetrics,
}

// ============================================================================
// Fleet Totals
// ============================================================================

/// Summed day-metric fields across a set of machine-days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricTotals {
    pub pounds: f64,
    pub run_hours: f64,
    pub maintenance_hours: f64,
    pub production_downtime_hours: f64,
    pub raw_capacity_lbs: f64,
    pub adjusted_capacity_lbs: f64,
    pub run_capacity_lbs: f64,
    pub under_performance_lbs: f64,
    pub missed_maintenance_lbs: f64,
    pub missed_production_lbs: f64,
}

impl MetricTotals {
    pub fn add(&mut self, m: &DayMetrics) {
        self.pounds += m.pounds;
        self.run_hours += m.run_hours_used;
        self.maintenance_hours += m.maintenance_hours_used;
        self.production_downtime_hours += m.production_downtime_hours_used;
        self.raw_capacity_lbs += m.raw_capacity_lbs;
        self.adjusted_capacity_lbs += m.adjusted_capacity_lbs;
        self.run_capacity_lbs += m.run_capacity_lbs;
        self.under_performance_lbs += m.under_performance_lbs;
        self.missed_maintenance_lbs += m.missed_maintenance_lbs;
        self.missed_production_lbs += m.missed_production_lbs;
    }

    pub fn merge(&mut self, other: &Self) {
        self.pounds += other.pounds;
        self.run_hours += other.run_hours;
        self.maintenance_hours += other.maintenance_hours;
        self.production_downtime_hours += other.production_downtime_hours;
        self.raw_capacity_lbs += other.raw_capacity_lbs;
        self.adjusted_capacity_lbs += other.adjusted_capacity_lbs;
        self.run_capacity_lbs += other.run_capacity_lbs;
        self.under_performance_lbs += other.under_performance_lbs;
        self.missed_maintenance_lbs += other.missed_maintenance_lbs;
        self.missed_production_lbs += other.missed_production_lbs;
    }
}

/// Efficiency ratios derived from totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EfficiencyRatios {
    pub availability: f64,
    pub perf_raw: f64,
    pub perf_adj: f64,
    pub perf_run: f64,
    pub quality: f64,
    pub oee: f64,
}

impl EfficiencyRatios {
    /// Compute ratios; any zero denominator yields 0 for that ratio.
    ///
    /// `oee` is exactly `availability * perf_run * quality`.
    pub fn compute(totals: &MetricTotals, planned_hours: f64, quality: f64) -> Self {
        let availability = ratio(totals.run_hours, planned_hours);
        let perf_run = ratio(totals.pounds, totals.run_capacity_lbs);
        Self {
            availability,
            perf_raw: ratio(totals.pounds, totals.raw_capacity_lbs),
            perf_adj: ratio(totals.pounds, totals.adjusted_capacity_lbs),
            perf_run,
            quality,
            oee: availability * perf_run * quality,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Fleet totals and ratios for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub fleet_size: usize,
    pub machines_reporting: usize,
    pub planned_hours: f64,
    #[serde(flatten)]
    pub totals: MetricTotals,
    #[serde(flatten)]
    pub ratios: EfficiencyRatios,
}

impl DailyAggregate {
    #[allow(clippy::cast_precision_loss)]
    pub fn new(date: NaiveDate, fleet_size: usize, machines_reporting: usize, totals: MetricTotals, quality: f64) -> Self {
        let planned_hours = HOURS_PER_DAY * fleet_size as f64;
        Self {
            date,
            fleet_size,
            machines_reporting,
            planned_hours,
            totals,
            ratios: EfficiencyRatios::compute(&totals, planned_hours, quality),
        }
    }
}

/// Range-level rollup of daily aggregates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub days: usize,
    pub fleet_size: usize,
    pub planned_hours: f64,
    #[serde(flatten)]
    pub totals: MetricTotals,
    #[serde(flatten)]
    pub ratios: EfficiencyRatios,
}

impl FleetSummary {
    /// Roll up daily rows using the same ratio formulas as a single day.
    pub fn from_daily(daily: &[DailyAggregate], quality: f64) -> Self {
        let mut totals = MetricTotals::default();
        let mut planned_hours = 0.0;
        let mut fleet_size = 0;
        for day in daily {
            totals.merge(&day.totals);
            planned_hours += day.planned_hours;
            fleet_size = fleet_size.max(day.fleet_size);
        }
        Self {
            from: daily.first().map(|d| d.date),
            to: daily.last().map(|d| d.date),
            days: daily.len(),
            fleet_size,
            planned_hours,
            totals,
            ratios: EfficiencyRatios::compute(&totals, planned_hours, quality),
        }
    }
}
