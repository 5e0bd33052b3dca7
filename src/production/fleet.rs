//! Fleet Aggregator: per-date totals and efficiency ratios.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::day_metrics::derive_day_metrics;
use crate::config::CapacityMappingConfig;
use crate::mapping::MappingResolver;
use crate::types::{DailyAggregate, MetricTotals, RawDayRecord};

/// Lines counted in the planned-hours denominator.
///
/// Every line seen in `records` plus every line the capacity tables know,
/// so a configured machine that reported nothing still counts as planned time.
pub fn fleet_members(records: &[RawDayRecord], resolver: &MappingResolver<'_>) -> BTreeSet<String> {
    let mut fleet = resolver.known_lines();
    fleet.extend(records.iter().map(|r| resolver.canon_line(&r.machine)));
    fleet
}

/// One aggregate per distinct date in `records`, ascending.
pub fn aggregate_by_date(records: &[RawDayRecord], config: &CapacityMappingConfig) -> Vec<DailyAggregate> {
    let resolver = MappingResolver::new(config);
    let fleet_size = fleet_members(records, &resolver).len();

    let mut by_date: BTreeMap<NaiveDate, (MetricTotals, BTreeSet<String>)> = BTreeMap::new();
    for record in records {
        let metrics = derive_day_metrics(record, &resolver);
        let (totals, reporting) = by_date.entry(record.date).or_default();
        totals.add(&metrics);
        reporting.insert(resolver.canon_line(&record.machine));
    }

    by_date
        .into_iter()
        .map(|(date, (totals, reporting))| {
            DailyAggregate::new(date, fleet_size, reporting.len(), totals, config.quality)
        })
        .collect()
}
