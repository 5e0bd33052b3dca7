//! Residual downtime allocation across recorded reasons.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::resolver::ReasonResolver;
use crate::config::defaults::OTHER_BUCKET;
use crate::config::CapacityMappingConfig;
use crate::mapping::MappingResolver;
use crate::production::derive_day_metrics;
use crate::types::{
    is_weekend, AllocationKind, AllocationMode, DowntimeReasonRecord, ProductionQuery,
    RawDayRecord, ReasonAllocation, ReasonHours, ReasonSummary,
};

/// Occurrences of each canonical bucket on one machine-day.
pub type ReasonCounts = BTreeMap<String, usize>;

/// Machine-day key: (date, canonical line).
pub type MachineDay = (NaiveDate, String);

/// Build the per machine-day multiset of canonical reasons. Rows are never
/// deduplicated: the same text twice counts twice.
pub fn reason_counts(
    reasons: &[DowntimeReasonRecord],
    resolver: &ReasonResolver,
    lines: &MappingResolver<'_>,
) -> BTreeMap<MachineDay, ReasonCounts> {
    let mut counts: BTreeMap<MachineDay, ReasonCounts> = BTreeMap::new();
    for row in reasons {
        let key = (row.date, lines.canon_line(&row.machine));
        let bucket = resolver.canon_reason(&row.reason_text);
        *counts.entry(key).or_default().entry(bucket).or_insert(0) += 1;
    }
    counts
}

/// Split one machine-day's residual hours across its reason buckets.
///
/// No reasons means everything goes to `OTHER`. A residual of zero or less
/// allocates nothing.
#[allow(clippy::cast_precision_loss)]
pub fn allocate_machine_day(
    date: NaiveDate,
    line: &str,
    residual_hours: f64,
    counts: &ReasonCounts,
    mode: AllocationMode,
) -> ReasonAllocation {
    let mut hours = BTreeMap::new();

    if residual_hours > 0.0 {
        let total: usize = counts.values().sum();
        if total == 0 {
            hours.insert(OTHER_BUCKET.to_string(), residual_hours);
        } else {
            let present = counts.iter().filter(|(_, n)| **n > 0);
            match mode {
                AllocationMode::Equal => {
                    let distinct = present.clone().count() as f64;
                    for (bucket, _) in present {
                        hours.insert(bucket.clone(), residual_hours / distinct);
                    }
                }
                AllocationMode::ByCount => {
                    for (bucket, n) in present {
                        hours.insert(bucket.clone(), residual_hours * (*n as f64) / total as f64);
                    }
                }
            }
        }
    }

    ReasonAllocation {
        date,
        line: line.to_string(),
        residual_hours: residual_hours.max(0.0),
        hours,
    }
}

/// True when a row dated `date` for canonical `line` passes the query filters.
fn selected(query: &ProductionQuery, wanted: Option<&str>, date: NaiveDate, line: &str) -> bool {
    query.range.contains(date)
        && !(query.weekdays_only && is_weekend(date))
        && wanted.map_or(true, |w| w == line)
}

/// Per machine-day allocations for the query. Residuals of rows sharing a
/// machine-day (one per material) are summed before splitting.
pub fn allocate_machine_days(
    records: &[RawDayRecord],
    reasons: &[DowntimeReasonRecord],
    config: &CapacityMappingConfig,
    query: &ProductionQuery,
) -> Vec<ReasonAllocation> {
    let lines = MappingResolver::new(config);
    let wanted = query.machine.as_deref().map(|m| lines.canon_line(m));
    let wanted = wanted.as_deref();

    let mut residuals: BTreeMap<MachineDay, f64> = BTreeMap::new();
    for record in records {
        let line = lines.canon_line(&record.machine);
        if !selected(query, wanted, record.date, &line) {
            continue;
        }
        let metrics = derive_day_metrics(record, &lines);
        let residual = match query.kind {
            AllocationKind::Prod => metrics.production_downtime_hours_used,
            AllocationKind::Maint => metrics.maintenance_hours_used,
        };
        *residuals.entry((record.date, line)).or_insert(0.0) += residual;
    }

    let empty = ReasonCounts::new();
    let counts = match query.kind {
        AllocationKind::Prod => {
            let resolver = ReasonResolver::from_config(config);
            let kept: Vec<DowntimeReasonRecord> = reasons
                .iter()
                .filter(|r| selected(query, wanted, r.date, &lines.canon_line(&r.machine)))
                .cloned()
                .collect();
            reason_counts(&kept, &resolver, &lines)
        }
        // No reason capture exists for maintenance; it all lands in OTHER.
        AllocationKind::Maint => BTreeMap::new(),
    };

    residuals
        .into_iter()
        .map(|((date, line), residual)| {
            let day_counts = counts.get(&(date, line.clone())).unwrap_or(&empty);
            allocate_machine_day(date, &line, residual, day_counts, config.downtime_reason_allocation_mode)
        })
        .collect()
}

/// Range-level reason attribution, descending by hours (ties by name).
pub fn allocate_range(
    records: &[RawDayRecord],
    reasons: &[DowntimeReasonRecord],
    config: &CapacityMappingConfig,
    query: &ProductionQuery,
) -> ReasonSummary {
    let allocations = allocate_machine_days(records, reasons, config, query);

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for allocation in &allocations {
        for (bucket, hours) in &allocation.hours {
            *totals.entry(bucket.clone()).or_insert(0.0) += hours;
        }
    }

    let mut ranked: Vec<ReasonHours> = totals
        .into_iter()
        .map(|(reason, hours)| ReasonHours { reason, hours })
        .collect();
    ranked.sort_by(|a, b| b.hours.total_cmp(&a.hours).then_with(|| a.reason.cmp(&b.reason)));

    ReasonSummary {
        range: query.range,
        kind: query.kind,
        mode: config.downtime_reason_allocation_mode,
        weekdays_only: query.weekdays_only,
        machine: query.machine.clone(),
        machine_days: allocations.len(),
        total_hours: ranked.iter().map(|r| r.hours).sum(),
        reasons: ranked,
        buckets: config.downtime_reason_buckets.clone(),
    }
}
