//! Per-row audit records: reported inputs next to every derived quantity.

use super::day_metrics::{compute_day_metrics, DayInput};
use crate::config::CapacityMappingConfig;
use crate::mapping::MappingResolver;
use crate::types::{MachineDayDiagnostic, RawDayRecord};

/// One diagnostic per input row, ordered by date then machine.
///
/// `machine_filter` is canonicalized the same way as the rows, so an alias
/// and its canonical name select the same machine.
pub fn machine_day_diagnostics(
    records: &[RawDayRecord],
    config: &CapacityMappingConfig,
    machine_filter: Option<&str>,
) -> Vec<MachineDayDiagnostic> {
    let resolver = MappingResolver::new(config);
    let wanted = machine_filter.map(|m| resolver.canon_line(m));

    let mut out: Vec<MachineDayDiagnostic> = records
        .iter()
        .filter_map(|record| {
            let line = resolver.canon_line(&record.machine);
            if wanted.as_ref().is_some_and(|w| *w != line) {
                return None;
            }
            let material_canonical = resolver.canon_material(record.material.as_deref());
            let (capacity, source) = resolver.lookup(&line, &material_canonical);
            let derived = compute_day_metrics(DayInput::from_record(record), capacity, source);

            Some(MachineDayDiagnostic {
                date: record.date,
                machine: record.machine.clone(),
                line,
                material: record.material.clone(),
                material_canonical,
                pounds_reported: record.pounds.raw(),
                run_hours_reported: record.machine_run_hours.raw(),
                maintenance_hours_reported: record.maintenance_downtime_hours.raw(),
                capacity_source: derived.capacity_source,
                metrics: derived.metrics,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.machine.cmp(&b.machine))
            .then_with(|| a.material_canonical.cmp(&b.material_canonical))
    });
    out
}
