//! Mapping Resolver - canonical line/material names and rated capacity
//!
//! Operators type machine and material names by hand, so every lookup into
//! the capacity tables goes through this resolver first.
//!
//! ## Capacity resolution order
//!
//! 1. `capacityByLineMaterial[line][material]`
//! 2. `capacityByLineMaterial[line]["DEFAULT"]`
//! 3. `capacityByLine[line]`
//! 4. `0` (capacity unknown, not an error)

use std::collections::BTreeSet;

use crate::config::defaults::DEFAULT_MATERIAL;
use crate::config::CapacityMappingConfig;
use crate::types::CapacitySource;

/// Borrowing view over one mapping snapshot.
#[derive(Debug, Clone, Copy)]
pub struct MappingResolver<'a> {
    config: &'a CapacityMappingConfig,
}

impl<'a> MappingResolver<'a> {
    pub const fn new(config: &'a CapacityMappingConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &'a CapacityMappingConfig {
        self.config
    }

    /// Canonical line name for a raw machine name.
    ///
    /// Matching is exact after trimming. Case is NOT folded: `ex-1` and `EX-1`
    /// are different lines unless an alias says otherwise.
    pub fn canon_line(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.config.capacity_by_line.contains_key(trimmed)
            || self.config.capacity_by_line_material.contains_key(trimmed)
        {
            return trimmed.to_string();
        }
        self.config
            .line_aliases
            .get(trimmed)
            .or_else(|| self.config.line_aliases.get(raw))
            .map_or_else(|| trimmed.to_string(), Clone::clone)
    }

    /// Canonical material name. Missing or blank material maps to `DEFAULT`.
    pub fn canon_material(&self, raw: Option<&str>) -> String {
        let upper = raw.unwrap_or_default().trim().to_uppercase();
        if upper.is_empty() {
            return DEFAULT_MATERIAL.to_string();
        }
        self.config
            .material_aliases
            .get(&upper)
            .cloned()
            .unwrap_or(upper)
    }

    /// Rated capacity in lbs/hr, `0.0` when nothing resolves.
    pub fn capacity_for(&self, line: &str, material: Option<&str>) -> f64 {
        self.resolve_capacity(line, material).0
    }

    /// Rated capacity plus the table entry it came from.
    pub fn resolve_capacity(&self, line: &str, material: Option<&str>) -> (f64, CapacitySource) {
        let line = self.canon_line(line);
        let material = self.canon_material(material);
        self.lookup(&line, &material)
    }

    /// Capacity lookup on names that are already canonical.
    pub(crate) fn lookup(&self, line: &str, material: &str) -> (f64, CapacitySource) {
        if let Some(per_material) = self.config.capacity_by_line_material.get(line) {
            if let Some(cap) = per_material.get(material) {
                return (*cap, CapacitySource::Material);
            }
            if let Some(cap) = per_material.get(DEFAULT_MATERIAL) {
                return (*cap, CapacitySource::LineDefault);
            }
        }
        self.config
            .capacity_by_line
            .get(line)
            .map_or((0.0, CapacitySource::Unknown), |cap| (*cap, CapacitySource::Line))
    }

    /// Every line named by either capacity table.
    pub fn known_lines(&self) -> BTreeSet<String> {
        self.config
            .capacity_by_line
            .keys()
            .chain(self.config.capacity_by_line_material.keys())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> CapacityMappingConfig {
        let mut config = CapacityMappingConfig::default();
        config.capacity_by_line.insert("EX-1".into(), 60.0);
        config.capacity_by_line.insert("EX-3".into(), 55.0);
        config
            .capacity_by_line_material
            .entry("EX-3".into())
            .or_default()
            .extend([("PP".to_string(), 80.0), ("DEFAULT".to_string(), 70.0)]);
        config
            .capacity_by_line_material
            .entry("EX-4".into())
            .or_default()
            .insert("PE".into(), 90.0);
        config.line_aliases.insert("Extruder 1".into(), "EX-1".into());
        config.material_aliases.insert("POLYPROP".into(), "PP".into());
        config
    }

    #[test]
    fn test_canon_line_known_key_unchanged() {
        let config = sample_config();
        let resolver = MappingResolver::new(&config);
        assert_eq!(resolver.canon_line("  EX-1 "), "EX-1");
        assert_eq!(resolver.canon_line("EX-4"), "EX-4");
    }

    #[test]
    fn test_canon_line_alias_and_passthrough() {
        let config = sample_config();
        let resolver = MappingResolver::new(&config);
        assert_eq!(resolver.canon_line("Extruder 1"), "EX-1");
        assert_eq!(resolver.canon_line("Mystery Line"), "Mystery Line");
    }

    #[test]
    fn test_canon_line_is_case_sensitive() {
        let config = sample_config();
        let resolver = MappingResolver::new(&config);
        assert_eq!(resolver.canon_line("ex-1"), "ex-1");
        assert_eq!(resolver.canon_line("extruder 1"), "extruder 1");
    }

    #[test]
    fn test_canon_material() {
        let config = sample_config();
        let resolver = MappingResolver::new(&config);
        assert_eq!(resolver.canon_material(None), "DEFAULT");
        assert_eq!(resolver.canon_material(Some("   ")), "DEFAULT");
        assert_eq!(resolver.canon_material(Some(" polyprop ")), "PP");
        assert_eq!(resolver.canon_material(Some("hdpe")), "HDPE");
    }

    #[test]
    fn test_capacity_resolution_order() {
        let config = sample_config();
        let resolver = MappingResolver::new(&config);
        assert_eq!(resolver.resolve_capacity("EX-3", Some("polyprop")), (80.0, CapacitySource::Material));
        assert_eq!(resolver.resolve_capacity("EX-3", Some("HDPE")), (70.0, CapacitySource::LineDefault));
        assert_eq!(resolver.resolve_capacity("Extruder 1", Some("PP")), (60.0, CapacitySource::Line));
        assert_eq!(resolver.resolve_capacity("EX-4", Some("PP")), (0.0, CapacitySource::Unknown));
        assert_eq!(resolver.capacity_for("Nowhere", None), 0.0);
    }

    #[test]
    fn test_known_lines_union() {
        let config = sample_config();
        let lines: Vec<String> = MappingResolver::new(&config).known_lines().into_iter().collect();
        assert_eq!(lines, vec!["EX-1", "EX-3", "EX-4"]);
    }
}
