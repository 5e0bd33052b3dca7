//! Config validation: unknown-key detection with Levenshtein suggestions
//! and value checks on a parsed mapping.
//!
//! Two-pass parse approach: first parse the raw file into a generic value,
//! collect its top-level keys, compare against the known field names, and emit
//! warnings with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing mapping files.

use std::collections::{BTreeSet, HashSet};

use super::defaults::MAX_SUGGESTION_DISTANCE;
use super::mapping_config::{CapacityMappingConfig, ConfigFormat};

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, ", did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid top-level keys for `CapacityMappingConfig`.
///
/// Maintained manually to match the struct in mapping_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    [
        "capacityByLine",
        "capacityByLineMaterial",
        "lineAliases",
        "materialAliases",
        "downtimeReasonAliases",
        "downtimeReasonAliasRegex",
        "downtimeReasonKeywords",
        "downtimeReasonAllocationMode",
        "downtimeReasonBuckets",
        "quality",
    ]
    .into_iter()
    .collect()
}

/// Collect the top-level keys of a raw mapping file. Parse errors yield no keys;
/// they are reported by serde afterwards.
pub fn top_level_keys(contents: &str, format: ConfigFormat) -> Vec<String> {
    match format {
        ConfigFormat::Json => serde_json::from_str::<serde_json::Value>(contents)
            .ok()
            .and_then(|v| v.as_object().map(|o| o.keys().cloned().collect()))
            .unwrap_or_default(),
        ConfigFormat::Toml => contents
            .parse::<toml::Table>()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default(),
    }
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
///
/// Ties resolve to the alphabetically first key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut candidates: Vec<&str> = known.iter().copied().collect();
    candidates.sort_unstable();
    candidates
        .into_iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, dist)| *dist <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(_, dist)| *dist)
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Return warnings for any unknown top-level keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(keys: &[String]) -> Vec<ValidationWarning> {
    let known = known_config_keys();
    keys.iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            field: key.clone(),
            message: format!("Unknown mapping key '{key}'"),
            suggestion: suggest_correction(key, &known),
        })
        .collect()
}

// ============================================================================
// Value Validation
// ============================================================================

/// Validate a parsed mapping.
///
/// Returns (errors, warnings): errors are impossible values that must prevent
/// the snapshot from going live; warnings are suspicious but not fatal.
pub fn validate_mapping(config: &CapacityMappingConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for (line, cap) in &config.capacity_by_line {
        check_capacity(&format!("capacityByLine.{line}"), *cap, &mut errors);
    }
    for (line, materials) in &config.capacity_by_line_material {
        for (material, cap) in materials {
            check_capacity(&format!("capacityByLineMaterial.{line}.{material}"), *cap, &mut errors);
        }
    }

    if !config.quality.is_finite() || !(0.0..=1.0).contains(&config.quality) {
        errors.push(format!("quality = {} must lie in [0, 1]", config.quality));
    }

    for (i, rule) in config.downtime_reason_alias_regex.iter().enumerate() {
        if let Err(e) = rule.compile() {
            errors.push(format!(
                "downtimeReasonAliasRegex[{i}] pattern '{}' does not compile: {e}",
                rule.pattern
            ));
        }
    }

    // Alias targets should name a line that has a capacity entry
    let known_lines: BTreeSet<&str> = config
        .capacity_by_line
        .keys()
        .chain(config.capacity_by_line_material.keys())
        .map(String::as_str)
        .collect();
    if !known_lines.is_empty() {
        for (raw, target) in &config.line_aliases {
            if !known_lines.contains(target.as_str()) {
                warnings.push(ValidationWarning {
                    field: format!("lineAliases.{raw}"),
                    message: format!(
                        "line alias '{raw}' -> '{target}' targets a line with no capacity entry"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    for bucket in &config.downtime_reason_keywords {
        let usable = bucket
            .keywords
            .iter()
            .any(|k| !crate::downtime::normalize_reason(k).is_empty());
        if !usable {
            warnings.push(ValidationWarning {
                field: format!("downtimeReasonKeywords.{}", bucket.bucket),
                message: format!("keyword bucket '{}' has no usable keywords", bucket.bucket),
                suggestion: None,
            });
        }
    }

    (errors, warnings)
}

fn check_capacity(field: &str, cap: f64, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, catch them explicitly
    if !cap.is_finite() {
        errors.push(format!("{field}: capacity must be finite (got {cap})"));
    } else if cap < 0.0 {
        errors.push(format!("{field}: capacity {cap:.3} cannot be negative"));
    }
}

// ============================================================================
// Tests
// ============================================================================
