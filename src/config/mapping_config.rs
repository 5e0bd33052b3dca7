//! Capacity Mapping Configuration - rated capacities, aliases and downtime-reason rules
//!
//! One immutable snapshot of this struct drives every computation. It is read
//! from a JSON or TOML file whose keys use the camelCase layout operators
//! already maintain (`capacityByLine`, `lineAliases`, ...). Every table is
//! optional; an empty config is valid and simply resolves every capacity to 0.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults::{
    DEFAULT_QUALITY, LOCAL_MAPPING_FILES, MAPPING_ENV_VAR, QUALITY_ENV_VAR,
};
use crate::types::AllocationMode;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root mapping configuration.
///
/// Load with `CapacityMappingConfig::load()` which searches:
/// 1. `$LINEWATCH_MAPPING` env var
/// 2. `./capacity_mapping.json`, then `./capacity_mapping.toml`
/// 3. Built-in defaults (empty tables)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityMappingConfig {
    /// Flat rated capacity per canonical line (lbs/hr)
    #[serde(default)]
    pub capacity_by_line: BTreeMap<String, f64>,

    /// Material-specific capacity per canonical line (lbs/hr), with optional `DEFAULT` key
    #[serde(default)]
    pub capacity_by_line_material: BTreeMap<String, BTreeMap<String, f64>>,

    /// Raw machine name -> canonical line (exact match)
    #[serde(default)]
    pub line_aliases: BTreeMap<String, String>,

    /// Uppercased raw material -> canonical material
    #[serde(default)]
    pub material_aliases: BTreeMap<String, String>,

    /// Exact reason text -> bucket
    #[serde(default)]
    pub downtime_reason_aliases: BTreeMap<String, String>,

    /// Ordered regex rules matched against normalized reason text
    #[serde(default)]
    pub downtime_reason_alias_regex: Vec<AliasRegexRule>,

    /// Bucket -> substrings, evaluated in file order
    #[serde(default, with = "ordered_keywords")]
    pub downtime_reason_keywords: Vec<KeywordBucket>,

    /// How residual downtime is split across a machine-day's reasons
    #[serde(default)]
    pub downtime_reason_allocation_mode: AllocationMode,

    /// Display metadata for buckets; opaque to the engine
    #[serde(default)]
    pub downtime_reason_buckets: Vec<serde_json::Value>,

    /// OEE quality constant
    #[serde(default = "default_quality")]
    pub quality: f64,
}

const fn default_quality() -> f64 {
    DEFAULT_QUALITY
}

impl Default for CapacityMappingConfig {
    fn default() -> Self {
        Self {
            capacity_by_line: BTreeMap::new(),
            capacity_by_line_material: BTreeMap::new(),
            line_aliases: BTreeMap::new(),
            material_aliases: BTreeMap::new(),
            downtime_reason_aliases: BTreeMap::new(),
            downtime_reason_alias_regex: Vec::new(),
            downtime_reason_keywords: Vec::new(),
            downtime_reason_allocation_mode: AllocationMode::Equal,
            downtime_reason_buckets: Vec::new(),
            quality: DEFAULT_QUALITY,
        }
    }
}

/// One `{pattern, flags, bucket}` entry of `downtimeReasonAliasRegex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRegexRule {
    pub pattern: String,
    #[serde(default)]
    pub flags: String,
    pub bucket: String,
}

impl AliasRegexRule {
    /// Compile the pattern with its JS-style flag letters. `g` and `u` have no
    /// meaning for a single match test and are ignored, as is anything unknown.
    pub fn compile(&self) -> Result<Regex, regex::Error> {
        let mut builder = RegexBuilder::new(&self.pattern);
        for flag in self.flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                _ => &mut builder,
            };
        }
        builder.build()
    }
}

/// An alias rule ready to match.
#[derive(Debug, Clone)]
pub struct CompiledAliasRule {
    pub regex: Regex,
    pub bucket: String,
}

/// One bucket of `downtimeReasonKeywords`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordBucket {
    pub bucket: String,
    pub keywords: Vec<String>,
}

/// Config sources the loader can report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl CapacityMappingConfig {
    /// Load configuration using the standard search order:
    /// 1. `$LINEWATCH_MAPPING` environment variable
    /// 2. `./capacity_mapping.json` / `./capacity_mapping.toml`
    /// 3. Built-in defaults
    pub fn load() -> (Self, ConfigOrigin) {
        // 1. Check env var
        if let Ok(path) = std::env::var(MAPPING_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), lines = config.known_line_count(), "Loaded capacity mapping from {}", MAPPING_ENV_VAR);
                        return (config.with_env_overrides(), ConfigOrigin::File(p));
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load mapping from {}, falling back", MAPPING_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", MAPPING_ENV_VAR);
            }
        }

        // 2. Check local files
        for name in LOCAL_MAPPING_FILES {
            let local = PathBuf::from(name);
            if !local.exists() {
                continue;
            }
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(path = name, lines = config.known_line_count(), "Loaded capacity mapping");
                    return (config.with_env_overrides(), ConfigOrigin::File(local));
                }
                Err(e) => {
                    warn!(path = name, error = %e, "Failed to load local mapping file");
                }
            }
        }

        // 3. Defaults
        info!("No capacity mapping file found, using built-in defaults (every capacity resolves to 0)");
        (Self::default().with_env_overrides(), ConfigOrigin::Defaults)
    }

    /// Load from a specific file. `.toml` files are parsed as TOML, anything else as JSON.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::parse(&contents, ConfigFormat::for_path(path))
            .map_err(|msg| ConfigError::Parse(path.to_path_buf(), msg))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse file contents, logging (not failing on) unknown keys.
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, String> {
        let top_level_keys = super::validation::top_level_keys(contents, format);
        for w in super::validation::validate_unknown_keys(&top_level_keys) {
            warn!("{}", w);
        }

        match format {
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    /// Apply process-level overrides (`LINEWATCH_QUALITY`).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(QUALITY_ENV_VAR) {
            match raw.trim().parse::<f64>() {
                Ok(q) if (0.0..=1.0).contains(&q) => {
                    info!(quality = q, "Quality constant overridden from {}", QUALITY_ENV_VAR);
                    self.quality = q;
                }
                _ => warn!(value = %raw, "Ignoring invalid {} (expected 0..=1)", QUALITY_ENV_VAR),
            }
        }
        self
    }

    /// Serialize to pretty JSON (the canonical on-disk format).
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Number of distinct lines named by either capacity table.
    pub fn known_line_count(&self) -> usize {
        self.capacity_by_line
            .keys()
            .chain(self.capacity_by_line_material.keys())
            .collect::<std::collections::BTreeSet<_>>()
            .len()
    }

    /// Compile `downtimeReasonAliasRegex` in list order. Patterns that fail to
    /// compile are skipped; `validate()` rejects them at load time, so this only
    /// happens for snapshots built in code.
    pub fn compiled_alias_regexes(&self) -> Vec<CompiledAliasRule> {
        self.downtime_reason_alias_regex
            .iter()
            .filter_map(|rule| match rule.compile() {
                Ok(regex) => Some(CompiledAliasRule {
                    regex,
                    bucket: rule.bucket.clone(),
                }),
                Err(e) => {
                    warn!(pattern = %rule.pattern, error = %e, "Skipping invalid downtime alias regex");
                    None
                }
            })
            .collect()
    }

    /// Validate values for internal consistency.
    ///
    /// Errors (reject the config):
    /// - Capacities must be finite and non-negative
    /// - Quality must lie in [0, 1]
    /// - Every alias regex must compile
    ///
    /// Warnings (logged only):
    /// - Line aliases pointing at lines absent from both capacity tables
    /// - Keyword buckets with no usable keywords
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (errors, warnings) = super::validation::validate_mapping(self);
        for w in &warnings {
            warn!("{}", w);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// On-disk format of a mapping file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

// ============================================================================
// Ordered keyword map
// ============================================================================

/// `downtimeReasonKeywords` is a map on disk, but bucket order decides which
/// bucket wins, so it is held as an ordered list.
mod ordered_keywords {
    use super::{fmt, Deserializer, KeywordBucket, MapAccess, SerializeMap, Serializer, Visitor};

    pub fn serialize<S: Serializer>(buckets: &[KeywordBucket], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(buckets.len()))?;
        for b in buckets {
            map.serialize_entry(&b.bucket, &b.keywords)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<KeywordBucket>, D::Error> {
        deserializer.deserialize_map(KeywordMapVisitor)
    }

    struct KeywordMapVisitor;

    impl<'de> Visitor<'de> for KeywordMapVisitor {
        type Value = Vec<KeywordBucket>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of bucket name to keyword list")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut buckets: Vec<KeywordBucket> = Vec::new();
            while let Some((bucket, keywords)) = access.next_entry::<String, Vec<String>>()? {
                // Later duplicates extend the first occurrence so its position is kept.
                if let Some(existing) = buckets.iter_mut().find(|b| b.bucket == bucket) {
                    existing.keywords.extend(keywords);
                } else {
                    buckets.push(KeywordBucket { bucket, keywords });
                }
            }
            Ok(buckets)
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({path}): {err}", path = .0.display(), err = .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({path}): {msg}", path = .0.display(), msg = .1)]
    Parse(PathBuf, String),

    #[error("Config serialization error: {0}")]
    Serialize(String),

    #[error("Config validation failed: {joined}", joined = .0.join("; "))]
    Validation(Vec<String>),

    #[error("No mapping file to reload from (running on built-in defaults)")]
    NoSource,
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(p) => write!(f, "{}", p.display()),
            Self::Defaults => write!(f, "built-in defaults"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_JSON: &str = r##"{
        "capacityByLine": { "EX-1": 60, "EX-2": 45.5 },
        "capacityByLineMaterial": { "EX-3": { "PP": 80, "DEFAULT": 70 } },
        "lineAliases": { "Extruder 1": "EX-1" },
        "materialAliases": { "POLYPROP": "PP" },
        "downtimeReasonAliases": { "NO OP": "STAFFING" },
        "downtimeReasonAliasRegex": [ { "pattern": "^DIE\\b", "flags": "i", "bucket": "CHANGEOVER" } ],
        "downtimeReasonKeywords": { "UTILITY": ["CHILLER"], "MATERIAL": ["HOPPER"], "CHANGEOVER": ["PURGE"] },
        "downtimeReasonAllocationMode": "by_count",
        "downtimeReasonBuckets": [ { "key": "STAFFING", "label": "Staffing", "color": "#f00" } ]
    }"##;

    #[test]
    fn test_default_config_validates() {
        let config = CapacityMappingConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
        assert_eq!(config.quality, DEFAULT_QUALITY);
    }

    #[test]
    fn test_empty_json_produces_defaults() {
        let config = CapacityMappingConfig::parse("{}", ConfigFormat::Json).expect("empty JSON should parse");
        assert_eq!(config, CapacityMappingConfig::default());
    }

    #[test]
    fn test_parse_full_json() {
        let config = CapacityMappingConfig::parse(SAMPLE_JSON, ConfigFormat::Json).unwrap();
        assert_eq!(config.capacity_by_line["EX-2"], 45.5);
        assert_eq!(config.capacity_by_line_material["EX-3"]["DEFAULT"], 70.0);
        assert_eq!(config.line_aliases["Extruder 1"], "EX-1");
        assert_eq!(config.downtime_reason_allocation_mode, AllocationMode::ByCount);
        assert_eq!(config.downtime_reason_alias_regex[0].flags, "i");
        assert_eq!(config.downtime_reason_buckets.len(), 1);
        assert_eq!(config.downtime_reason_buckets[0]["color"], "#f00");
        assert_eq!(config.known_line_count(), 3);
    }

    #[test]
    fn test_keyword_buckets_keep_file_order() {
        let config = CapacityMappingConfig::parse(SAMPLE_JSON, ConfigFormat::Json).unwrap();
        let order: Vec<&str> = config
            .downtime_reason_keywords
            .iter()
            .map(|b| b.bucket.as_str())
            .collect();
        assert_eq!(order, vec!["UTILITY", "MATERIAL", "CHANGEOVER"]);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
quality = 0.85
downtimeReasonAllocationMode = "equal"

[capacityByLine]
"EX-1" = 60.0

[capacityByLineMaterial.EX-3]
PP = 80.0
DEFAULT = 70.0

[downtimeReasonKeywords]
UTILITY = ["CHILLER"]
"#;
        let config = CapacityMappingConfig::parse(toml_str, ConfigFormat::Toml).unwrap();
        assert_eq!(config.quality, 0.85);
        assert_eq!(config.capacity_by_line["EX-1"], 60.0);
        assert_eq!(config.capacity_by_line_material["EX-3"]["PP"], 80.0);
        assert_eq!(config.downtime_reason_keywords[0].bucket, "UTILITY");
    }

    #[test]
    fn test_unknown_allocation_mode_falls_back_to_equal() {
        let config = CapacityMappingConfig::parse(
            r#"{ "downtimeReasonAllocationMode": "weighted" }"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(config.downtime_reason_allocation_mode, AllocationMode::Equal);
    }

    #[test]
    fn test_json_roundtrip_keeps_keyword_order() {
        let original = CapacityMappingConfig::parse(SAMPLE_JSON, ConfigFormat::Json).unwrap();
        let json = original.to_json().expect("serialization should work");
        let roundtripped = CapacityMappingConfig::parse(&json, ConfigFormat::Json).unwrap();
        assert_eq!(original, roundtripped);
    }

    #[test]
    fn test_load_from_file_rejects_negative_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.json");
        std::fs::write(&path, r#"{ "capacityByLine": { "EX-1": -5 } }"#).unwrap();
        let result = CapacityMappingConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file_missing_is_io_error() {
        let result = CapacityMappingConfig::load_from_file(Path::new("/nonexistent/mapping.json"));
        assert!(matches!(result, Err(ConfigError::Io(_, _))));
    }

    #[test]
    fn test_alias_rule_flags() {
        let rule = AliasRegexRule {
            pattern: "^die change".into(),
            flags: "gi".into(),
            bucket: "CHANGEOVER".into(),
        };
        let re = rule.compile().unwrap();
        assert!(re.is_match("DIE CHANGE 3"));

        let strict = AliasRegexRule { flags: String::new(), ..rule };
        assert!(!strict.compile().unwrap().is_match("DIE CHANGE 3"));
    }

    #[test]
    fn test_compiled_alias_regexes_skips_invalid() {
        let mut config = CapacityMappingConfig::default();
        config.downtime_reason_alias_regex = vec![
            AliasRegexRule { pattern: "(bad".into(), flags: String::new(), bucket: "X".into() },
            AliasRegexRule { pattern: "CHILLER".into(), flags: String::new(), bucket: "UTILITY".into() },
        ];
        let compiled = config.compiled_alias_regexes();
        assert_eq!(compiled.len(), 1);
        assert_eq!(compiled[0].bucket, "UTILITY");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(ConfigFormat::for_path(Path::new("a/b.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::for_path(Path::new("a/b.TOML")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::for_path(Path::new("a/b.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::for_path(Path::new("mapping")), ConfigFormat::Json);
    }
}
