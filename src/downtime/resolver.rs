//! Reason canonicalization as an ordered list of strategies.
//!
//! Strategies are evaluated in order and the first one that yields a bucket
//! wins:
//!
//! 1. `ExactAlias` - `downtimeReasonAliases`
//! 2. `AliasRegex` - `downtimeReasonAliasRegex`, list order
//! 3. `KeywordBag` - `downtimeReasonKeywords`, file order
//! 4. `Heuristic` - built-in substring cascade
//! 5. `Default` - `OTHER`

use serde::Serialize;
use std::collections::BTreeMap;

use super::normalize::normalize_reason;
use crate::config::defaults::OTHER_BUCKET;
use crate::config::{CapacityMappingConfig, CompiledAliasRule};

/// Built-in cascade, tested top to bottom against normalized text.
const HEURISTIC_BUCKETS: &[(&str, &[&str])] = &[
    (
        "STAFFING",
        &["EMPLOYEE", "OPERATOR", "NO CREW", "NO STAFF", "STAFFING", "SHORT STAFF", "MANPOWER", "LABOR"],
    ),
    ("MATERIAL", &["MATERIAL", "MATL", "RESIN", "SUPPLY", "PELLET"]),
    (
        "CHANGEOVER",
        &["CHANGEOVER", "CHANGE OVER", "COLOR", "COLOUR", "SETUP", "SET UP", "STARTUP", "START UP"],
    ),
    ("QUALITY", &["QUALITY", "CONTAM", "HOLD", "SCRAP", "REWORK"]),
    ("UTILITY", &["POWER", "UTILITY", "UTILITIES", "OUTAGE"]),
    (
        "MAINTENANCE",
        &[
            "BREAKDOWN", "MOTOR", "GEARBOX", "PUMP", "HEATER", "SCREW", "BARREL", "BEARING",
            "HYDRAULIC", "ELECTRICAL", "BELT", "LEAK", "BROKEN", "REPAIR", "FAILURE", "JAM",
        ],
    ),
];

/// Which strategy produced a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    ExactAlias,
    AliasRegex,
    KeywordBag,
    Heuristic,
    Default,
}

/// One resolution step, carrying the config data it needs.
#[derive(Debug, Clone)]
pub enum ReasonStrategy {
    ExactAlias(BTreeMap<String, String>),
    AliasRegex(Vec<CompiledAliasRule>),
    /// (bucket, normalized keywords)
    KeywordBag(Vec<(String, Vec<String>)>),
    Heuristic,
    Default,
}

impl ReasonStrategy {
    pub const fn kind(&self) -> StrategyKind {
        match self {
            Self::ExactAlias(_) => StrategyKind::ExactAlias,
            Self::AliasRegex(_) => StrategyKind::AliasRegex,
            Self::KeywordBag(_) => StrategyKind::KeywordBag,
            Self::Heuristic => StrategyKind::Heuristic,
            Self::Default => StrategyKind::Default,
        }
    }

    fn resolve(&self, raw: &str, normalized: &str) -> Option<String> {
        match self {
            Self::ExactAlias(aliases) => aliases
                .get(raw)
                .or_else(|| aliases.get(raw.trim()))
                .or_else(|| aliases.get(normalized))
                .cloned(),
            Self::AliasRegex(rules) => rules
                .iter()
                .find(|rule| rule.regex.is_match(normalized))
                .map(|rule| rule.bucket.clone()),
            Self::KeywordBag(buckets) => buckets
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| normalized.contains(k.as_str())))
                .map(|(bucket, _)| bucket.clone()),
            Self::Heuristic => HEURISTIC_BUCKETS
                .iter()
                .find(|(_, tokens)| tokens.iter().any(|t| normalized.contains(t)))
                .map(|(bucket, _)| (*bucket).to_string()),
            Self::Default => Some(OTHER_BUCKET.to_string()),
        }
    }
}

/// Result of `explain()`: the bucket and the step that chose it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReasonMatch {
    pub normalized: String,
    pub bucket: String,
    pub strategy: StrategyKind,
}

/// Ordered strategy list built from one config snapshot.
#[derive(Debug, Clone)]
pub struct ReasonResolver {
    strategies: Vec<ReasonStrategy>,
}

impl ReasonResolver {
    /// Build the standard five-step list. Regexes are compiled once here.
    pub fn from_config(config: &CapacityMappingConfig) -> Self {
        let keyword_bag = config
            .downtime_reason_keywords
            .iter()
            .map(|b| {
                let keywords = b
                    .keywords
                    .iter()
                    .map(|k| normalize_reason(k))
                    .filter(|k| !k.is_empty())
                    .collect();
                (b.bucket.clone(), keywords)
            })
            .collect();

        Self::with_strategies(vec![
            ReasonStrategy::ExactAlias(config.downtime_reason_aliases.clone()),
            ReasonStrategy::AliasRegex(config.compiled_alias_regexes()),
            ReasonStrategy::KeywordBag(keyword_bag),
            ReasonStrategy::Heuristic,
            ReasonStrategy::Default,
        ])
    }

    /// Custom ordering. A trailing `Default` is appended if missing so every
    /// text resolves.
    pub fn with_strategies(mut strategies: Vec<ReasonStrategy>) -> Self {
        if !matches!(strategies.last(), Some(ReasonStrategy::Default)) {
            strategies.push(ReasonStrategy::Default);
        }
        Self { strategies }
    }

    pub fn strategies(&self) -> &[ReasonStrategy] {
        &self.strategies
    }

    /// Canonical bucket for free reason text.
    pub fn canon_reason(&self, text: &str) -> String {
        self.explain(text).bucket
    }

    /// Canonical bucket plus the strategy that matched.
    pub fn explain(&self, text: &str) -> ReasonMatch {
        let normalized = normalize_reason(text);
        for strategy in &self.strategies {
            if let Some(bucket) = strategy.resolve(text, &normalized) {
                return ReasonMatch {
                    normalized,
                    bucket,
                    strategy: strategy.kind(),
                };
            }
        }
        ReasonMatch {
            normalized,
            bucket: OTHER_BUCKET.to_string(),
            strategy: StrategyKind::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AliasRegexRule, KeywordBucket};

    fn resolver_with(config: &CapacityMappingConfig) -> ReasonResolver {
        ReasonResolver::from_config(config)
    }

    #[test]
    fn test_heuristic_cascade() {
        let r = resolver_with(&CapacityMappingConfig::default());
        assert_eq!(r.canon_reason("no operator"), "STAFFING");
        assert_eq!(r.canon_reason("Resin shortage"), "MATERIAL");
        assert_eq!(r.canon_reason("colour change"), "CHANGEOVER");
        assert_eq!(r.canon_reason("QC hold"), "QUALITY");
        assert_eq!(r.canon_reason("power outage"), "UTILITY");
        assert_eq!(r.canon_reason("gearbox broke"), "MAINTENANCE");
        assert_eq!(r.canon_reason("lunch"), "OTHER");
        assert_eq!(r.canon_reason(""), "OTHER");
    }

    #[test]
    fn test_heuristic_order_staffing_before_material() {
        let r = resolver_with(&CapacityMappingConfig::default());
        let m = r.explain("operator waiting on resin");
        assert_eq!(m.bucket, "STAFFING");
        assert_eq!(m.strategy, StrategyKind::Heuristic);
    }

    #[test]
    fn test_exact_alias_beats_everything() {
        let mut config = CapacityMappingConfig::default();
        config.downtime_reason_aliases.insert("NO OPERATOR".into(), "SCHEDULING".into());
        config.downtime_reason_alias_regex.push(AliasRegexRule {
            pattern: "OPERATOR".into(),
            flags: String::new(),
            bucket: "REGEX".into(),
        });
        let r = resolver_with(&config);
        let m = r.explain(" no-operator ");
        assert_eq!(m.bucket, "SCHEDULING");
        assert_eq!(m.strategy, StrategyKind::ExactAlias);
    }

    #[test]
    fn test_regex_before_keywords() {
        let mut config = CapacityMappingConfig::default();
        config.downtime_reason_alias_regex.push(AliasRegexRule {
            pattern: "^die (change|swap)".into(),
            flags: "i".into(),
            bucket: "CHANGEOVER".into(),
        });
        config.downtime_reason_keywords.push(KeywordBucket {
            bucket: "TOOLING".into(),
            keywords: vec!["DIE".into()],
        });
        let r = resolver_with(&config);
        assert_eq!(r.explain("Die swap").strategy, StrategyKind::AliasRegex);
        assert_eq!(r.canon_reason("die cracked"), "TOOLING");
    }

    #[test]
    fn test_keyword_bucket_order_and_normalization() {
        let mut config = CapacityMappingConfig::default();
        config.downtime_reason_keywords = vec![
            KeywordBucket { bucket: "UTILITY".into(), keywords: vec!["chiller".into(), "  ".into()] },
            KeywordBucket { bucket: "COOLING".into(), keywords: vec!["CHILLER".into()] },
        ];
        let r = resolver_with(&config);
        let m = r.explain("Chiller tripped");
        assert_eq!(m.bucket, "UTILITY");
        assert_eq!(m.strategy, StrategyKind::KeywordBag);
        // The blank keyword must not match everything
        assert_eq!(r.canon_reason("lunch"), "OTHER");
    }

    #[test]
    fn test_with_strategies_appends_default() {
        let r = ReasonResolver::with_strategies(vec![ReasonStrategy::Heuristic]);
        assert_eq!(r.strategies().len(), 2);
        assert_eq!(r.explain("nothing matches here").strategy, StrategyKind::Default);
    }
}
