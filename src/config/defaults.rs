//! System-wide default constants.
//!
//! Centralises the magic numbers of the efficiency engine.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Day Budget
// ============================================================================

/// Hours in one production day. Every machine-day is reconciled into this budget.
pub const HOURS_PER_DAY: f64 = 24.0;

/// Tolerance used when checking the 24h identity and allocation sums.
pub const HOURS_EPSILON: f64 = 1e-9;

// ============================================================================
// Efficiency
// ============================================================================

/// Fixed acceptance-rate constant used as the OEE quality factor.
///
/// No per-batch quality data is available upstream.
pub const DEFAULT_QUALITY: f64 = 0.70;

// ============================================================================
// Mapping
// ============================================================================

/// Material key used when no material was recorded, and as the per-line fallback
/// entry inside `capacityByLineMaterial`.
pub const DEFAULT_MATERIAL: &str = "DEFAULT";

/// Bucket that receives unexplained downtime.
pub const OTHER_BUCKET: &str = "OTHER";

// ============================================================================
// Config Loading
// ============================================================================

/// Environment variable naming the mapping file.
pub const MAPPING_ENV_VAR: &str = "LINEWATCH_MAPPING";

/// Local mapping file names searched after the env var (first hit wins).
pub const LOCAL_MAPPING_FILES: [&str; 2] = ["capacity_mapping.json", "capacity_mapping.toml"];

/// Environment variable that overrides the configured quality constant.
pub const QUALITY_ENV_VAR: &str = "LINEWATCH_QUALITY";

/// Maximum edit distance for "did you mean" suggestions on unknown keys.
pub const MAX_SUGGESTION_DISTANCE: usize = 3;

// ============================================================================
// Result Cache
// ============================================================================

/// Lifetime of a cached fleet aggregation (seconds).
pub const RESULT_CACHE_TTL_SECS: u64 = 60;

// ============================================================================
// Config Watcher
// ============================================================================

/// Interval between mapping file mtime checks (milliseconds).
pub const WATCHER_POLL_INTERVAL_MS: u64 = 2_000;

/// Debounce delay after detecting a change, editors often write in stages (milliseconds).
pub const WATCHER_DEBOUNCE_MS: u64 = 500;

// ============================================================================
// HTTP
// ============================================================================

/// Default bind address for `linewatch serve`.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

/// Days covered by a query that names neither `from` nor `to`.
pub const DEFAULT_QUERY_DAYS: i64 = 30;
