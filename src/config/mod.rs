//! Capacity Mapping Configuration Module
//!
//! Provides the capacity/alias mapping every computation reads, loaded from a
//! JSON or TOML file and held as one immutable snapshot.
//!
//! ## Loading Order
//!
//! 1. `LINEWATCH_MAPPING` environment variable (path to a JSON or TOML file)
//! 2. `capacity_mapping.json`, then `capacity_mapping.toml`, in the working directory
//! 3. Built-in defaults (empty tables, quality 0.70)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! let (mapping, origin) = CapacityMappingConfig::load();
//! config::init(mapping, origin);
//!
//! // Anywhere in the codebase:
//! let quality = config::get().quality;
//! ```
//!
//! Reloads swap the whole snapshot through `ArcSwap`; readers holding an older
//! `Arc` finish their computation against it undisturbed.

mod mapping_config;
pub mod defaults;
pub mod validation;
pub mod watcher;

pub use mapping_config::*;

use arc_swap::ArcSwap;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

// ============================================================================
// Reload reporting
// ============================================================================

/// A top-level mapping section whose contents differ between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigChange {
    pub section: String,
}

impl std::fmt::Display for ConfigChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} changed", self.section)
    }
}

/// Outcome of a successful reload.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub path: PathBuf,
    pub known_lines: usize,
    pub changes: Vec<ConfigChange>,
}

/// Compare two snapshots section by section.
pub fn diff_configs(old: &CapacityMappingConfig, new: &CapacityMappingConfig) -> Vec<ConfigChange> {
    let (Ok(old_v), Ok(new_v)) = (serde_json::to_value(old), serde_json::to_value(new)) else {
        return Vec::new();
    };
    let (Some(old_map), Some(new_map)) = (old_v.as_object(), new_v.as_object()) else {
        return Vec::new();
    };
    new_map
        .iter()
        .filter(|(key, value)| old_map.get(*key) != Some(*value))
        .map(|(key, _)| ConfigChange { section: key.clone() })
        .collect()
}

// ============================================================================
// ConfigStore
// ============================================================================

/// Hot-swappable holder of the active mapping snapshot.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<CapacityMappingConfig>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Wrap a snapshot. `path` is where `reload()` re-reads from; `None` means
    /// the store runs on defaults and cannot reload.
    pub fn new(config: CapacityMappingConfig, path: Option<PathBuf>) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            path,
        }
    }

    /// Build from the result of `CapacityMappingConfig::load()`.
    pub fn from_loaded(config: CapacityMappingConfig, origin: ConfigOrigin) -> Self {
        let path = match origin {
            ConfigOrigin::File(p) => Some(p),
            ConfigOrigin::Defaults => None,
        };
        Self::new(config, path)
    }

    /// Current snapshot. Cheap; callers keep it for the duration of one computation.
    pub fn snapshot(&self) -> Arc<CapacityMappingConfig> {
        self.current.load_full()
    }

    /// Swap in a new snapshot, returning which sections changed.
    pub fn replace(&self, config: CapacityMappingConfig) -> Vec<ConfigChange> {
        let old = self.current.swap(Arc::new(config));
        diff_configs(&old, &self.current.load())
    }

    /// File this store reloads from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the backing file. On failure the previous snapshot stays active.
    pub fn reload(&self) -> Result<ReloadSummary, ConfigError> {
        let path = self.path.clone().ok_or(ConfigError::NoSource)?;
        self.reload_from(&path)
    }

    /// Load, validate and swap in the mapping at `path`.
    pub fn reload_from(&self, path: &Path) -> Result<ReloadSummary, ConfigError> {
        let config = CapacityMappingConfig::load_from_file(path)?.with_env_overrides();
        let known_lines = config.known_line_count();
        let changes = self.replace(config);

        if changes.is_empty() {
            tracing::info!(path = %path.display(), "Mapping reloaded, no changes");
        } else {
            for change in &changes {
                tracing::info!(section = %change.section, "Mapping section changed");
            }
        }

        Ok(ReloadSummary {
            path: path.to_path_buf(),
            known_lines,
            changes,
        })
    }
}

// ============================================================================
// Global store
// ============================================================================

static CONFIG_STORE: OnceLock<Arc<ConfigStore>> = OnceLock::new();

/// Initialize the global mapping store.
///
/// Later calls are ignored with a warning.
pub fn init(config: CapacityMappingConfig, origin: ConfigOrigin) -> Arc<ConfigStore> {
    let store = Arc::new(ConfigStore::from_loaded(config, origin));
    if CONFIG_STORE.set(Arc::clone(&store)).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
    store_handle().unwrap_or(store)
}

/// Handle to the global store, if initialized.
pub fn store_handle() -> Option<Arc<ConfigStore>> {
    CONFIG_STORE.get().cloned()
}

/// Current global snapshot, or built-in defaults before `init()`.
pub fn get() -> Arc<CapacityMappingConfig> {
    CONFIG_STORE
        .get()
        .map_or_else(|| Arc::new(CapacityMappingConfig::default()), |store| store.snapshot())
}

/// Reload the global store from its backing file.
pub fn reload() -> Result<ReloadSummary, ConfigError> {
    CONFIG_STORE.get().ok_or(ConfigError::NoSource)?.reload()
}

/// Check whether the global store has been initialized.
pub fn is_initialized() -> bool {
    CONFIG_STORE.get().is_some()
}
