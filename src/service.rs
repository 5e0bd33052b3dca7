//! Production service: one snapshot of config, rows from the source, core math.
//!
//! Each call takes a fresh config snapshot, fetches rows for the requested
//! range, and runs the pure functions. Fleet aggregations are cached per range.

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::cache::{ResultCache, TtlCache};
use crate::config::{CapacityMappingConfig, ConfigError, ConfigStore, ReloadSummary};
use crate::downtime::allocate_range;
use crate::production::{aggregate_by_date, machine_day_diagnostics};
use crate::source::{RecordSource, SourceError};
use crate::types::{
    DailyAggregate, DateRange, FleetSummary, MachineDayDiagnostic, ProductionQuery, ReasonSummary,
};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Daily aggregates together with the config snapshot they were priced with.
#[derive(Debug, Clone)]
pub struct CachedDaily {
    pub config: Arc<CapacityMappingConfig>,
    pub daily: Arc<Vec<DailyAggregate>>,
}

impl CachedDaily {
    /// Entries computed under any other snapshot are stale.
    pub fn is_current(&self, config: &Arc<CapacityMappingConfig>) -> bool {
        Arc::ptr_eq(&self.config, config)
    }
}

/// Cache of daily aggregates keyed by the requested range.
pub type DailyCache = dyn ResultCache<DateRange, CachedDaily>;

/// Range summary plus the daily rows it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct ProductionSummary {
    pub range: DateRange,
    #[serde(flatten)]
    pub fleet: FleetSummary,
    pub daily: Vec<DailyAggregate>,
}

pub struct ProductionService {
    store: Arc<ConfigStore>,
    source: Arc<dyn RecordSource>,
    cache: Arc<DailyCache>,
}

impl ProductionService {
    pub fn new(store: Arc<ConfigStore>, source: Arc<dyn RecordSource>, cache: Arc<DailyCache>) -> Self {
        Self { store, source, cache }
    }

    /// Service with the default 60s TTL cache.
    pub fn with_default_cache(store: Arc<ConfigStore>, source: Arc<dyn RecordSource>) -> Self {
        let cache: Arc<DailyCache> = Arc::new(TtlCache::<DateRange, CachedDaily>::default());
        Self::new(store, source, cache)
    }

    pub fn config(&self) -> Arc<CapacityMappingConfig> {
        self.store.snapshot()
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn source_name(&self) -> &str {
        self.source.source_name()
    }

    /// Fleet aggregates for each date with data, ascending.
    pub async fn daily(&self, query: &ProductionQuery) -> Result<Arc<Vec<DailyAggregate>>, ServiceError> {
        Ok(self.cached_daily(query.range).await?.daily)
    }

    /// Range totals and ratios, with the daily rows.
    pub async fn summary(&self, query: &ProductionQuery) -> Result<ProductionSummary, ServiceError> {
        let CachedDaily { config, daily } = self.cached_daily(query.range).await?;
        let fleet = FleetSummary::from_daily(&daily, config.quality);
        info!(
            range = %query.range,
            days = fleet.days,
            fleet_size = fleet.fleet_size,
            oee = fleet.ratios.oee,
            "Production summary"
        );
        Ok(ProductionSummary {
            range: query.range,
            fleet,
            daily: daily.as_ref().clone(),
        })
    }

    /// Daily aggregates for `range` under the current snapshot. An entry priced
    /// with an older snapshot is a miss.
    async fn cached_daily(&self, range: DateRange) -> Result<CachedDaily, ServiceError> {
        let config = self.store.snapshot();
        if let Some(hit) = self.cache.get(&range) {
            if hit.is_current(&config) {
                debug!(%range, "Daily aggregates served from cache");
                return Ok(hit);
            }
            debug!(%range, "Cached daily aggregates predate the active mapping");
        }

        let records = self.source.day_records(range).await?;
        let daily = Arc::new(aggregate_by_date(&records, &config));
        debug!(%range, rows = records.len(), days = daily.len(), "Daily aggregates computed");

        let entry = CachedDaily { config, daily };
        self.cache.put(range, entry.clone());
        Ok(entry)
    }

    /// Per-row audit records, optionally for one machine.
    pub async fn diagnostics(&self, query: &ProductionQuery) -> Result<Vec<MachineDayDiagnostic>, ServiceError> {
        let config = self.store.snapshot();
        let records = self.source.day_records(query.range).await?;
        let out = machine_day_diagnostics(&records, &config, query.machine.as_deref());
        debug!(range = %query.range, machine = ?query.machine, rows = out.len(), "Diagnostics computed");
        Ok(out)
    }

    /// Downtime attributed to reason buckets over the range.
    pub async fn downtime_reasons(&self, query: &ProductionQuery) -> Result<ReasonSummary, ServiceError> {
        let config = self.store.snapshot();
        let records = self.source.day_records(query.range).await?;
        let reasons = self.source.downtime_reasons(query.range).await?;
        let summary = allocate_range(&records, &reasons, &config, query);
        debug!(
            range = %query.range,
            kind = %query.kind,
            machine_days = summary.machine_days,
            total_hours = summary.total_hours,
            "Downtime reasons allocated"
        );
        Ok(summary)
    }

    /// Reload the mapping file and drop cached results.
    pub fn reload_config(&self) -> Result<ReloadSummary, ServiceError> {
        let summary = self.store.reload()?;
        self.invalidate_cache();
        info!(path = %summary.path.display(), changes = summary.changes.len(), "Mapping reloaded");
        Ok(summary)
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
        debug!("Result cache invalidated");
    }
}
