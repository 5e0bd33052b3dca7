//! Service and Cache Integration Tests
//!
//! Exercises `ProductionService` against a counting record source to verify
//! result caching, cache invalidation on mapping reload, and error mapping.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use linewatch::cache::{NoCache, TtlCache};
use linewatch::config::{CapacityMappingConfig, ConfigStore};
use linewatch::service::{CachedDaily, DailyCache, ProductionService, ServiceError};
use linewatch::source::{InMemorySource, RecordSource, SourceError};
use linewatch::types::{AllocationKind, DateRange, DowntimeReasonRecord, ProductionQuery, RawDayRecord};

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

fn march() -> ProductionQuery {
    ProductionQuery::new(DateRange::new(d(1), d(31)).unwrap())
}

/// Wraps an in-memory source and counts production-row fetches.
struct CountingSource {
    inner: InMemorySource,
    fetches: AtomicUsize,
}

impl CountingSource {
    fn new(records: Vec<RawDayRecord>, reasons: Vec<DowntimeReasonRecord>) -> Self {
        Self {
            inner: InMemorySource::new(records, reasons),
            fetches: AtomicUsize::new(0),
        }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordSource for CountingSource {
    async fn day_records(&self, range: DateRange) -> Result<Vec<RawDayRecord>, SourceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.day_records(range).await
    }

    async fn downtime_reasons(&self, range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError> {
        self.inner.downtime_reasons(range).await
    }

    fn source_name(&self) -> &str {
        "counting"
    }
}

/// Source that can park a fetch until the test releases it.
struct GatedSource {
    inner: InMemorySource,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl GatedSource {
    fn new(records: Vec<RawDayRecord>) -> Self {
        Self {
            inner: InMemorySource::new(records, Vec::new()),
            gated: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl RecordSource for GatedSource {
    async fn day_records(&self, range: DateRange) -> Result<Vec<RawDayRecord>, SourceError> {
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.day_records(range).await
    }

    async fn downtime_reasons(&self, range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError> {
        self.inner.downtime_reasons(range).await
    }

    fn source_name(&self) -> &str {
        "gated"
    }
}

/// Source that is always down.
struct FailingSource;

#[async_trait]
impl RecordSource for FailingSource {
    async fn day_records(&self, _range: DateRange) -> Result<Vec<RawDayRecord>, SourceError> {
        Err(SourceError::Unavailable("database unreachable".into()))
    }

    async fn downtime_reasons(&self, _range: DateRange) -> Result<Vec<DowntimeReasonRecord>, SourceError> {
        Err(SourceError::Unavailable("database unreachable".into()))
    }

    fn source_name(&self) -> &str {
        "failing"
    }
}

fn rows() -> Vec<RawDayRecord> {
    vec![
        RawDayRecord::new(d(4), "EX-1", None, 1000.0, 20.0, 2.0),
        RawDayRecord::new(d(5), "EX-1", None, 900.0, 18.0, 0.0),
    ]
}

fn store_with_ex1(capacity: f64) -> Arc<ConfigStore> {
    let mut config = CapacityMappingConfig::default();
    config.capacity_by_line.insert("EX-1".into(), capacity);
    Arc::new(ConfigStore::new(config, None))
}

#[tokio::test]
async fn daily_is_cached_per_range() {
    let source = Arc::new(CountingSource::new(rows(), Vec::new()));
    let service = ProductionService::with_default_cache(store_with_ex1(60.0), source.clone());

    let first = service.daily(&march()).await.unwrap();
    let second = service.daily(&march()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(source.fetches(), 1, "second call should be a cache hit");

    let other = ProductionQuery::new(DateRange::day(d(4)));
    let single = service.daily(&other).await.unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn cache_hit_equals_fresh_computation() {
    let cached_source = Arc::new(CountingSource::new(rows(), Vec::new()));
    let cached = ProductionService::with_default_cache(store_with_ex1(60.0), cached_source);
    cached.daily(&march()).await.unwrap();
    let hit = cached.daily(&march()).await.unwrap();

    let no_cache: Arc<DailyCache> = Arc::new(NoCache);
    let fresh = ProductionService::new(
        store_with_ex1(60.0),
        Arc::new(CountingSource::new(rows(), Vec::new())),
        no_cache,
    );
    let miss = fresh.daily(&march()).await.unwrap();
    assert_eq!(hit, miss);
}

#[tokio::test]
async fn reload_invalidates_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capacity_mapping.json");
    std::fs::write(&path, r#"{ "capacityByLine": { "EX-1": 60 } }"#).unwrap();

    let store = Arc::new(ConfigStore::new(
        CapacityMappingConfig::load_from_file(&path).unwrap(),
        Some(path.clone()),
    ));
    let source = Arc::new(CountingSource::new(rows(), Vec::new()));
    let cache: Arc<DailyCache> = Arc::new(TtlCache::<DateRange, CachedDaily>::default());
    let service = ProductionService::new(store, source.clone(), cache);

    let before = service.daily(&march()).await.unwrap();
    assert_eq!(before[0].totals.run_capacity_lbs, 1200.0);

    std::fs::write(&path, r#"{ "capacityByLine": { "EX-1": 50 } }"#).unwrap();
    let summary = service.reload_config().unwrap();
    assert_eq!(summary.changes.len(), 1);
    assert_eq!(summary.changes[0].section, "capacityByLine");

    let after = service.daily(&march()).await.unwrap();
    assert_eq!(after[0].totals.run_capacity_lbs, 1000.0);
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn fetch_in_flight_during_reload_does_not_poison_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capacity_mapping.json");
    std::fs::write(&path, r#"{ "capacityByLine": { "EX-1": 60 }, "quality": 0.7 }"#).unwrap();

    let store = Arc::new(ConfigStore::new(
        CapacityMappingConfig::load_from_file(&path).unwrap(),
        Some(path.clone()),
    ));
    let source = Arc::new(GatedSource::new(rows()));
    let service = Arc::new(ProductionService::with_default_cache(store, source.clone()));

    let in_flight = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.daily(&march()).await })
    };
    source.entered.notified().await;

    std::fs::write(&path, r#"{ "capacityByLine": { "EX-1": 100 }, "quality": 0.9 }"#).unwrap();
    service.reload_config().unwrap();
    source.gated.store(false, Ordering::SeqCst);
    source.release.notify_one();

    // Priced under the mapping it started with
    let stale = in_flight.await.unwrap().unwrap();
    assert_eq!(stale[0].totals.run_capacity_lbs, 1200.0);

    let fresh = service.daily(&march()).await.unwrap();
    assert_eq!(fresh[0].totals.run_capacity_lbs, 2000.0);

    let summary = service.summary(&march()).await.unwrap();
    assert_eq!(summary.fleet.ratios.quality, 0.9);
    assert!(summary.daily.iter().all(|day| day.ratios.quality == 0.9));
}

#[tokio::test]
async fn reload_without_file_is_config_error() {
    let service = ProductionService::with_default_cache(
        store_with_ex1(60.0),
        Arc::new(InMemorySource::default()),
    );
    assert!(matches!(service.reload_config(), Err(ServiceError::Config(_))));
}

#[tokio::test]
async fn source_failure_propagates() {
    let service = ProductionService::with_default_cache(store_with_ex1(60.0), Arc::new(FailingSource));
    let err = service.summary(&march()).await.unwrap_err();
    assert!(matches!(err, ServiceError::Source(SourceError::Unavailable(_))));
}

#[tokio::test]
async fn summary_rolls_up_daily() {
    let service = ProductionService::with_default_cache(
        store_with_ex1(60.0),
        Arc::new(InMemorySource::new(rows(), Vec::new())),
    );
    let summary = service.summary(&march()).await.unwrap();
    assert_eq!(summary.fleet.days, 2);
    assert_eq!(summary.fleet.fleet_size, 1);
    assert_eq!(summary.fleet.planned_hours, 48.0);
    assert_eq!(summary.fleet.totals.pounds, 1900.0);
    assert_eq!(summary.daily.len(), 2);
    let r = summary.fleet.ratios;
    assert_eq!(r.oee, r.availability * r.perf_run * r.quality);
}

#[tokio::test]
async fn downtime_reasons_through_service() {
    let reasons = vec![
        DowntimeReasonRecord::new(d(4), "EX-1", "power outage"),
        DowntimeReasonRecord::new(d(5), "EX-1", "no crew"),
    ];
    let service = ProductionService::with_default_cache(
        store_with_ex1(60.0),
        Arc::new(InMemorySource::new(rows(), reasons)),
    );

    let prod = service.downtime_reasons(&march()).await.unwrap();
    assert_eq!(prod.reasons[0].reason, "STAFFING");
    assert_eq!(prod.reasons[0].hours, 6.0);
    assert_eq!(prod.reasons[1].reason, "UTILITY");
    assert_eq!(prod.reasons[1].hours, 2.0);

    let maint = service
        .downtime_reasons(&march().with_kind(AllocationKind::Maint))
        .await
        .unwrap();
    assert_eq!(maint.reasons.len(), 1);
    assert_eq!(maint.reasons[0].reason, "OTHER");
    assert_eq!(maint.reasons[0].hours, 2.0);
}
