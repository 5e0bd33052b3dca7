//! linewatch: production efficiency and downtime attribution
//!
//! Turns daily per-machine production rows into fleet OEE figures and
//! attributes unexplained downtime to reason buckets.
//!
//! ## Architecture
//!
//! - **Mapping Resolver**: canonical line/material names and rated capacity
//! - **Production**: 24h reconciliation per machine-day, fleet aggregation by date
//! - **Downtime**: reason canonicalization strategies and residual allocation
//! - **Service / API**: config snapshot + record source + result cache, served over HTTP

pub mod api;
pub mod cache;
pub mod config;
pub mod downtime;
pub mod mapping;
pub mod production;
pub mod service;
pub mod source;
pub mod types;

// Re-export mapping configuration
pub use config::{CapacityMappingConfig, ConfigStore};

// Re-export commonly used types
pub use types::{
    AllocationKind, AllocationMode, DailyAggregate, DateRange, DayMetrics, DowntimeReasonRecord,
    MachineDayDiagnostic, ProductionQuery, RawDayRecord, ReasonSummary,
};

pub use mapping::MappingResolver;
pub use service::{ProductionService, ServiceError};
pub use source::{InMemorySource, JsonFileSource, RecordSource, SourceError};
