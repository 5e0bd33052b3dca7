//! API route handlers
//!
//! Thin adapters: parse query parameters, call the service, wrap the result
//! in the response envelope.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::config::defaults::DEFAULT_QUERY_DAYS;
use crate::mapping::MappingResolver;
use crate::service::ProductionService;
use crate::types::{AllocationKind, DateRange, ProductionQuery};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ProductionService>,
}

impl ApiState {
    pub fn new(service: Arc<ProductionService>) -> Self {
        Self { service }
    }
}

// ============================================================================
// Query types
// ============================================================================

/// Query string shared by the range endpoints. Everything arrives as text so
/// malformed values produce an enveloped 400 instead of axum's plain rejection.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub machine: Option<String>,
    pub weekdays_only: Option<String>,
    pub kind: Option<String>,
}

impl RangeParams {
    /// Resolve into a core query relative to `today`.
    pub fn into_query(self, today: NaiveDate) -> Result<ProductionQuery, String> {
        let range = resolve_range(self.from.as_deref(), self.to.as_deref(), today)?;
        let mut query = ProductionQuery::new(range);
        if let Some(machine) = self.machine.filter(|m| !m.trim().is_empty()) {
            query = query.with_machine(machine);
        }
        if let Some(flag) = self.weekdays_only.as_deref() {
            query = query.weekdays_only(parse_flag(flag)?);
        }
        if let Some(kind) = self.kind.as_deref().filter(|k| !k.trim().is_empty()) {
            query = query.with_kind(kind.parse::<AllocationKind>()?);
        }
        Ok(query)
    }
}

fn parse_date(field: &str, text: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{field}' must be an ISO date (YYYY-MM-DD), got '{text}'"))
}

fn parse_flag(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(format!("'weekdays_only' must be a boolean, got '{other}'")),
    }
}

/// Missing bounds default to the last 30 days ending `today`.
pub fn resolve_range(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> Result<DateRange, String> {
    let to = to.map(|t| parse_date("to", t)).transpose()?;
    let from = from.map(|f| parse_date("from", f)).transpose()?;

    let to = to.unwrap_or(today);
    let from = match from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_QUERY_DAYS - 1))
            .ok_or_else(|| format!("'to' ({to}) leaves no room for the default {DEFAULT_QUERY_DAYS}-day window"))?,
    };

    DateRange::new(from, to).ok_or_else(|| format!("'from' ({from}) is after 'to' ({to})"))
}

fn query_or_400(params: RangeParams) -> Result<ProductionQuery, Response> {
    params
        .into_query(Utc::now().date_naive())
        .map_err(ApiErrorResponse::bad_request)
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub source: String,
    pub mapping_path: Option<String>,
    pub known_lines: usize,
}

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    let config = state.service.config();
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        source: state.service.source_name().to_string(),
        mapping_path: state.service.store().path().map(|p| p.display().to_string()),
        known_lines: MappingResolver::new(&config).known_lines().len(),
    })
}

/// GET /api/v1/summary?from&to
pub async fn get_summary(State(state): State<ApiState>, Query(params): Query<RangeParams>) -> Response {
    let query = match query_or_400(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match state.service.summary(&query).await {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/daily?from&to
pub async fn get_daily(State(state): State<ApiState>, Query(params): Query<RangeParams>) -> Response {
    let query = match query_or_400(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match state.service.daily(&query).await {
        Ok(daily) => ApiResponse::ok(daily.as_ref()),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/diagnostics?from&to&machine
pub async fn get_diagnostics(State(state): State<ApiState>, Query(params): Query<RangeParams>) -> Response {
    let query = match query_or_400(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match state.service.diagnostics(&query).await {
        Ok(rows) => ApiResponse::ok(rows),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/downtime-reasons?from&to&machine&weekdays_only&kind
pub async fn get_downtime_reasons(
    State(state): State<ApiState>,
    Query(params): Query<RangeParams>,
) -> Response {
    let query = match query_or_400(params) {
        Ok(q) => q,
        Err(resp) => return resp,
    };
    match state.service.downtime_reasons(&query).await {
        Ok(summary) => ApiResponse::ok(summary),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/config - the active mapping snapshot
pub async fn get_config(State(state): State<ApiState>) -> Response {
    let config = state.service.config();
    ApiResponse::ok(config.as_ref())
}

/// POST /api/v1/config/reload
pub async fn reload_config(State(state): State<ApiState>) -> Response {
    match state.service.reload_config() {
        Ok(summary) => ApiResponse::ok(serde_json::json!({
            "reloaded": true,
            "path": summary.path.display().to_string(),
            "known_lines": summary.known_lines,
            "changes": summary.changes,
            "message": format!("{} section(s) updated", summary.changes.len())
        })),
        Err(e) => ApiErrorResponse::internal(format!("Reload failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_default_range_is_last_30_days() {
        let range = resolve_range(None, None, d(2024, 3, 31)).unwrap();
        assert_eq!(range.to, d(2024, 3, 31));
        assert_eq!(range.from, d(2024, 3, 2));
        assert_eq!(range.len_days(), 30);
    }

    #[test]
    fn test_only_to_given() {
        let range = resolve_range(None, Some("2024-01-30"), d(2024, 6, 1)).unwrap();
        assert_eq!(range.from, d(2024, 1, 1));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let err = resolve_range(Some("2024-03-05"), Some("2024-03-01"), d(2024, 6, 1)).unwrap_err();
        assert!(err.contains("after"));
    }

    #[test]
    fn test_default_window_before_min_date_rejected() {
        let err = resolve_range(None, Some("-262143-01-01"), d(2024, 6, 1)).unwrap_err();
        assert!(err.contains("default"));
        // An explicit `from` near the minimum date is still accepted
        let range = resolve_range(Some("-262143-01-01"), Some("-262143-01-02"), d(2024, 6, 1)).unwrap();
        assert_eq!(range.len_days(), 2);
    }

    #[test]
    fn test_bad_date_rejected() {
        assert!(resolve_range(Some("03/05/2024"), None, d(2024, 6, 1)).is_err());
    }

    #[test]
    fn test_params_into_query() {
        let params = RangeParams {
            from: Some("2024-03-01".into()),
            to: Some("2024-03-07".into()),
            machine: Some("EX-1".into()),
            weekdays_only: Some("true".into()),
            kind: Some("maint".into()),
        };
        let q = params.into_query(d(2024, 6, 1)).unwrap();
        assert_eq!(q.machine.as_deref(), Some("EX-1"));
        assert!(q.weekdays_only);
        assert_eq!(q.kind, AllocationKind::Maint);
    }

    #[test]
    fn test_bad_kind_and_flag() {
        let params = RangeParams { kind: Some("downtime".into()), ..Default::default() };
        assert!(params.into_query(d(2024, 6, 1)).is_err());
        let params = RangeParams { weekdays_only: Some("maybe".into()), ..Default::default() };
        assert!(params.into_query(d(2024, 6, 1)).is_err());
    }
}
