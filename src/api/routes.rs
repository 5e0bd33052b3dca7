//! API route definitions
//!
//! - /api/v1/health - Liveness plus source and mapping info
//! - /api/v1/summary - Range totals, ratios and daily rows
//! - /api/v1/daily - Daily fleet aggregates
//! - /api/v1/diagnostics - Per machine-day audit records
//! - /api/v1/downtime-reasons - Downtime attributed to reason buckets
//! - /api/v1/config - Active mapping snapshot, and reload

use axum::routing::{get, post};
use axum::Router;

use super::handlers::{self, ApiState};

/// Create all v1 API routes.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/summary", get(handlers::get_summary))
        .route("/daily", get(handlers::get_daily))
        .route("/diagnostics", get(handlers::get_diagnostics))
        .route("/downtime-reasons", get(handlers::get_downtime_reasons))
        .route("/config", get(handlers::get_config))
        .route("/config/reload", post(handlers::reload_config))
        .with_state(state)
}
