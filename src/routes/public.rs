use super::{RouteConflict, RouteTable};
use crate::AppState;
use axum::http::Method;

/// Public Router Module
///
/// Endpoints with no access rule and no store access.
pub fn public_routes() -> Result<RouteTable<AppState>, RouteConflict> {
    RouteTable::new()
        // GET /health
        // Used by monitoring and load balancer checks.
        .route(Method::GET, "/health", || async { "ok" })
}
