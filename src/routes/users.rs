use super::{RouteConflict, RouteTable};
use crate::{AppState, handlers};
use axum::http::Method;

/// Users Router Module
///
/// One handler per method and path on the `/users` resource. Which of these require a role
/// is decided by `AccessPolicy`, not by the router, so the same table serves every policy.
pub fn user_routes() -> Result<RouteTable<AppState>, RouteConflict> {
    RouteTable::new()
        // GET /users
        .route(Method::GET, "/users", handlers::list_users)?
        // POST /users
        .route(Method::POST, "/users", handlers::create_user)?
        // GET /users/{id}
        .route(Method::GET, "/users/{id}", handlers::get_user)?
        // PUT /users/{id}
        // Partial update; omitted fields are left unchanged.
        .route(Method::PUT, "/users/{id}", handlers::update_user)?
        // DELETE /users/{id}
        // Echoes the deleted record.
        .route(Method::DELETE, "/users/{id}", handlers::delete_user)
}
