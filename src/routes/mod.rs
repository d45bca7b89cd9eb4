//! Router Module Index
//!
//! Routes are registered through `RouteTable`, which refuses a second handler for the same
//! method and path instead of letting one silently shadow or merge into the other.

/// Unauthenticated operational endpoints (health check).
pub mod public;

/// The `/users` resource. Access control happens inside the service via the gate.
pub mod users;

use axum::{
    Router,
    handler::Handler,
    http::Method,
    routing::{MethodFilter, on},
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteConflict {
    #[error("route {method} {path} is registered more than once")]
    Duplicate { method: Method, path: &'static str },
    #[error("method {0} cannot be routed")]
    UnsupportedMethod(Method),
}

/// RouteTable
///
/// A thin registration layer over `axum::Router` that records every `(method, path)` pair
/// and fails on the first collision.
pub struct RouteTable<S = ()> {
    router: Router<S>,
    registered: HashSet<(Method, &'static str)>,
}

impl<S> Default for RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self {
            router: Router::new(),
            registered: HashSet::new(),
        }
    }
}

impl<S> RouteTable<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<H, T>(
        mut self,
        method: Method,
        path: &'static str,
        handler: H,
    ) -> Result<Self, RouteConflict>
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|_| RouteConflict::UnsupportedMethod(method.clone()))?;
        if !self.registered.insert((method.clone(), path)) {
            return Err(RouteConflict::Duplicate { method, path });
        }
        self.router = self.router.route(path, on(filter, handler));
        Ok(self)
    }

    /// Folds another table into this one, re-checking every pair it registered.
    pub fn merge(mut self, other: RouteTable<S>) -> Result<Self, RouteConflict> {
        for (method, path) in &other.registered {
            if self.registered.contains(&(method.clone(), *path)) {
                return Err(RouteConflict::Duplicate {
                    method: method.clone(),
                    path: *path,
                });
            }
        }
        self.registered.extend(other.registered);
        self.router = self.router.merge(other.router);
        Ok(self)
    }

    pub fn into_router(self) -> Router<S> {
        self.router
    }
}
