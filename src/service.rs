//! The five user operations, each run as resolve → validate → authorize → store → map.

use crate::error::{ApiError, ApiResult};
use crate::gate::{AccessGate, CallerContext, Operation};
use crate::models::{
    CreateUserRequest, NewUser, Role, UpdateUserRequest, User, UserChanges, UserId,
};
use crate::repository::RepositoryState;
use crate::resolver;

/// UserService
///
/// Owns the request pipeline for the `users` resource. Failures short-circuit in order:
/// a bad path id or body never reaches the gate, and a denial never reaches the store.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    gate: AccessGate,
}

impl UserService {
    pub fn new(repo: RepositoryState, gate: AccessGate) -> Self {
        Self { repo, gate }
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub async fn list(&self, ctx: &CallerContext) -> ApiResult<Vec<User>> {
        self.gate.authorize(ctx, Operation::List).await.into_result()?;
        Ok(self.repo.find_all().await?)
    }

    pub async fn get(&self, ctx: &CallerContext) -> ApiResult<User> {
        let id = resolve_requested(ctx)?;
        self.gate.authorize(ctx, Operation::Get).await.into_result()?;
        self.repo.find(id).await?.ok_or(ApiError::NotFound)
    }

    /// Role is always `user` on creation; the body cannot choose it.
    pub async fn create(&self, ctx: &CallerContext, req: CreateUserRequest) -> ApiResult<User> {
        let new_user = NewUser {
            username: required("username", req.username)?,
            email: required("email", req.email)?,
            role: Role::User,
        };
        self.gate.authorize(ctx, Operation::Create).await.into_result()?;

        let user = self.repo.create(new_user).await?;
        tracing::info!(user_id = user.id, "user created");
        Ok(user)
    }

    pub async fn update(&self, ctx: &CallerContext, req: UpdateUserRequest) -> ApiResult<User> {
        let id = resolve_requested(ctx)?;
        let changes = UserChanges {
            username: optional("username", req.username)?,
            email: optional("email", req.email)?,
        };
        self.gate.authorize(ctx, Operation::Update).await.into_result()?;

        let user = self
            .repo
            .update(id, changes)
            .await?
            .ok_or(ApiError::NotFound)?;
        tracing::info!(user_id = user.id, "user updated");
        Ok(user)
    }

    pub async fn delete(&self, ctx: &CallerContext) -> ApiResult<User> {
        let id = resolve_requested(ctx)?;
        self.gate.authorize(ctx, Operation::Delete).await.into_result()?;

        let user = self.repo.delete(id).await?.ok_or(ApiError::NotFound)?;
        tracing::info!(user_id = user.id, "user deleted");
        Ok(user)
    }
}

fn resolve_requested(ctx: &CallerContext) -> ApiResult<UserId> {
    // A context without a path id can only come from a collection route, where no
    // id-addressed operation is registered. Treat it the same as an unparsable id.
    Ok(resolver::resolve(ctx.requested_id().unwrap_or_default())?)
}

fn required(field: &str, value: Option<String>) -> ApiResult<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

fn optional(field: &str, value: Option<String>) -> ApiResult<Option<String>> {
    match value {
        Some(v) if v.is_empty() => Err(ApiError::validation(format!("{field} must not be empty"))),
        other => Ok(other),
    }
}
