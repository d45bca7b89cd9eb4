use crate::{
    AppState,
    auth::Caller,
    error::{ApiError, ApiResult},
    gate::CallerContext,
    models::{CreateUserRequest, ErrorBody, UpdateUserRequest, User},
    resolver::ParseError,
};
use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
};

// Handlers only translate between HTTP and the service: they collect the raw path id and
// the caller principal into a `CallerContext`, call the matching `UserService` operation,
// and let `ApiError` render failures.

/// list_users
///
/// Lists every user record. Gated by the `list` rule of the access policy.
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn list_users(
    Caller(principal): Caller,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<User>>> {
    let ctx = CallerContext::new(principal);
    Ok(Json(state.users.list(&ctx).await?))
}

/// get_user
///
/// Retrieves a single user by id. Gated by the `get` rule.
#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id (base-10 digits)")),
    responses(
        (status = 200, description = "Found", body = User),
        (status = 400, description = "Invalid id", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    Caller(principal): Caller,
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<User>> {
    let ctx = CallerContext::for_id(principal, raw_id(id)?);
    Ok(Json(state.users.get(&ctx).await?))
}

/// create_user
///
/// Creates a user with role `user`. Responds 201 with the stored record.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Missing or empty field", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn create_user(
    Caller(principal): Caller,
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let Json(req) = payload.map_err(body_error)?;
    let ctx = CallerContext::new(principal);
    let user = state.users.create(&ctx, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// update_user
///
/// Partially updates a user. Omitted fields keep their value.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id (base-10 digits)")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid id or empty field", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn update_user(
    Caller(principal): Caller,
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> ApiResult<Json<User>> {
    let ctx = CallerContext::for_id(principal, raw_id(id)?);
    let Json(req) = payload.map_err(body_error)?;
    Ok(Json(state.users.update(&ctx, req).await?))
}

/// delete_user
///
/// Deletes a user and echoes the removed record.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = String, Path, description = "User id (base-10 digits)")),
    responses(
        (status = 200, description = "Deleted", body = User),
        (status = 400, description = "Invalid id", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    Caller(principal): Caller,
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Json<User>> {
    let ctx = CallerContext::for_id(principal, raw_id(id)?);
    Ok(Json(state.users.delete(&ctx).await?))
}

fn raw_id(id: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    match id {
        Ok(Path(raw)) => Ok(raw),
        Err(rejection) => Err(ApiError::Parse(ParseError {
            raw: rejection.body_text(),
        })),
    }
}

fn body_error(rejection: JsonRejection) -> ApiError {
    tracing::debug!(error = %rejection.body_text(), "request body rejected");
    ApiError::validation("invalid request body")
}
