use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request pipeline: resolver -> gate -> service, fronted by handlers.
pub mod resolver;
pub mod gate;
pub mod service;
pub mod handlers;

// Supporting layers.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;

pub mod routes;
use routes::{RouteConflict, public, users};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult, StoreError};
pub use gate::{AccessGate, AccessPolicy, CallerContext, Decision, Operation};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::UserService;

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI document
/// served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_users, handlers::get_user, handlers::create_user,
        handlers::update_user, handlers::delete_user
    ),
    components(
        schemas(
            models::User, models::Role, models::CreateUserRequest,
            models::UpdateUserRequest, models::ErrorBody,
        )
    ),
    tags(
        (name = "users", description = "User directory API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single shared container for request handling: the record store, the user service
/// (which owns the access gate), and the immutable configuration. Cloning is cheap; every
/// field is either an `Arc` or small.
#[derive(Clone)]
pub struct AppState {
    /// Record store shared with the gate and the service.
    pub repo: RepositoryState,
    /// The five user operations.
    pub users: UserService,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires the gate and the service to `repo`, using the access policy from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        let gate = AccessGate::new(config.access_policy.clone(), repo.clone());
        let users = UserService::new(repo.clone(), gate);
        Self {
            repo,
            users,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every route table, applies the observability and CORS layers, and attaches the
/// state. Fails if any method+path pair is registered twice.
pub fn create_router(state: AppState) -> Result<Router, RouteConflict> {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let api = public::public_routes()?
        .merge(users::user_routes()?)?
        .into_router();

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .with_state(state);

    Ok(base_router
        .layer(
            ServiceBuilder::new()
                // Generates an x-request-id for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // Echoes the request id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors))
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: every log line of one request carries its method, uri and
/// request id.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
