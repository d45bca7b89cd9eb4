use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceExt;
use user_directory::{
    AccessPolicy, AppConfig, AppState, InMemoryRepository, Operation, create_router,
    models::{Role, User},
    repository::RepositoryState,
};

// --- Test Harness ---

const REGULAR_ID: i64 = 1;
const ADMIN_ID: i64 = 2;

fn seeded_repo() -> RepositoryState {
    Arc::new(InMemoryRepository::with_users([
        User {
            id: REGULAR_ID,
            username: "alice".into(),
            email: "alice@x.com".into(),
            role: Role::User,
        },
        User {
            id: ADMIN_ID,
            username: "root".into(),
            email: "root@x.com".into(),
            role: Role::Admin,
        },
    ]))
}

fn app_with_policy(policy: AccessPolicy) -> Router {
    let config = AppConfig {
        access_policy: policy,
        ..AppConfig::default()
    };
    create_router(AppState::new(seeded_repo(), config)).expect("routes register cleanly")
}

fn app() -> Router {
    app_with_policy(AccessPolicy::default())
}

/// Sends one request through the router and returns the status and parsed JSON body
/// (`Value::Null` for non-JSON bodies).
async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    caller: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = caller {
        builder = builder.header("x-user-id", id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// --- Scenarios ---

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_get_with_unparsable_id_is_400() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/users/abc", Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid id" }));

    let (status, _) = send(&app, Method::GET, "/users/42abc", Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_missing_user_is_404() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/users/999", Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "User not found" }));
}

#[tokio::test]
async fn test_create_returns_201_with_default_role() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "bob", "email": "bob@x.com" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["username"], "bob");
    assert_eq!(body["email"], "bob@x.com");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_create_ignores_a_role_in_the_body() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "mallory", "email": "m@x.com", "role": "admin" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn test_create_validation_errors() {
    let app = app();
    for payload in [
        json!({ "username": "", "email": "e@x.com" }),
        json!({ "username": "eve" }),
        json!({}),
    ] {
        let (status, body) = send(&app, Method::POST, "/users", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    // Nothing was written.
    let (_, list) = send(&app, Method::GET, "/users", Some(REGULAR_ID), None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn test_malformed_body_uses_error_envelope() {
    let app = app();
    let request = Request::post("/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body, json!({ "error": "invalid request body" }));
}

#[tokio::test]
async fn test_duplicate_email_is_409() {
    let app = app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "alice2", "email": "alice@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_list_gate() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/users", Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = send(&app, Method::GET, "/users", Some(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "forbidden" }));

    let (status, _) = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Unknown caller id: lookup misses, access is denied.
    let (status, _) = send(&app, Method::GET, "/users", Some(404), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_path_id_is_not_the_caller() {
    let app = app();
    // The path names a regular user, but an anonymous caller is still denied.
    let (status, _) = send(&app, Method::GET, "/users/1", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_full_lifecycle() {
    let app = app();

    let (status, created) = send(
        &app,
        Method::POST,
        "/users",
        None,
        Some(json!({ "username": "a", "email": "a@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();
    let uri = format!("/users/{id}");

    let (status, fetched) = send(&app, Method::GET, &uri, Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &uri,
        None,
        Some(json!({ "email": "a2@x.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], id);
    assert_eq!(updated["username"], "a");
    assert_eq!(updated["email"], "a2@x.com");

    let (status, deleted) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, updated);

    let (status, _) = send(&app, Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::GET, &uri, Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutations_on_bad_or_missing_ids() {
    let app = app();
    let change = Some(json!({ "username": "x" }));

    let (status, _) = send(&app, Method::PUT, "/users/1x", None, change.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::PUT, "/users/999", None, change).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::DELETE, "/users/-1", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, Method::DELETE, "/users/999", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_configured_policy_gates_mutations() {
    let policy = AccessPolicy::default().restrict(Operation::Delete, Role::Admin);
    let app = app_with_policy(policy);

    let (status, _) = send(&app, Method::DELETE, "/users/1", Some(REGULAR_ID), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::DELETE, "/users/1", Some(ADMIN_ID), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn test_served_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let address = format!("http://{}", listener.local_addr().unwrap());
    let router = app();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{address}/users"))
        .header("x-user-id", REGULAR_ID.to_string())
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), 200);
    let users: Vec<User> = response.json().await.unwrap();
    assert_eq!(users.len(), 2);

    let response = client
        .get(format!("{address}/api-docs/openapi.json"))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}
