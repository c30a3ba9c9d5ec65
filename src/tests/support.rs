//! Shared helpers for the endpoint tests: an app instance backed by a
//! temporary SQLite file, plus request and seeding shortcuts.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::NamedTempFile;
use tower::ServiceExt;

use crate::config::{AppConfig, AuthConfig, DatabaseConfig, ServerConfig};
use crate::middleware;
use crate::routes;
use crate::state::AppState;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    // Keeps the on-disk database file alive for the duration of the test.
    _db_file: NamedTempFile,
}

pub async fn setup_test_app() -> TestApp {
    let db_file = NamedTempFile::new().unwrap();
    let db_url = format!("sqlite:{}", db_file.path().display());

    let pool = SqlitePoolOptions::new().max_connections(1).connect(&db_url).await.unwrap();
    crate::db::init_db(&pool).await.unwrap();

    let config = AppConfig {
        server: ServerConfig { host: "127.0.0.1".to_string(), port: 8087 },
        database: DatabaseConfig { url: db_url },
        // Lowest allowed cost so the bcrypt calls do not dominate test time
        auth: AuthConfig { bcrypt_cost: 4, min_password_len: 8 },
        security: None,
    };

    let state = AppState::new(pool, config);
    let app = routes::api_router(state.clone()).layer(from_fn_with_state(
        state.config.clone(),
        middleware::security_headers::security_headers_middleware,
    ));

    TestApp { app, state, _db_file: db_file }
}

/// Fires a single request at the router, optionally with a bearer token and a
/// JSON body.
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Registers an account with the given role and returns `(token, user_id)`.
pub async fn register_user(app: &Router, username: &str, role: &str) -> (String, String) {
    let response = send(
        app,
        "POST",
        "/auth/users",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "sehr-geheim",
            "role": role,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    (
        json["token"].as_str().unwrap().to_string(),
        json["user"]["id"].as_str().unwrap().to_string(),
    )
}

/// Creates a book via the API and returns its id.
pub async fn create_book(app: &Router, staff_token: &str, title: &str) -> String {
    let response = send(
        app,
        "POST",
        "/books",
        Some(staff_token),
        Some(json!({ "title": title, "author": "Testautor" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["id"].as_str().unwrap().to_string()
}

/// Creates a physical copy via the API and returns its id.
pub async fn create_copy(app: &Router, staff_token: &str, book_id: &str, location: &str) -> String {
    let response = send(
        app,
        "POST",
        "/availablebooks",
        Some(staff_token),
        Some(json!({ "book_id": book_id, "location": location })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["id"].as_str().unwrap().to_string()
}
