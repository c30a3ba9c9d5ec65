use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no auth
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let body = format!(
        "# HELP buchwart_users_registered Total users registered\n# TYPE buchwart_users_registered counter\nbuchwart_users_registered {}\n\
# HELP buchwart_logins Total successful logins\n# TYPE buchwart_logins counter\nbuchwart_logins {}\n\
# HELP buchwart_auth_failures Failed authentication attempts\n# TYPE buchwart_auth_failures counter\nbuchwart_auth_failures {}\n\
# HELP buchwart_books_created Books created\n# TYPE buchwart_books_created counter\nbuchwart_books_created {}\n\
# HELP buchwart_borrows_created Borrows created\n# TYPE buchwart_borrows_created counter\nbuchwart_borrows_created {}\n\
# HELP buchwart_borrows_returned Borrows returned\n# TYPE buchwart_borrows_returned counter\nbuchwart_borrows_returned {}\n\
# HELP buchwart_borrow_conflicts Borrow attempts rejected because the copy was on loan\n# TYPE buchwart_borrow_conflicts counter\nbuchwart_borrow_conflicts {}\n\
# HELP buchwart_reviews_created Reviews created\n# TYPE buchwart_reviews_created counter\nbuchwart_reviews_created {}\n\
# HELP buchwart_uptime_seconds Uptime seconds\n# TYPE buchwart_uptime_seconds gauge\nbuchwart_uptime_seconds {}\n",
        m.users_registered,
        m.logins,
        m.auth_failures,
        m.books_created,
        m.borrows_created,
        m.borrows_returned,
        m.borrow_conflicts,
        m.reviews_created,
        m.uptime_seconds,
    );
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
