use axum::http::StatusCode;
use serde_json::json;

use super::support::{body_json, create_book, register_user, send, setup_test_app};

#[tokio::test]
async fn test_healthz_endpoint() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_present() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/healthz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers.contains_key("x-content-type-options"));
    assert!(headers.contains_key("x-frame-options"));
    assert!(headers.contains_key("referrer-policy"));
    assert!(headers.contains_key("permissions-policy"));
    assert!(headers.contains_key("cross-origin-opener-policy"));
    assert!(headers.contains_key("cross-origin-resource-policy"));
}

#[tokio::test]
async fn test_readyz_endpoint() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/readyz", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/metrics", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json.get("uptime_seconds").is_some());
    assert!(json.get("users_registered").is_some());
    assert!(json.get("borrows_created").is_some());
    assert!(json.get("reviews_created").is_some());
}

#[tokio::test]
async fn test_version_endpoint() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/version", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json.get("name").is_some());
    assert!(json.get("version").is_some());
    assert!(json.get("build").is_some());
}

#[tokio::test]
async fn test_register_returns_token() {
    let t = setup_test_app().await;

    let response = send(
        &t.app,
        "POST",
        "/auth/users",
        None,
        Some(json!({
            "username": "lena",
            "email": "lena@example.com",
            "password": "sehr-geheim",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert!(json["token"].as_str().unwrap().len() > 16);
    assert_eq!(json["user"]["username"], "lena");
    // Without an explicit role a new account is a regular user
    assert_eq!(json["user"]["role"], "user");
}

#[tokio::test]
async fn test_register_duplicate_username_is_rejected() {
    let t = setup_test_app().await;
    register_user(&t.app, "lena", "user").await;

    let response = send(
        &t.app,
        "POST",
        "/auth/users",
        None,
        Some(json!({
            "username": "lena",
            "email": "other@example.com",
            "password": "sehr-geheim",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_register_short_password_is_rejected() {
    let t = setup_test_app().await;

    let response = send(
        &t.app,
        "POST",
        "/auth/users",
        None,
        Some(json!({
            "username": "kurz",
            "email": "kurz@example.com",
            "password": "abc",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_and_wrong_password() {
    let t = setup_test_app().await;
    register_user(&t.app, "lena", "user").await;

    let response = send(
        &t.app,
        "POST",
        "/auth/sessions",
        None,
        Some(json!({ "username": "lena", "password": "sehr-geheim" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["token"].as_str().is_some());

    let response = send(
        &t.app,
        "POST",
        "/auth/sessions",
        None,
        Some(json!({ "username": "lena", "password": "falsch-falsch" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_unknown_username() {
    let t = setup_test_app().await;

    let response = send(
        &t.app,
        "POST",
        "/auth/sessions",
        None,
        Some(json!({ "username": "niemand", "password": "sehr-geheim" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let t = setup_test_app().await;
    let (token, _) = register_user(&t.app, "chef", "staff").await;

    let response = send(&t.app, "DELETE", "/auth/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The revoked token no longer authenticates
    let response = send(
        &t.app,
        "POST",
        "/books",
        Some(&token),
        Some(json!({ "title": "Nachzügler", "author": "A" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_books_is_public() {
    let t = setup_test_app().await;

    let response = send(&t.app, "GET", "/books", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_book_requires_auth() {
    let t = setup_test_app().await;

    let response = send(
        &t.app,
        "POST",
        "/books",
        None,
        Some(json!({ "title": "Anonym", "author": "A" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_book_requires_staff_role() {
    let t = setup_test_app().await;
    let (token, _) = register_user(&t.app, "leser", "user").await;

    let response = send(
        &t.app,
        "POST",
        "/books",
        Some(&token),
        Some(json!({ "title": "Verboten", "author": "A" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_and_get_book() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;

    let response = send(
        &t.app,
        "POST",
        "/books",
        Some(&staff),
        Some(json!({
            "title": "Der Prozess",
            "author": "Franz Kafka",
            "published_date": "1925-04-26",
            "genre": "Roman",
            "isbn": "9783596200597",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    // No copies yet, so the book cannot be available
    assert_eq!(created["is_available"], false);

    let id = created["id"].as_str().unwrap();
    let response = send(&t.app, "GET", &format!("/books/{}", id), None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["title"], "Der Prozess");
    assert_eq!(json["isbn"], "9783596200597");
}

#[tokio::test]
async fn test_create_book_duplicate_isbn() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;

    let body = json!({ "title": "Original", "author": "A", "isbn": "9783596200597" });
    let response = send(&t.app, "POST", "/books", Some(&staff), Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = json!({ "title": "Doppelt", "author": "B", "isbn": "9783596200597" });
    let response = send(&t.app, "POST", "/books", Some(&staff), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_book_null_clears_isbn() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;

    let response = send(
        &t.app,
        "POST",
        "/books",
        Some(&staff),
        Some(json!({ "title": "Der Prozess", "author": "Franz Kafka", "isbn": "9783596200597" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();
    let uri = format!("/books/{}", id);

    // A body without the field keeps the stored ISBN
    let response =
        send(&t.app, "PATCH", &uri, Some(&staff), Some(json!({ "genre": "Roman" }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["isbn"], "9783596200597");

    // An explicit null clears it
    let response = send(&t.app, "PATCH", &uri, Some(&staff), Some(json!({ "isbn": null }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["isbn"].is_null());

    let response = send(&t.app, "GET", &uri, None, None).await;
    let json = body_json(response).await;
    assert!(json["isbn"].is_null());
}

#[tokio::test]
async fn test_book_search_filter() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    create_book(&t.app, &staff, "Die Verwandlung").await;
    create_book(&t.app, &staff, "Faust").await;

    let response = send(&t.app, "GET", "/books?search=Verwandlung", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Die Verwandlung");
}

#[tokio::test]
async fn test_delete_book_requires_staff() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, _) = register_user(&t.app, "leser", "user").await;
    let book_id = create_book(&t.app, &staff, "Löschkandidat").await;

    let response = send(&t.app, "DELETE", &format!("/books/{}", book_id), Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, "DELETE", &format!("/books/{}", book_id), Some(&staff), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&t.app, "GET", &format!("/books/{}", book_id), None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_book_not_found() {
    let t = setup_test_app().await;

    let missing_id = uuid::Uuid::new_v4();
    let response = send(&t.app, "GET", &format!("/books/{}", missing_id), None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_users_me() {
    let t = setup_test_app().await;
    let (token, user_id) = register_user(&t.app, "lena", "user").await;

    let response = send(&t.app, "GET", "/users/me", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], user_id.as_str());
    assert_eq!(json["username"], "lena");
}

#[tokio::test]
async fn test_list_users_requires_staff() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, _) = register_user(&t.app, "leser", "user").await;

    let response = send(&t.app, "GET", "/users", Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, "GET", "/users", Some(&staff), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_user_update_leaves_row_unchanged() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (_, user_id) = register_user(&t.app, "leser", "user").await;

    // Valid email paired with a too-short password; the whole update must be
    // rejected without applying the email change
    let response = send(
        &t.app,
        "PATCH",
        &format!("/users/{}", user_id),
        Some(&staff),
        Some(json!({ "email": "neu@example.com", "password": "kurz" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&t.app, "GET", &format!("/users/{}", user_id), Some(&staff), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["email"], "leser@example.com");
    assert_eq!(json["role"], "user");
}

#[tokio::test]
async fn test_update_user_role() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (_, user_id) = register_user(&t.app, "leser", "user").await;

    let response = send(
        &t.app,
        "PATCH",
        &format!("/users/{}", user_id),
        Some(&staff),
        Some(json!({ "role": "staff" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["role"], "staff");
}
