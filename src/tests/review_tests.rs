use axum::http::StatusCode;
use serde_json::json;

use super::support::{body_json, create_book, register_user, send, setup_test_app};

#[tokio::test]
async fn test_any_authenticated_user_can_review() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, user_id) = register_user(&t.app, "leser", "user").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    let response = send(
        &t.app,
        "POST",
        "/reviews",
        Some(&user),
        Some(json!({ "book_id": book_id, "rating": 5, "comment": "Großartig" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["rating"], 5);
    assert_eq!(json["comment"], "Großartig");
    // Attributed to the caller
    assert_eq!(json["user_id"], user_id.as_str());
}

#[tokio::test]
async fn test_review_requires_auth() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    let response = send(
        &t.app,
        "POST",
        "/reviews",
        None,
        Some(json!({ "book_id": book_id, "rating": 3 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_rating_out_of_range_is_rejected() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    for rating in [0, 6, -1] {
        let response = send(
            &t.app,
            "POST",
            "/reviews",
            Some(&staff),
            Some(json!({ "book_id": book_id, "rating": rating })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "rating {}", rating);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_review_of_missing_book() {
    let t = setup_test_app().await;
    let (user, _) = register_user(&t.app, "leser", "user").await;

    let missing = uuid::Uuid::new_v4();
    let response = send(
        &t.app,
        "POST",
        "/reviews",
        Some(&user),
        Some(json!({ "book_id": missing, "rating": 4 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_nested_review_listing_is_public() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, _) = register_user(&t.app, "leser", "user").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    let uri = format!("/books/{}/reviews", book_id);
    let response = send(&t.app, "POST", &uri, Some(&user), Some(json!({ "rating": 4 }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Listing needs no token
    let response = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["rating"], 4);
    assert_eq!(items[0]["username"], "leser");
}

#[tokio::test]
async fn test_reviews_for_missing_book() {
    let t = setup_test_app().await;

    let missing = uuid::Uuid::new_v4();
    let response = send(&t.app, "GET", &format!("/books/{}/reviews", missing), None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_review_is_staff_only() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, _) = register_user(&t.app, "leser", "user").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    let response = send(
        &t.app,
        "POST",
        "/reviews",
        Some(&user),
        Some(json!({ "book_id": book_id, "rating": 2, "comment": "naja" })),
    )
    .await;
    let review_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let uri = format!("/reviews/{}", review_id);

    // The author cannot moderate their own review
    let response = send(&t.app, "PATCH", &uri, Some(&user), Some(json!({ "rating": 5 }))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, "PATCH", &uri, Some(&staff), Some(json!({ "rating": 3 }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["rating"], 3);
    assert_eq!(json["comment"], "naja");
}

#[tokio::test]
async fn test_delete_review_is_staff_only() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let (user, _) = register_user(&t.app, "leser", "user").await;
    let book_id = create_book(&t.app, &staff, "Die Verwandlung").await;

    let response = send(
        &t.app,
        "POST",
        "/reviews",
        Some(&user),
        Some(json!({ "book_id": book_id, "rating": 1 })),
    )
    .await;
    let review_id = body_json(response).await["id"].as_str().unwrap().to_string();
    let uri = format!("/reviews/{}", review_id);

    let response = send(&t.app, "DELETE", &uri, Some(&user), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&t.app, "DELETE", &uri, Some(&staff), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&t.app, "GET", &uri, None, None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_reviews_filtered_by_book() {
    let t = setup_test_app().await;
    let (staff, _) = register_user(&t.app, "chef", "staff").await;
    let book_a = create_book(&t.app, &staff, "Buch A").await;
    let book_b = create_book(&t.app, &staff, "Buch B").await;

    for (book, rating) in [(&book_a, 5), (&book_b, 2)] {
        let response = send(
            &t.app,
            "POST",
            "/reviews",
            Some(&staff),
            Some(json!({ "book_id": book, "rating": rating })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(&t.app, "GET", &format!("/reviews?book={}", book_a), None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["rating"], 5);
}
