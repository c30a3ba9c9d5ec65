//! HTTP route handlers for the BuchWart API.
//!
//! Each sub-module handles a specific domain of functionality:
//!
//! - `auth`: registration, login and logout
//! - `books`: book catalogue CRUD and nested sub-resources
//! - `copies`: physical copies ("availablebooks") of a book
//! - `borrows`: borrow/return bookkeeping
//! - `reviews`: user reviews of books
//! - `users`: user administration
//! - `health`: health check and system status endpoints

use axum::{
    routing::{delete, get, post},
    Router,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub mod auth;
pub mod books;
pub mod borrows;
pub mod copies;
pub mod health;
pub mod reviews;
pub mod users;

/// Builds the full API router. Shared between `main` (which stacks the
/// middleware layers on top) and the integration tests.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/auth/users", post(auth::register))
        .route("/auth/sessions", post(auth::login))
        .route("/auth/logout", delete(auth::logout))
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/{id}",
            get(books::get_book)
                .put(books::update_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/{id}/availablebooks", get(books::list_book_copies))
        .route(
            "/books/{id}/reviews",
            get(reviews::list_book_reviews).post(reviews::create_book_review),
        )
        .route(
            "/books/{id}/availablebooks/{copy_id}/borrows",
            get(borrows::list_copy_borrows).post(borrows::create_copy_borrow),
        )
        .route("/availablebooks", get(copies::list_copies).post(copies::create_copy))
        .route(
            "/availablebooks/{id}",
            get(copies::get_copy)
                .put(copies::update_copy)
                .patch(copies::update_copy)
                .delete(copies::delete_copy),
        )
        .route("/borrows", get(borrows::list_borrows).post(borrows::create_borrow))
        .route("/borrows/{id}", get(borrows::get_borrow))
        .route("/borrows/{id}/return", post(borrows::return_borrow))
        .route("/reviews", get(reviews::list_reviews).post(reviews::create_review))
        .route(
            "/reviews/{id}",
            get(reviews::get_review)
                .put(reviews::update_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route(
            "/users/{id}",
            get(users::get_user).patch(users::update_user).delete(users::delete_user),
        )
        .with_state(state)
}

/// Parses a UUID column read back from the database. Ids are written by this
/// application, so a parse failure means a corrupt row, not client error.
pub(crate) fn parse_db_uuid(s: &str) -> AppResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt uuid in db: {}", e)))
}
