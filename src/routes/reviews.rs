use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{
    auth::AuthorizedUser,
    error::{validation, AppError, AppResult, OptionExt},
    state::AppState,
    types::{CreateNestedReviewRequest, CreateReviewRequest, ReviewDto, UpdateReviewRequest},
};

const REVIEW_SELECT: &str = r#"SELECT r.id, r.user_id, u.username, r.book_id, r.rating, r.comment
  FROM reviews r JOIN users u ON u.id = r.user_id"#;

fn review_from_row(r: &SqliteRow) -> AppResult<ReviewDto> {
    Ok(ReviewDto {
        id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
        user_id: super::parse_db_uuid(r.get::<String, _>("user_id").as_str())?,
        username: r.get("username"),
        book_id: super::parse_db_uuid(r.get::<String, _>("book_id").as_str())?,
        rating: r.get("rating"),
        comment: r.get("comment"),
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct ReviewListQuery {
    pub book: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /reviews` - public, optionally filtered by book.
pub async fn list_reviews(
    State(state): State<AppState>,
    Query(q): Query<ReviewListQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = match q.book {
        Some(book_id) => {
            let sql = format!(
                "{} WHERE r.book_id = ?1 ORDER BY r.created_at DESC LIMIT ?2 OFFSET ?3",
                REVIEW_SELECT
            );
            sqlx::query(&sql)
                .bind(book_id.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&state.db)
                .await?
        }
        None => {
            let sql = format!("{} ORDER BY r.created_at DESC LIMIT ?1 OFFSET ?2", REVIEW_SELECT);
            sqlx::query(&sql).bind(limit).bind(offset).fetch_all(&state.db).await?
        }
    };

    let items = rows.iter().map(review_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `GET /reviews/{id}` - public.
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sql = format!("{} WHERE r.id = ?1", REVIEW_SELECT);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("review")?;
    Ok(Json(review_from_row(&row)?))
}

/// `POST /reviews` - any authenticated user; the review is attributed to the
/// caller, never to a user given in the body.
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Json(req): Json<CreateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let dto = insert_review(&state, &user, req.book_id, req.rating, req.comment).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `POST /books/{id}/reviews` - nested variant; the book comes from the path.
pub async fn create_book_review(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(book_id): Path<Uuid>,
    Json(req): Json<CreateNestedReviewRequest>,
) -> AppResult<impl IntoResponse> {
    let dto = insert_review(&state, &user, book_id, req.rating, req.comment).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `GET /books/{id}/reviews` - public listing of a book's reviews.
pub async fn list_book_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let exists = sqlx::query(r#"SELECT 1 FROM books WHERE id = ?1"#)
        .bind(book_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("book not found".to_string()));
    }

    let sql = format!("{} WHERE r.book_id = ?1 ORDER BY r.created_at DESC", REVIEW_SELECT);
    let rows = sqlx::query(&sql).bind(book_id.to_string()).fetch_all(&state.db).await?;
    let items = rows.iter().map(review_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `PUT/PATCH /reviews/{id}` - staff only (moderation).
pub async fn update_review(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReviewRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let sql = format!("{} WHERE r.id = ?1", REVIEW_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&state.db).await?;
    let current = match row {
        Some(r) => review_from_row(&r)?,
        None => return Err(AppError::NotFound("review not found".to_string())),
    };

    let rating = req.rating.unwrap_or(current.rating);
    let comment = req.comment.unwrap_or(current.comment);
    validation::validate_rating(rating)?;

    sqlx::query(r#"UPDATE reviews SET rating = ?1, comment = ?2 WHERE id = ?3"#)
        .bind(rating)
        .bind(&comment)
        .bind(id.to_string())
        .execute(&state.db)
        .await?;

    Ok(Json(ReviewDto { rating, comment, ..current }))
}

/// `DELETE /reviews/{id}` - staff only.
pub async fn delete_review(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    let res = sqlx::query(r#"DELETE FROM reviews WHERE id = ?1"#)
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("review not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn insert_review(
    state: &AppState,
    user: &AuthorizedUser,
    book_id: Uuid,
    rating: i64,
    comment: Option<String>,
) -> AppResult<ReviewDto> {
    validation::validate_rating(rating)?;

    let exists = sqlx::query(r#"SELECT 1 FROM books WHERE id = ?1"#)
        .bind(book_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("book not found".to_string()));
    }

    let id = Uuid::new_v4();
    let comment = comment.unwrap_or_default();
    sqlx::query(
        r#"INSERT INTO reviews (id, user_id, book_id, rating, comment) VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(id.to_string())
    .bind(user.id().to_string())
    .bind(book_id.to_string())
    .bind(rating)
    .bind(&comment)
    .execute(&state.db)
    .await?;

    state.metrics.inc_reviews_created();

    Ok(ReviewDto {
        id,
        user_id: user.id(),
        username: user.user.username.clone(),
        book_id,
        rating,
        comment,
    })
}
