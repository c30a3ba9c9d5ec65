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
    db::is_unique_violation,
    error::{AppError, AppResult},
    state::AppState,
    types::{BorrowDto, CreateBorrowRequest, CreateNestedBorrowRequest},
};

const BORROW_SELECT: &str = r#"SELECT br.id, br.user_id, u.username, br.copy_id, c.location,
       c.book_id, b.title AS book_title, br.borrow_date, br.returned_at
  FROM borrows br
  JOIN users u ON u.id = br.user_id
  JOIN copies c ON c.id = br.copy_id
  JOIN books b ON b.id = c.book_id"#;

fn borrow_from_row(r: &SqliteRow) -> AppResult<BorrowDto> {
    Ok(BorrowDto {
        id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
        user_id: super::parse_db_uuid(r.get::<String, _>("user_id").as_str())?,
        username: r.get("username"),
        copy_id: super::parse_db_uuid(r.get::<String, _>("copy_id").as_str())?,
        location: r.get("location"),
        book_id: super::parse_db_uuid(r.get::<String, _>("book_id").as_str())?,
        book_title: r.get("book_title"),
        borrow_date: r.get("borrow_date"),
        returned_at: r.get("returned_at"),
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct BorrowListQuery {
    /// `me` restricts the listing to the caller; staff may also pass a user id.
    pub user: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /borrows` - authenticated. Staff see everything; regular users only
/// ever see their own borrows, regardless of the `user` parameter.
pub async fn list_borrows(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Query(q): Query<BorrowListQuery>,
) -> AppResult<impl IntoResponse> {
    let scope_user: Option<Uuid> = match q.user.as_deref() {
        Some("me") => Some(user.id()),
        Some(other) => {
            user.require_staff()?;
            let id = Uuid::parse_str(other)
                .map_err(|_| AppError::BadRequest(format!("invalid user filter: {}", other)))?;
            Some(id)
        }
        None if user.is_staff() => None,
        None => Some(user.id()),
    };

    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = match scope_user {
        Some(uid) => {
            let sql = format!(
                "{} WHERE br.user_id = ?1 ORDER BY br.borrow_date DESC LIMIT ?2 OFFSET ?3",
                BORROW_SELECT
            );
            sqlx::query(&sql)
                .bind(uid.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&state.db)
                .await?
        }
        None => {
            let sql = format!("{} ORDER BY br.borrow_date DESC LIMIT ?1 OFFSET ?2", BORROW_SELECT);
            sqlx::query(&sql).bind(limit).bind(offset).fetch_all(&state.db).await?
        }
    };

    let items = rows.iter().map(borrow_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `GET /borrows/{id}` - staff or the borrowing user. Others get 404 rather
/// than 403 so borrow ids do not leak.
pub async fn get_borrow(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sql = format!("{} WHERE br.id = ?1", BORROW_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&state.db).await?;
    let Some(row) = row else {
        return Err(AppError::NotFound("borrow not found".to_string()));
    };
    let dto = borrow_from_row(&row)?;
    if !user.is_staff() && dto.user_id != user.id() {
        return Err(AppError::NotFound("borrow not found".to_string()));
    }
    Ok(Json(dto))
}

/// `POST /borrows` - staff records a loan of a copy to a user.
pub async fn create_borrow(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Json(req): Json<CreateBorrowRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let copy = sqlx::query(r#"SELECT 1 FROM copies WHERE id = ?1"#)
        .bind(req.copy_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if copy.is_none() {
        return Err(AppError::NotFound("copy not found".to_string()));
    }

    let id = insert_open_borrow(&state, req.user_id, req.copy_id).await?;
    let dto = fetch_borrow(&state, id).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `POST /borrows/{id}/return` - staff closes a loan by stamping the return
/// date, which makes the copy available again.
pub async fn return_borrow(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let exists = sqlx::query(r#"SELECT 1 FROM borrows WHERE id = ?1"#)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("borrow not found".to_string()));
    }

    // Guarded update: only an open borrow can be returned, and stamping the
    // date also releases the slot held by the partial unique index.
    let res = sqlx::query(
        r#"UPDATE borrows SET returned_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
           WHERE id = ?1 AND returned_at IS NULL"#,
    )
    .bind(id.to_string())
    .execute(&state.db)
    .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::BadRequest("borrow already returned".to_string()));
    }

    state.metrics.inc_borrows_returned();
    tracing::info!(borrow_id = %id, "borrow returned");

    let dto = fetch_borrow(&state, id).await?;
    Ok(Json(dto))
}

/// `GET /books/{id}/availablebooks/{copy_id}/borrows` - borrow history of one
/// copy, authenticated.
pub async fn list_copy_borrows(
    State(state): State<AppState>,
    _user: AuthorizedUser,
    Path((book_id, copy_id)): Path<(Uuid, Uuid)>,
) -> AppResult<impl IntoResponse> {
    ensure_copy_of_book(&state, book_id, copy_id).await?;

    let sql = format!("{} WHERE br.copy_id = ?1 ORDER BY br.borrow_date DESC", BORROW_SELECT);
    let rows = sqlx::query(&sql).bind(copy_id.to_string()).fetch_all(&state.db).await?;
    let items = rows.iter().map(borrow_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `POST /books/{id}/availablebooks/{copy_id}/borrows` - staff only; the copy
/// comes from the path.
pub async fn create_copy_borrow(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path((book_id, copy_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<CreateNestedBorrowRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    ensure_copy_of_book(&state, book_id, copy_id).await?;

    let id = insert_open_borrow(&state, req.user_id, copy_id).await?;
    let dto = fetch_borrow(&state, id).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// Atomic conditional insert: the borrow row is only written when the copy has
/// no open borrow, in a single statement. Two racing requests cannot both
/// succeed; even if one slips past the WHERE clause, the partial unique index
/// on `borrows(copy_id) WHERE returned_at IS NULL` rejects it.
async fn insert_open_borrow(state: &AppState, user_id: Uuid, copy_id: Uuid) -> AppResult<Uuid> {
    let target = sqlx::query(r#"SELECT 1 FROM users WHERE id = ?1"#)
        .bind(user_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if target.is_none() {
        return Err(AppError::NotFound("user not found".to_string()));
    }

    let id = Uuid::new_v4();
    let res = sqlx::query(
        r#"INSERT INTO borrows (id, user_id, copy_id)
           SELECT ?1, ?2, ?3
           WHERE NOT EXISTS (SELECT 1 FROM borrows WHERE copy_id = ?3 AND returned_at IS NULL)"#,
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .bind(copy_id.to_string())
    .execute(&state.db)
    .await;

    let rows = match res {
        Ok(r) => r.rows_affected(),
        Err(e) if is_unique_violation(&e, "borrows.copy_id") => 0,
        Err(e) => return Err(e.into()),
    };
    if rows == 0 {
        state.metrics.inc_borrow_conflicts();
        return Err(AppError::BadRequest("copy is currently borrowed".to_string()));
    }

    state.metrics.inc_borrows_created();
    tracing::info!(borrow_id = %id, user_id = %user_id, copy_id = %copy_id, "borrow created");
    Ok(id)
}

async fn fetch_borrow(state: &AppState, id: Uuid) -> AppResult<BorrowDto> {
    let sql = format!("{} WHERE br.id = ?1", BORROW_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_one(&state.db).await?;
    borrow_from_row(&row)
}

async fn ensure_copy_of_book(state: &AppState, book_id: Uuid, copy_id: Uuid) -> AppResult<()> {
    let row = sqlx::query(r#"SELECT 1 FROM copies WHERE id = ?1 AND book_id = ?2"#)
        .bind(copy_id.to_string())
        .bind(book_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if row.is_none() {
        return Err(AppError::NotFound("copy not found for this book".to_string()));
    }
    Ok(())
}
