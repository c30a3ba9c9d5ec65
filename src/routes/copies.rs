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
    types::{CopyDto, CreateCopyRequest, UpdateCopyRequest},
};

const COPY_SELECT: &str = r#"SELECT c.id, c.book_id, b.title AS book_title, c.location,
       NOT EXISTS(SELECT 1 FROM borrows br WHERE br.copy_id = c.id AND br.returned_at IS NULL) AS is_available
  FROM copies c JOIN books b ON b.id = c.book_id"#;

pub(crate) fn copy_from_row(r: &SqliteRow) -> AppResult<CopyDto> {
    Ok(CopyDto {
        id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
        book_id: super::parse_db_uuid(r.get::<String, _>("book_id").as_str())?,
        book_title: r.get("book_title"),
        location: r.get("location"),
        is_available: r.get::<i64, _>("is_available") != 0,
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct CopyListQuery {
    pub book: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /availablebooks` - flat listing of copies, optionally filtered by book.
pub async fn list_copies(
    State(state): State<AppState>,
    _user: AuthorizedUser,
    Query(q): Query<CopyListQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = match q.book {
        Some(book_id) => {
            let sql = format!("{} WHERE c.book_id = ?1 ORDER BY b.title ASC LIMIT ?2 OFFSET ?3", COPY_SELECT);
            sqlx::query(&sql)
                .bind(book_id.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&state.db)
                .await?
        }
        None => {
            let sql = format!("{} ORDER BY b.title ASC LIMIT ?1 OFFSET ?2", COPY_SELECT);
            sqlx::query(&sql).bind(limit).bind(offset).fetch_all(&state.db).await?
        }
    };

    let items = rows.iter().map(copy_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `GET /availablebooks/{id}`.
pub async fn get_copy(
    State(state): State<AppState>,
    _user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sql = format!("{} WHERE c.id = ?1", COPY_SELECT);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?
        .ok_or_not_found("copy")?;
    Ok(Json(copy_from_row(&row)?))
}

/// `POST /availablebooks` - staff only; registers a new physical copy.
pub async fn create_copy(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Json(req): Json<CreateCopyRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    validation::validate_required_text(&req.location, "location")?;

    let book = sqlx::query(r#"SELECT title FROM books WHERE id = ?1"#)
        .bind(req.book_id.to_string())
        .fetch_optional(&state.db)
        .await?;
    let Some(book) = book else {
        return Err(AppError::NotFound("book not found".to_string()));
    };

    let id = Uuid::new_v4();
    sqlx::query(r#"INSERT INTO copies (id, book_id, location) VALUES (?1, ?2, ?3)"#)
        .bind(id.to_string())
        .bind(req.book_id.to_string())
        .bind(&req.location)
        .execute(&state.db)
        .await?;

    tracing::info!(copy_id = %id, book_id = %req.book_id, location = %req.location, "registered copy");

    let dto = CopyDto {
        id,
        book_id: req.book_id,
        book_title: book.get("title"),
        location: req.location,
        // A new copy has no borrows
        is_available: true,
    };
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `PUT/PATCH /availablebooks/{id}` - staff only; currently only the location
/// can change (a copy never moves between books).
pub async fn update_copy(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCopyRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    if let Some(ref location) = req.location {
        validation::validate_required_text(location, "location")?;
        let res = sqlx::query(r#"UPDATE copies SET location = ?1 WHERE id = ?2"#)
            .bind(location)
            .bind(id.to_string())
            .execute(&state.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("copy not found".to_string()));
        }
    }

    let sql = format!("{} WHERE c.id = ?1", COPY_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&state.db).await?;
    match row {
        Some(r) => Ok(Json(copy_from_row(&r)?)),
        None => Err(AppError::NotFound("copy not found".to_string())),
    }
}

/// `DELETE /availablebooks/{id}` - staff only; cascades to borrow history.
pub async fn delete_copy(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    let res = sqlx::query(r#"DELETE FROM copies WHERE id = ?1"#)
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("copy not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
