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
    error::{validation, AppError, AppResult},
    state::AppState,
    types::{BookDto, CopyDto, CreateBookRequest, UpdateBookRequest},
};

// Availability is derived, never stored: a book is available when at least one
// of its copies has no open borrow.
const BOOK_SELECT: &str = r#"SELECT b.id, b.title, b.author, b.published_date, b.genre, b.isbn,
       b.description, b.language, b.preview_image_url,
       EXISTS(
           SELECT 1 FROM copies c
           WHERE c.book_id = b.id
             AND NOT EXISTS(SELECT 1 FROM borrows br WHERE br.copy_id = c.id AND br.returned_at IS NULL)
       ) AS is_available
  FROM books b"#;

pub(crate) fn book_from_row(r: &SqliteRow) -> AppResult<BookDto> {
    Ok(BookDto {
        id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
        title: r.get("title"),
        author: r.get("author"),
        published_date: r.get("published_date"),
        genre: r.get("genre"),
        isbn: r.get("isbn"),
        description: r.get("description"),
        language: r.get("language"),
        preview_image_url: r.get("preview_image_url"),
        is_available: r.get::<i64, _>("is_available") != 0,
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct BookListQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /books` - public catalogue listing with optional search and genre
/// filters.
pub async fn list_books(
    State(state): State<AppState>,
    Query(q): Query<BookListQuery>,
) -> AppResult<impl IntoResponse> {
    let mut sql = String::from(BOOK_SELECT);
    let mut idx = 1;
    let mut clauses: Vec<String> = Vec::new();
    let mut binds: Vec<String> = Vec::new();

    if let Some(ref term) = q.search {
        clauses.push(format!("(b.title LIKE ?{} OR b.author LIKE ?{})", idx, idx + 1));
        let pattern = format!("%{}%", term);
        binds.push(pattern.clone());
        binds.push(pattern);
        idx += 2;
    }
    if let Some(ref genre) = q.genre {
        clauses.push(format!("b.genre = ?{}", idx));
        binds.push(genre.clone());
        idx += 1;
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY b.title ASC");

    // Clamp limit to a safe range to prevent overly large responses
    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);
    sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", idx, idx + 1));

    let mut qx = sqlx::query(&sql);
    for b in &binds {
        qx = qx.bind(b);
    }
    qx = qx.bind(limit).bind(offset);

    let rows = qx.fetch_all(&state.db).await?;
    let items = rows.iter().map(book_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `GET /books/{id}` - public single-book lookup.
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let sql = format!("{} WHERE b.id = ?1", BOOK_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&state.db).await?;
    match row {
        Some(r) => Ok(Json(book_from_row(&r)?)),
        None => Err(AppError::NotFound("book not found".to_string())),
    }
}

/// `POST /books` - staff only.
pub async fn create_book(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Json(req): Json<CreateBookRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    validation::validate_required_text(&req.title, "title")?;
    validation::validate_required_text(&req.author, "author")?;
    if let Some(ref isbn) = req.isbn {
        validation::validate_isbn(isbn)?;
    }
    if let Some(ref date) = req.published_date {
        validate_published_date(date)?;
    }

    let id = Uuid::new_v4();
    let res = sqlx::query(
        r#"INSERT INTO books (id, title, author, published_date, genre, isbn, description, language, preview_image_url)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
    )
    .bind(id.to_string())
    .bind(&req.title)
    .bind(&req.author)
    .bind(&req.published_date)
    .bind(req.genre.as_deref().unwrap_or(""))
    .bind(&req.isbn)
    .bind(req.description.as_deref().unwrap_or(""))
    .bind(req.language.as_deref().unwrap_or(""))
    .bind(&req.preview_image_url)
    .execute(&state.db)
    .await;

    if let Err(e) = res {
        if is_unique_violation(&e, "books.isbn") {
            return Err(AppError::BadRequest("a book with this isbn already exists".to_string()));
        }
        return Err(e.into());
    }

    state.metrics.inc_books_created();
    tracing::info!(book_id = %id, title = %req.title, "created book");

    let dto = BookDto {
        id,
        title: req.title,
        author: req.author,
        published_date: req.published_date,
        genre: req.genre.unwrap_or_default(),
        isbn: req.isbn,
        description: req.description.unwrap_or_default(),
        language: req.language.unwrap_or_default(),
        preview_image_url: req.preview_image_url,
        // A freshly created book has no copies yet
        is_available: false,
    };
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `PUT/PATCH /books/{id}` - staff only. Fields absent from the body keep
/// their current value, so the same handler serves full and partial updates;
/// nullable fields (isbn, published_date, preview_image_url) are cleared by
/// sending an explicit null.
pub async fn update_book(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBookRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let sql = format!("{} WHERE b.id = ?1", BOOK_SELECT);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(&state.db).await?;
    let current = match row {
        Some(r) => book_from_row(&r)?,
        None => return Err(AppError::NotFound("book not found".to_string())),
    };

    // Nullable fields use a double Option: absent keeps the current value,
    // an explicit null clears it.
    let title = req.title.unwrap_or(current.title);
    let author = req.author.unwrap_or(current.author);
    let published_date = req.published_date.unwrap_or(current.published_date);
    let genre = req.genre.unwrap_or(current.genre);
    let isbn = req.isbn.unwrap_or(current.isbn);
    let description = req.description.unwrap_or(current.description);
    let language = req.language.unwrap_or(current.language);
    let preview_image_url = req.preview_image_url.unwrap_or(current.preview_image_url);

    validation::validate_required_text(&title, "title")?;
    validation::validate_required_text(&author, "author")?;
    if let Some(ref i) = isbn {
        validation::validate_isbn(i)?;
    }
    if let Some(ref date) = published_date {
        validate_published_date(date)?;
    }

    let res = sqlx::query(
        r#"UPDATE books SET title=?1, author=?2, published_date=?3, genre=?4, isbn=?5,
                            description=?6, language=?7, preview_image_url=?8
           WHERE id=?9"#,
    )
    .bind(&title)
    .bind(&author)
    .bind(&published_date)
    .bind(&genre)
    .bind(&isbn)
    .bind(&description)
    .bind(&language)
    .bind(&preview_image_url)
    .bind(id.to_string())
    .execute(&state.db)
    .await;

    if let Err(e) = res {
        if is_unique_violation(&e, "books.isbn") {
            return Err(AppError::BadRequest("a book with this isbn already exists".to_string()));
        }
        return Err(e.into());
    }

    let dto = BookDto {
        id,
        title,
        author,
        published_date,
        genre,
        isbn,
        description,
        language,
        preview_image_url,
        is_available: current.is_available,
    };
    Ok(Json(dto))
}

/// `DELETE /books/{id}` - staff only; cascades to copies, borrows and reviews.
pub async fn delete_book(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;
    let res = sqlx::query(r#"DELETE FROM books WHERE id = ?1"#)
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("book not found".to_string()));
    }
    tracing::info!(book_id = %id, "deleted book");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /books/{id}/availablebooks` - public listing of a book's copies.
pub async fn list_book_copies(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let exists = sqlx::query(r#"SELECT 1 FROM books WHERE id = ?1"#)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("book not found".to_string()));
    }

    let rows = sqlx::query(
        r#"SELECT c.id, c.book_id, b.title AS book_title, c.location,
                  NOT EXISTS(SELECT 1 FROM borrows br WHERE br.copy_id = c.id AND br.returned_at IS NULL) AS is_available
           FROM copies c JOIN books b ON b.id = c.book_id
           WHERE c.book_id = ?1
           ORDER BY c.location ASC"#,
    )
    .bind(id.to_string())
    .fetch_all(&state.db)
    .await?;

    let items = rows
        .iter()
        .map(|r| -> AppResult<CopyDto> {
            Ok(CopyDto {
                id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
                book_id: super::parse_db_uuid(r.get::<String, _>("book_id").as_str())?,
                book_title: r.get("book_title"),
                location: r.get("location"),
                is_available: r.get::<i64, _>("is_available") != 0,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

fn validate_published_date(date: &str) -> AppResult<()> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| AppError::ValidationError {
        field: "published_date".to_string(),
        message: "Date must be in YYYY-MM-DD format".to_string(),
    })?;
    Ok(())
}
