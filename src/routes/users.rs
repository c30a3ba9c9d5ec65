use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{
    auth::{hash_password, AuthorizedUser},
    error::{validation, AppError, AppResult},
    state::AppState,
    types::{Role, UpdateUserRequest, UserDto},
};

fn user_from_row(r: &SqliteRow) -> AppResult<UserDto> {
    let role_str: String = r.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role in db: {}", role_str)))?;
    Ok(UserDto {
        id: super::parse_db_uuid(r.get::<String, _>("id").as_str())?,
        username: r.get("username"),
        email: r.get("email"),
        role,
    })
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /users` - staff only.
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Query(q): Query<UserListQuery>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let limit = q.limit.unwrap_or(100).clamp(1, 1000);
    let offset = q.offset.unwrap_or(0).max(0);

    let rows = sqlx::query(
        r#"SELECT id, username, email, role FROM users ORDER BY username ASC LIMIT ?1 OFFSET ?2"#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let items = rows.iter().map(user_from_row).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(items))
}

/// `GET /users/me` - the caller's own account.
pub async fn me(user: AuthorizedUser) -> AppResult<impl IntoResponse> {
    Ok(Json(user.user))
}

/// `GET /users/{id}` - staff, or the user themselves.
pub async fn get_user(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    if !user.is_staff() && user.id() != id {
        return Err(AppError::Forbidden("staff role required".to_string()));
    }

    let row = sqlx::query(r#"SELECT id, username, email, role FROM users WHERE id = ?1"#)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    match row {
        Some(r) => Ok(Json(user_from_row(&r)?)),
        None => Err(AppError::NotFound("user not found".to_string())),
    }
}

/// `PATCH /users/{id}` - staff only; email, role and password can change, the
/// username cannot.
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    let row = sqlx::query(r#"SELECT id, username, email, role FROM users WHERE id = ?1"#)
        .bind(id.to_string())
        .fetch_optional(&state.db)
        .await?;
    let current = match row {
        Some(r) => user_from_row(&r)?,
        None => return Err(AppError::NotFound("user not found".to_string())),
    };

    let email = req.email.unwrap_or(current.email);
    let role = req.role.unwrap_or(current.role);
    // All validation happens before the first write, so a rejected request
    // leaves the row untouched.
    validation::validate_email(&email)?;
    if let Some(ref password) = req.password {
        validation::validate_password(password, state.config.auth.min_password_len)?;
    }

    sqlx::query(r#"UPDATE users SET email = ?1, role = ?2 WHERE id = ?3"#)
        .bind(&email)
        .bind(role.as_str())
        .bind(id.to_string())
        .execute(&state.db)
        .await?;

    if let Some(password) = req.password {
        let hash = hash_password(password, state.config.auth.bcrypt_cost).await?;
        sqlx::query(r#"UPDATE users SET password_hash = ?1 WHERE id = ?2"#)
            .bind(&hash)
            .bind(id.to_string())
            .execute(&state.db)
            .await?;
        // A password change invalidates all of the user's sessions.
        sqlx::query(r#"DELETE FROM tokens WHERE user_id = ?1"#)
            .bind(id.to_string())
            .execute(&state.db)
            .await?;
    }

    tracing::info!(user_id = %id, "updated user");
    Ok(Json(UserDto { id, username: current.username, email, role }))
}

/// `DELETE /users/{id}` - staff only; cascades to tokens, borrows and reviews.
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthorizedUser,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    user.require_staff()?;

    if user.id() == id {
        return Err(AppError::BadRequest("cannot delete your own account".to_string()));
    }

    let res = sqlx::query(r#"DELETE FROM users WHERE id = ?1"#)
        .bind(id.to_string())
        .execute(&state.db)
        .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("user not found".to_string()));
    }
    tracing::info!(user_id = %id, "deleted user");
    Ok(StatusCode::NO_CONTENT)
}
