use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    auth::{hash_password, issue_token, revoke_token, verify_password, AuthorizedUser},
    db::is_unique_violation,
    error::{validation, AppError, AppResult},
    state::AppState,
    types::{AuthResponse, LoginRequest, RegisterRequest, Role, UserDto},
};

/// `POST /auth/users` - register a new account and return a session token.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<impl IntoResponse> {
    validation::validate_username(&req.username)?;
    validation::validate_email(&req.email)?;
    validation::validate_password(&req.password, state.config.auth.min_password_len)?;
    let role = req.role.unwrap_or(Role::User);

    let password_hash = hash_password(req.password, state.config.auth.bcrypt_cost).await?;

    let id = Uuid::new_v4();
    let res = sqlx::query(
        r#"INSERT INTO users (id, username, email, role, password_hash)
           VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(id.to_string())
    .bind(&req.username)
    .bind(&req.email)
    .bind(role.as_str())
    .bind(&password_hash)
    .execute(&state.db)
    .await;

    if let Err(e) = res {
        if is_unique_violation(&e, "users.username") {
            return Err(AppError::BadRequest("username already taken".to_string()));
        }
        return Err(e.into());
    }

    state.metrics.inc_users_registered();
    tracing::info!(username = %req.username, role = role.as_str(), "registered new user");

    let token = issue_token(&state.db, id).await?;
    let user = UserDto { id, username: req.username, email: req.email, role };
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// `POST /auth/sessions` - exchange credentials for a token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    let row = sqlx::query(
        r#"SELECT id, username, email, role, password_hash FROM users WHERE username = ?1"#,
    )
    .bind(&req.username)
    .fetch_optional(&state.db)
    .await?;

    // Run a verification even when the user is unknown so the response time
    // does not reveal which usernames exist.
    let Some(row) = row else {
        state.metrics.inc_auth_failures();
        let _ = verify_password(req.password, dummy_hash().to_string()).await;
        return Err(AppError::Unauthorized("invalid username or password".to_string()));
    };

    let hash: String = row.get("password_hash");
    if !verify_password(req.password, hash).await? {
        state.metrics.inc_auth_failures();
        return Err(AppError::Unauthorized("invalid username or password".to_string()));
    }

    let id = super::parse_db_uuid(row.get::<String, _>("id").as_str())?;
    let role_str: String = row.get("role");
    let role = Role::parse(&role_str)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role in db: {}", role_str)))?;

    let token = issue_token(&state.db, id).await?;
    state.metrics.inc_logins();

    let user = UserDto { id, username: row.get("username"), email: row.get("email"), role };
    Ok((StatusCode::OK, Json(AuthResponse { token, user })))
}

/// `DELETE /auth/logout` - invalidate the caller's token.
pub async fn logout(
    State(state): State<AppState>,
    user: AuthorizedUser,
) -> AppResult<impl IntoResponse> {
    revoke_token(&state.db, &user.token).await?;
    Ok(StatusCode::NO_CONTENT)
}

// A syntactically valid bcrypt hash of a random string, only used to equalize
// login timing for unknown usernames.
fn dummy_hash() -> &'static str {
    "$2b$10$7EqJtq98hPqEX7fNZaFWoOhi5B0cwOXCD1QqTkCkaUnEQZbb7K5Hm"
}
