//! Bearer-token authentication and password handling.
//!
//! Tokens are opaque UUIDs stored in the `tokens` table, one row per active
//! session. The [`AuthorizedUser`] extractor resolves the `Authorization`
//! header to a user row; handlers that allow anonymous access simply do not
//! take the extractor.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    state::AppState,
    types::{Role, UserDto},
};

/// The authenticated caller, extracted from the `Authorization: Bearer` header.
pub struct AuthorizedUser {
    pub user: UserDto,
    pub token: String,
}

impl AuthorizedUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_staff(&self) -> bool {
        self.user.role == Role::Staff
    }

    /// Permission gate for mutations that only staff may perform.
    pub fn require_staff(&self) -> AppResult<()> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("staff role required".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for AuthorizedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let row = sqlx::query(
            r#"SELECT u.id, u.username, u.email, u.role
               FROM tokens t JOIN users u ON u.id = t.user_id
               WHERE t.token = ?1"#,
        )
        .bind(&token)
        .fetch_optional(&state.db)
        .await?;

        let Some(row) = row else {
            state.metrics.inc_auth_failures();
            return Err(AppError::Unauthorized("invalid token".to_string()));
        };

        let id = Uuid::parse_str(row.get::<String, _>("id").as_str())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt user id in db: {}", e)))?;
        let role_str: String = row.get("role");
        let role = Role::parse(&role_str)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("unknown role in db: {}", role_str)))?;

        Ok(Self {
            user: UserDto {
                id,
                username: row.get("username"),
                email: row.get("email"),
                role,
            },
            token,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Hashes a password with bcrypt on a blocking thread. bcrypt is deliberately
/// slow, so it must not run on the async executor.
pub async fn hash_password(password: String, cost: u32) -> AppResult<String> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("hashing task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Verifies a password against a stored bcrypt hash on a blocking thread.
pub async fn verify_password(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("verify task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Creates a fresh token row for the user and returns the token string.
pub async fn issue_token(db: &SqlitePool, user_id: Uuid) -> AppResult<String> {
    let token = Uuid::new_v4().simple().to_string();
    sqlx::query(r#"INSERT INTO tokens (token, user_id) VALUES (?1, ?2)"#)
        .bind(&token)
        .bind(user_id.to_string())
        .execute(db)
        .await?;
    Ok(token)
}

/// Deletes a token row; used by logout. Deleting an unknown token is a no-op.
pub async fn revoke_token(db: &SqlitePool, token: &str) -> AppResult<()> {
    sqlx::query(r#"DELETE FROM tokens WHERE token = ?1"#).bind(token).execute(db).await?;
    Ok(())
}
