use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// The primary error type for the application.
///
/// This enum consolidates all possible errors that can occur within the application,
/// providing a unified way to handle and respond to failures.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For when a request conflicts with the current state of the server.
    Conflict(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For when a request carries no valid credentials.
    Unauthorized(String),
    /// For when the caller is authenticated but lacks the required role.
    Forbidden(String),
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                let error_id = uuid::Uuid::new_v4();
                tracing::error!("Error ID: {}", error_id);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg, None),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Internal(anyhow::anyhow!("bcrypt failure: {}", err))
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the application.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, AppError>`.
    ///
    /// # Arguments
    ///
    /// * `entity` - A string describing the entity that was not found.
    ///
    /// # Returns
    ///
    /// * `Ok(T)` if the `Option` is `Some(T)`.
    /// * `Err(AppError::NotFound)` if the `Option` is `None`.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}

/// A module containing helper functions for request validation.
pub mod validation {
    use super::*;

    /// Validates a review rating. Ratings are integer stars from 1 to 5.
    pub fn validate_rating(rating: i64) -> AppResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::ValidationError {
                field: "rating".to_string(),
                message: format!("Rating must be between 1 and 5, got {}", rating),
            });
        }
        Ok(())
    }

    /// Validates a username: non-empty, at most 150 characters, no whitespace
    /// and no null characters.
    pub fn validate_username(username: &str) -> AppResult<()> {
        if username.is_empty() {
            return Err(AppError::ValidationError {
                field: "username".to_string(),
                message: "Username cannot be empty".to_string(),
            });
        }
        if username.len() > 150 {
            return Err(AppError::ValidationError {
                field: "username".to_string(),
                message: "Username must be at most 150 characters".to_string(),
            });
        }
        if username.chars().any(|c| c.is_whitespace() || c == '\0') {
            return Err(AppError::ValidationError {
                field: "username".to_string(),
                message: "Username must not contain whitespace".to_string(),
            });
        }
        Ok(())
    }

    /// Shallow email shape check. Full RFC validation is out of scope; the
    /// address is only used for display and contact.
    pub fn validate_email(email: &str) -> AppResult<()> {
        let well_formed = email.len() >= 3
            && email.len() <= 254
            && email.contains('@')
            && !email.starts_with('@')
            && !email.ends_with('@');
        if !well_formed {
            return Err(AppError::ValidationError {
                field: "email".to_string(),
                message: "Invalid email address".to_string(),
            });
        }
        Ok(())
    }

    /// Validates password length against the configured minimum.
    pub fn validate_password(password: &str, min_len: usize) -> AppResult<()> {
        if password.len() < min_len {
            return Err(AppError::ValidationError {
                field: "password".to_string(),
                message: format!("Password must be at least {} characters", min_len),
            });
        }
        if password.len() > 128 {
            return Err(AppError::ValidationError {
                field: "password".to_string(),
                message: "Password must be at most 128 characters".to_string(),
            });
        }
        Ok(())
    }

    /// Validates an ISBN if present: 10 or 13 characters, digits with an
    /// optional trailing 'X' check digit (ISBN-10). Byte and char length only
    /// agree for ASCII, so anything else is rejected before indexing.
    pub fn validate_isbn(isbn: &str) -> AppResult<()> {
        let ok = isbn.is_ascii()
            && match isbn.len() {
                10 => {
                    isbn[..9].chars().all(|c| c.is_ascii_digit())
                        && isbn[9..].chars().all(|c| c.is_ascii_digit() || c == 'X' || c == 'x')
                }
                13 => isbn.chars().all(|c| c.is_ascii_digit()),
                _ => false,
            };
        if !ok {
            return Err(AppError::ValidationError {
                field: "isbn".to_string(),
                message: "ISBN must be 10 or 13 characters".to_string(),
            });
        }
        Ok(())
    }

    /// Validates a non-empty free-text field such as a book title or a copy
    /// location.
    pub fn validate_required_text(value: &str, field: &str) -> AppResult<()> {
        if value.trim().is_empty() {
            return Err(AppError::ValidationError {
                field: field.to_string(),
                message: format!("{} cannot be empty", field),
            });
        }
        if value.len() > 255 {
            return Err(AppError::ValidationError {
                field: field.to_string(),
                message: format!("{} must be at most 255 characters", field),
            });
        }
        Ok(())
    }
}
