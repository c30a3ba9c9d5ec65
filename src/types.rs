use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Distinguishes an absent field from an explicit `null` in update bodies:
/// outer `None` means "field not sent, keep the current value", `Some(None)`
/// means "clear the value".
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

/// User role. Staff has full write access to all resources; regular users can
/// read and post reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::User => "user",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "staff" => Some(Role::Staff),
            "user" => Some(Role::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDto {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub published_date: Option<String>,
    pub genre: String,
    pub isbn: Option<String>,
    pub description: String,
    pub language: String,
    pub preview_image_url: Option<String>,
    /// True when at least one copy of this book has no open borrow.
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookRequest {
    pub title: String,
    pub author: String,
    pub published_date: Option<String>,
    pub genre: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub preview_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub published_date: Option<Option<String>>,
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub isbn: Option<Option<String>>,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub preview_image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyDto {
    pub id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub location: String,
    /// True when this copy has no open borrow.
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCopyRequest {
    pub book_id: Uuid,
    pub location: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCopyRequest {
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub copy_id: Uuid,
    pub location: String,
    pub book_id: Uuid,
    pub book_title: String,
    pub borrow_date: String,
    pub returned_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBorrowRequest {
    pub user_id: Uuid,
    pub copy_id: Uuid,
}

/// Body for the nested borrow endpoint; the copy is taken from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNestedBorrowRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub book_id: Uuid,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub book_id: Uuid,
    pub rating: i64,
    pub comment: Option<String>,
}

/// Body for the nested review endpoint; the book is taken from the path.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNestedReviewRequest {
    pub rating: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}
