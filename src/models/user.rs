// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::utils::jwt::CurrentUser;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    /// Unique username.
    pub username: String,

    /// Unique email address.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'admin', 'editor' or 'user'.
    pub role: String,

    pub avatar: Option<String>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Public identity payload returned by login, register and `/api/users/me`.
#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub avatar: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            avatar: user.avatar,
            created_at: user.created_at,
        }
    }
}

impl From<&CurrentUser> for UserInfo {
    fn from(user: &CurrentUser) -> Self {
        UserInfo {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            avatar: user.avatar.clone(),
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
}

/// DTO for user login (JSON body).
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Form body of the OAuth2-style `POST /token` endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub username: String,
    pub password: String,
}

/// DTO for updating one's own profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct ProfileUpdateRequest {
    #[validate(email(message = "Invalid email address."))]
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Query parameter of `PUT /api/users/{username}/role`.
#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub role: String,
}
