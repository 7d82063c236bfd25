// src/handlers/users.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{ProfileUpdateRequest, RoleQuery, User, UserInfo},
    permissions::{Permission, Role},
    utils::jwt::CurrentUser,
};

/// Returns the identity of the authenticated caller.
pub async fn me(user: CurrentUser) -> Json<UserInfo> {
    Json(UserInfo::from(&user))
}

/// Updates the caller's own email and/or avatar.
/// Requires the UpdateProfile permission.
pub async fn update_profile(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::UpdateProfile)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let Some(email) = &payload.email {
        let taken = sqlx::query_scalar::<_, String>(
            "SELECT id FROM users WHERE email = ? AND id != ?",
        )
        .bind(email)
        .bind(&user.id)
        .fetch_optional(&pool)
        .await?;
        if taken.is_some() {
            return Err(AppError::BadRequest(
                "Email already registered by another user".to_string(),
            ));
        }

        sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(&user.id)
            .execute(&pool)
            .await?;
    }

    if let Some(avatar) = &payload.avatar {
        sqlx::query("UPDATE users SET avatar = ? WHERE id = ?")
            .bind(avatar)
            .bind(&user.id)
            .execute(&pool)
            .await?;
    }

    let refreshed = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, role, avatar, created_at
         FROM users WHERE id = ?",
    )
    .bind(&user.id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UserInfo::from(refreshed)))
}

/// Changes another user's role.
/// Requires the ManageUsers permission.
pub async fn update_role(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(username): Path<String>,
    Query(params): Query<RoleQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageUsers)?;

    let role = Role::parse(&params.role)
        .ok_or_else(|| AppError::BadRequest("Invalid role".to_string()))?;

    let result = sqlx::query("UPDATE users SET role = ? WHERE username = ?")
        .bind(role.as_str())
        .bind(&username)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(Json(json!({
        "message": format!("Role of '{}' updated to '{}'", username, role.as_str()),
    })))
}
