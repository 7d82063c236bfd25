// src/handlers/friend_links.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::friend_link::{CreateFriendLinkRequest, FriendLink, UpdateFriendLinkRequest},
    permissions::Permission,
    utils::jwt::CurrentUser,
};

/// List all friend links, newest first.
pub async fn list_friend_links(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let links = sqlx::query_as::<_, FriendLink>(
        "SELECT id, name, url, icon, description, status, created_at
         FROM friend_links
         ORDER BY created_at DESC",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(links))
}

/// Create a friend link (immediately approved).
/// Requires the ManageUsers permission.
pub async fn create_friend_link(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<CreateFriendLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageUsers)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let link = FriendLink {
        id: Uuid::new_v4().to_string(),
        name: payload.name,
        url: payload.url,
        icon: payload.icon,
        description: payload.description,
        status: "approved".to_string(),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO friend_links (id, name, url, icon, description, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&link.id)
    .bind(&link.name)
    .bind(&link.url)
    .bind(&link.icon)
    .bind(&link.description)
    .bind(&link.status)
    .bind(link.created_at)
    .execute(&pool)
    .await?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// Update a friend link, including its moderation status.
/// Requires the ManageUsers permission.
pub async fn update_friend_link(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateFriendLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageUsers)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let result = sqlx::query(
        "UPDATE friend_links SET name = ?, url = ?, icon = ?, description = ?, status = ?
         WHERE id = ?",
    )
    .bind(&payload.name)
    .bind(&payload.url)
    .bind(&payload.icon)
    .bind(&payload.description)
    .bind(&payload.status)
    .bind(&id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Friend link not found".to_string()));
    }

    let link = sqlx::query_as::<_, FriendLink>(
        "SELECT id, name, url, icon, description, status, created_at
         FROM friend_links WHERE id = ?",
    )
    .bind(&id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(link))
}

/// Delete a friend link.
/// Requires the ManageUsers permission.
pub async fn delete_friend_link(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageUsers)?;

    let result = sqlx::query("DELETE FROM friend_links WHERE id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Friend link not found".to_string()));
    }

    Ok(Json(json!({ "message": "Friend link deleted" })))
}
