// src/handlers/taxonomy.rs
//
// Category and tag management. Mutation is admin-gated; categories and tags
// are otherwise created implicitly by post create/update.

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
    models::{category::CategoryName, tag::TagName},
    permissions::Permission,
    utils::jwt::CurrentUser,
};

/// List all category names.
pub async fn list_categories(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let categories = sqlx::query_as::<_, CategoryName>("SELECT name FROM categories ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(categories))
}

/// Create a category explicitly.
/// Requires the ManageCategories permission.
pub async fn create_category(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<CategoryName>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageCategories)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&payload.name)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::BadRequest("Category already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok((StatusCode::CREATED, Json(payload)))
}

/// Delete a category by name.
/// Requires the ManageCategories permission. Blocked while any post still
/// references the category.
pub async fn delete_category(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageCategories)?;

    let category_id =
        sqlx::query_scalar::<_, String>("SELECT id FROM categories WHERE name = ?")
            .bind(&name)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;

    let posts_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE category_id = ?")
            .bind(&category_id)
            .fetch_one(&pool)
            .await?;
    if posts_count > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete a category that is referenced by posts".to_string(),
        ));
    }

    sqlx::query("DELETE FROM categories WHERE id = ?")
        .bind(&category_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Category deleted" })))
}

/// List all tag names.
pub async fn list_tags(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let tags = sqlx::query_as::<_, TagName>("SELECT name FROM tags ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(tags))
}

/// Create a tag explicitly.
/// Requires the ManageTags permission.
pub async fn create_tag(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<TagName>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageTags)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&payload.name)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::BadRequest("Tag already exists".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok((StatusCode::CREATED, Json(payload)))
}

/// Delete a tag by name, removing its post associations first.
/// Requires the ManageTags permission.
pub async fn delete_tag(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ManageTags)?;

    let tag_id = sqlx::query_scalar::<_, String>("SELECT id FROM tags WHERE name = ?")
        .bind(&name)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))?;

    sqlx::query("DELETE FROM post_tags WHERE tag_id = ?")
        .bind(&tag_id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(&tag_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Tag deleted" })))
}
