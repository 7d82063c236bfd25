// src/handlers/interaction.rs

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
    models::comment::{CommentResponse, CreateCommentRequest},
    permissions::Permission,
    utils::jwt::CurrentUser,
};

async fn post_exists(pool: &SqlitePool, post_id: &str) -> Result<(), AppError> {
    sqlx::query_scalar::<_, String>("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Like a post.
/// Requires the LikePost permission. The UNIQUE(post_id, user_id) constraint
/// is the sole arbiter under concurrency: a race to like twice yields exactly
/// one success and one "already liked".
pub async fn like_post(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::LikePost)?;
    post_exists(&pool, &post_id).await?;

    sqlx::query("INSERT INTO post_likes (id, post_id, user_id, created_at) VALUES (?, ?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&post_id)
        .bind(&user.id)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation())
            {
                AppError::BadRequest("Already liked this post".to_string())
            } else {
                AppError::from(e)
            }
        })?;

    Ok(Json(json!({ "message": "Post liked" })))
}

/// Remove the caller's like from a post.
pub async fn unlike_post(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::LikePost)?;
    post_exists(&pool, &post_id).await?;

    let result = sqlx::query("DELETE FROM post_likes WHERE post_id = ? AND user_id = ?")
        .bind(&post_id)
        .bind(&user.id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Like not found".to_string()));
    }

    Ok(Json(json!({ "message": "Like removed" })))
}

/// Get the like count of a post.
pub async fn get_post_likes(
    State(pool): State<SqlitePool>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    post_exists(&pool, &post_id).await?;

    let likes = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
        .bind(&post_id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(json!({ "likes": likes })))
}

/// List all comments of a post, oldest first.
pub async fn list_post_comments(
    State(pool): State<SqlitePool>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    post_exists(&pool, &post_id).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(
        "SELECT c.id, c.content, c.post_id, u.username AS author, c.created_at, c.parent_id
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?
         ORDER BY c.created_at ASC",
    )
    .bind(&post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

async fn insert_comment(
    pool: &SqlitePool,
    user: &CurrentUser,
    post_id: &str,
    content: &str,
    parent_id: Option<&str>,
) -> Result<CommentResponse, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO comments (id, content, post_id, author_id, parent_id, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(content)
    .bind(post_id)
    .bind(&user.id)
    .bind(parent_id)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(CommentResponse {
        id,
        content: content.to_string(),
        post_id: post_id.to_string(),
        author: user.username.clone(),
        created_at: now,
        parent_id: parent_id.map(str::to_string),
    })
}

/// Create a top-level comment on a post.
/// Requires the CommentPost permission.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CommentPost)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    post_exists(&pool, &payload.post_id).await?;

    let comment = insert_comment(&pool, &user, &payload.post_id, &payload.content, None).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Reply to an existing comment.
/// Requires the CommentPost permission.
pub async fn reply_comment(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(comment_id): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CommentPost)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let parent = sqlx::query_scalar::<_, String>("SELECT id FROM comments WHERE id = ?")
        .bind(&comment_id)
        .fetch_optional(&pool)
        .await?;
    if parent.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    post_exists(&pool, &payload.post_id).await?;

    let comment = insert_comment(
        &pool,
        &user,
        &payload.post_id,
        &payload.content,
        Some(&comment_id),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Delete a comment and its direct replies.
/// Allowed for the comment author or holders of ManageUsers.
///
/// The cascade is a one-level lookup-then-delete on the parent_id index, not
/// a recursive traversal.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let author_id = sqlx::query_scalar::<_, String>("SELECT author_id FROM comments WHERE id = ?")
        .bind(&comment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user.id && !user.can(Permission::ManageUsers) {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        ));
    }

    sqlx::query("DELETE FROM comments WHERE parent_id = ?")
        .bind(&comment_id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(&comment_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Comment deleted" })))
}
