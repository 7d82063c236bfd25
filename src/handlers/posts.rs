// src/handlers/posts.rs

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::uploads::store_upload,
    models::post::{PostListQuery, PostPayload, PostRecord, PostResponse, PostStatus, SearchQuery},
    permissions::Permission,
    state::AppState,
    utils::jwt::CurrentUser,
};

/// Base SELECT joining the author username and category name.
const POST_SELECT: &str = "SELECT p.id, p.title, p.content, p.description, \
     c.name AS category, p.status, u.username AS author, p.views, \
     p.cover_image, p.publish_date, p.updated_at \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     JOIN categories c ON c.id = p.category_id ";

/// Ownership columns used for the author/override authorization check.
#[derive(sqlx::FromRow)]
struct PostOwnership {
    author_id: String,
    publish_date: Option<chrono::DateTime<chrono::Utc>>,
}

async fn fetch_ownership(pool: &SqlitePool, post_id: &str) -> Result<PostOwnership, AppError> {
    sqlx::query_as::<_, PostOwnership>(
        "SELECT author_id, publish_date FROM posts WHERE id = ?",
    )
    .bind(post_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Author-or-override rule: (author AND base permission) OR ManageUsers.
fn authorize_mutation(
    user: &CurrentUser,
    author_id: &str,
    base: Permission,
) -> Result<(), AppError> {
    let is_author = user.id == author_id;
    if (is_author && user.can(base)) || user.can(Permission::ManageUsers) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not allowed to modify this post".to_string(),
        ))
    }
}

async fn fetch_record(pool: &SqlitePool, post_id: &str) -> Result<PostRecord, AppError> {
    let sql = format!("{POST_SELECT} WHERE p.id = ?");
    sqlx::query_as::<_, PostRecord>(&sql)
        .bind(post_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Assembles the full API representation: tag names and comment count are
/// fetched per post, mirroring the indexes on post_tags and comments.
async fn into_response(pool: &SqlitePool, record: PostRecord) -> Result<PostResponse, AppError> {
    let tags = sqlx::query_scalar::<_, String>(
        "SELECT t.name FROM tags t
         JOIN post_tags pt ON pt.tag_id = t.id
         WHERE pt.post_id = ?
         ORDER BY t.name",
    )
    .bind(&record.id)
    .fetch_all(pool)
    .await?;

    let comment_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments WHERE post_id = ?")
            .bind(&record.id)
            .fetch_one(pool)
            .await?;

    Ok(PostResponse::from_record(record, tags, comment_count))
}

/// Resolves a category name to its id, creating the category on first use.
async fn ensure_category(pool: &SqlitePool, name: &str) -> Result<String, AppError> {
    if let Some(id) = sqlx::query_scalar::<_, String>("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    let inserted = sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await;

    match inserted {
        Ok(_) => Ok(id),
        // Lost a race against a concurrent insert of the same name.
        Err(e)
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation()) =>
        {
            sqlx::query_scalar::<_, String>("SELECT id FROM categories WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .map_err(AppError::from)
        }
        Err(e) => Err(AppError::from(e)),
    }
}

async fn ensure_tag(pool: &SqlitePool, name: &str) -> Result<String, AppError> {
    if let Some(id) = sqlx::query_scalar::<_, String>("SELECT id FROM tags WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }

    let id = Uuid::new_v4().to_string();
    let inserted = sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await;

    match inserted {
        Ok(_) => Ok(id),
        Err(e)
            if e.as_database_error()
                .is_some_and(|db| db.is_unique_violation()) =>
        {
            sqlx::query_scalar::<_, String>("SELECT id FROM tags WHERE name = ?")
                .bind(name)
                .fetch_one(pool)
                .await
                .map_err(AppError::from)
        }
        Err(e) => Err(AppError::from(e)),
    }
}

/// Replaces the tag associations of a post with the given tag names.
async fn replace_tags(pool: &SqlitePool, post_id: &str, tags: &[String]) -> Result<(), AppError> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .execute(pool)
        .await?;

    for name in tags {
        let tag_id = ensure_tag(pool, name).await?;
        sqlx::query("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")
            .bind(post_id)
            .bind(&tag_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/// Char-safe truncated content prefix used when no description is supplied.
fn default_description(content: &str) -> String {
    let mut prefix: String = content.chars().take(100).collect();
    prefix.push_str("...");
    prefix
}

/// List posts, optionally filtered by status and/or category name.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PostListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(POST_SELECT);
    builder.push("WHERE 1 = 1");

    if let Some(status) = &params.status {
        builder.push(" AND p.status = ").push_bind(status);
    }
    if let Some(category) = &params.category {
        builder.push(" AND c.name = ").push_bind(category);
    }
    builder.push(" ORDER BY p.created_at DESC");

    let records = builder
        .build_query_as::<PostRecord>()
        .fetch_all(&pool)
        .await?;

    let mut posts = Vec::with_capacity(records.len());
    for record in records {
        posts.push(into_response(&pool, record).await?);
    }

    Ok(Json(posts))
}

/// Get a single post by ID, incrementing its view counter.
///
/// The increment happens in the database so concurrent fetches cannot lose
/// updates.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE posts SET views = views + 1 WHERE id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let record = fetch_record(&pool, &id).await?;
    Ok(Json(into_response(&pool, record).await?))
}

/// Create a new post.
/// Requires the CreatePost permission. The category and any unknown tags are
/// created implicitly.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Json(payload): Json<PostPayload>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CreatePost)?;

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let category_id = ensure_category(&pool, &payload.category).await?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let description = payload
        .description
        .unwrap_or_else(|| default_description(&payload.content));
    let publish_date = (payload.status == PostStatus::Published).then_some(now);

    sqlx::query(
        "INSERT INTO posts
         (id, title, content, description, author_id, category_id, status,
          views, cover_image, publish_date, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, 0, NULL, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&description)
    .bind(&user.id)
    .bind(&category_id)
    .bind(payload.status.as_str())
    .bind(publish_date)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create post: {:?}", e);
        AppError::from(e)
    })?;

    replace_tags(&pool, &id, &payload.tags).await?;

    let record = fetch_record(&pool, &id).await?;
    Ok((StatusCode::CREATED, Json(into_response(&pool, record).await?)))
}

/// Fully replace a post's content, category, tags and status.
/// Requires: (author AND EditPost) OR ManageUsers.
///
/// The publish date is stamped the first time the status becomes 'published'
/// and never overwritten afterwards.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<PostPayload>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let ownership = fetch_ownership(&pool, &id).await?;
    authorize_mutation(&user, &ownership.author_id, Permission::EditPost)?;

    let category_id = ensure_category(&pool, &payload.category).await?;

    let now = Utc::now();
    let description = payload
        .description
        .unwrap_or_else(|| default_description(&payload.content));
    let publish_date = match ownership.publish_date {
        Some(existing) => Some(existing),
        None => (payload.status == PostStatus::Published).then_some(now),
    };

    sqlx::query(
        "UPDATE posts SET
         title = ?, content = ?, description = ?, category_id = ?,
         status = ?, publish_date = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&payload.title)
    .bind(&payload.content)
    .bind(&description)
    .bind(&category_id)
    .bind(payload.status.as_str())
    .bind(publish_date)
    .bind(now)
    .bind(&id)
    .execute(&pool)
    .await?;

    replace_tags(&pool, &id, &payload.tags).await?;

    let record = fetch_record(&pool, &id).await?;
    Ok(Json(into_response(&pool, record).await?))
}

/// Delete a post together with its comments, likes and tag associations.
/// Requires: (author AND DeletePost) OR ManageUsers.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ownership = fetch_ownership(&pool, &id).await?;
    authorize_mutation(&user, &ownership.author_id, Permission::DeletePost)?;

    sqlx::query("DELETE FROM comments WHERE post_id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM post_likes WHERE post_id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM post_tags WHERE post_id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(&id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Upload a cover image for a post.
/// Same authorization rule as editing the post.
pub async fn upload_cover(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let ownership = fetch_ownership(&state.pool, &id).await?;
    authorize_mutation(&user, &ownership.author_id, Permission::EditPost)?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("Missing file field".to_string()))?;

    let original_name = field.file_name().unwrap_or("upload").to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filename = store_upload(&state.config.upload_dir, &original_name, &data).await?;

    sqlx::query("UPDATE posts SET cover_image = ?, updated_at = ? WHERE id = ?")
        .bind(format!("/uploads/{}", filename))
        .bind(Utc::now())
        .bind(&id)
        .execute(&state.pool)
        .await?;

    let record = fetch_record(&state.pool, &id).await?;
    Ok(Json(into_response(&state.pool, record).await?))
}

/// Search published posts by case-insensitive keyword, with optional category
/// and tag filters.
pub async fn search_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Search keyword must not be empty".to_string(),
        ));
    }

    let pattern = format!("%{}%", params.q.to_lowercase());

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(POST_SELECT);
    builder.push("WHERE p.status = 'published'");
    builder.push(" AND (LOWER(p.title) LIKE ");
    builder.push_bind(&pattern);
    builder.push(" OR LOWER(p.content) LIKE ");
    builder.push_bind(&pattern);
    builder.push(")");

    if let Some(category) = &params.category {
        builder.push(" AND c.name = ").push_bind(category);
    }
    if let Some(tag) = &params.tag {
        builder.push(
            " AND p.id IN (SELECT pt.post_id FROM post_tags pt \
             JOIN tags t ON t.id = pt.tag_id WHERE t.name = ",
        );
        builder.push_bind(tag);
        builder.push(")");
    }
    builder.push(" ORDER BY p.created_at DESC");

    let records = builder
        .build_query_as::<PostRecord>()
        .fetch_all(&pool)
        .await?;

    let mut posts = Vec::with_capacity(records.len());
    for record in records {
        posts.push(into_response(&pool, record).await?);
    }

    Ok(Json(posts))
}
