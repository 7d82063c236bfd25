use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Lifecycle status of a post. Any transition between the three states is
/// allowed; only the first transition into `Published` stamps the publish
/// date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Private,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Private => "private",
        }
    }
}

/// DTO for creating or fully replacing a post.
#[derive(Debug, Deserialize, Validate)]
pub struct PostPayload {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title length must be between 1 and 255 chars"
    ))]
    pub title: String,

    #[validate(length(min = 1, message = "Content must not be empty"))]
    pub content: String,

    /// Optional summary; defaults to a truncated content prefix.
    pub description: Option<String>,

    #[validate(length(
        min = 1,
        max = 50,
        message = "Category name must be between 1 and 50 chars"
    ))]
    pub category: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub status: PostStatus,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
}

/// Query parameters for searching published posts.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub category: Option<String>,
    pub tag: Option<String>,
}

/// A post row joined with its author username and category name.
#[derive(Debug, FromRow)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub category: String,
    pub status: String,
    pub author: String,
    pub views: i64,
    pub cover_image: Option<String>,
    pub publish_date: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Full API representation of a post.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub content: String,
    pub description: Option<String>,
    pub category: String,
    pub tags: Vec<String>,
    pub status: String,
    pub author: String,
    pub views: i64,
    pub publish_date: Option<chrono::DateTime<chrono::Utc>>,
    pub update_time: chrono::DateTime<chrono::Utc>,
    pub cover_image: Option<String>,
    pub comment_count: i64,
}

impl PostResponse {
    pub fn from_record(record: PostRecord, tags: Vec<String>, comment_count: i64) -> Self {
        PostResponse {
            id: record.id,
            title: record.title,
            content: record.content,
            description: record.description,
            category: record.category,
            tags,
            status: record.status,
            author: record.author,
            views: record.views,
            publish_date: record.publish_date,
            update_time: record.updated_at,
            cover_image: record.cover_image,
            comment_count,
        }
    }
}
