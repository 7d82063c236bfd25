use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// DTO for creating a new comment (and for replies, where the parent comment
/// id comes from the path instead).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 1000,
        message = "Comment must be between 1 and 1000 characters"
    ))]
    pub content: String,

    #[serde(rename = "postId")]
    pub post_id: String,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: String,
    pub content: String,
    #[serde(rename = "postId")]
    pub post_id: String,
    pub author: String,
    #[serde(rename = "createdAt")]
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
}
