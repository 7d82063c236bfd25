use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'friend_links' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FriendLink {
    pub id: String,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    /// 'approved', 'pending' or 'rejected'.
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFriendLinkRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub url: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFriendLinkRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub url: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_link_status")]
    pub status: String,
}

fn default_link_status() -> String {
    "pending".to_string()
}
