use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A category is addressed by name throughout the API.
#[derive(Debug, Deserialize, Serialize, FromRow, Validate)]
pub struct CategoryName {
    #[validate(length(
        min = 1,
        max = 50,
        message = "Category name must be between 1 and 50 characters"
    ))]
    pub name: String,
}
