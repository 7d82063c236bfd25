// src/handlers/settings.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{error::AppError, models::setting::default_settings};

/// Get a settings blob by category (basic/profile/advanced).
/// Serves the application defaults while no row has been stored.
pub async fn get_settings(
    State(pool): State<SqlitePool>,
    Path(category): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let defaults = default_settings(&category)
        .ok_or_else(|| AppError::NotFound("Unknown settings category".to_string()))?;

    let stored = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(&category)
        .fetch_optional(&pool)
        .await?;

    let value = match stored {
        Some(raw) => serde_json::from_str(&raw)?,
        None => defaults,
    };

    Ok(Json(value))
}

/// Replace a settings blob by category.
pub async fn update_settings(
    State(pool): State<SqlitePool>,
    Path(category): Path<String>,
    Json(value): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    if default_settings(&category).is_none() {
        return Err(AppError::NotFound("Unknown settings category".to_string()));
    }

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO settings (id, key, value, category, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&category)
    .bind(serde_json::to_string(&value)?)
    .bind(&category)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    Ok(Json(value))
}
