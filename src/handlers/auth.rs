// src/handlers/auth.rs

use axum::{Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::SqlitePool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest, TokenForm, User, UserInfo},
    utils::{
        hash::{hash_password, verify_password},
        jwt::sign_token,
    },
};

async fn authenticate(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, role, avatar, created_at
         FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    // Same error for unknown user and bad password.
    let user = user.ok_or_else(|| {
        AppError::AuthError("Incorrect username or password".to_string())
    })?;

    if !verify_password(password, &user.password)? {
        return Err(AppError::AuthError(
            "Incorrect username or password".to_string(),
        ));
    }

    Ok(user)
}

/// OAuth2-style token endpoint: form-encoded credentials in, bearer token out.
pub async fn token(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Form(payload): Form<TokenForm>,
) -> Result<impl IntoResponse, AppError> {
    let user = authenticate(&pool, &payload.username, &payload.password).await?;

    let token = sign_token(
        &user.username,
        &config.jwt_secret,
        config.jwt_algorithm,
        Some(Duration::minutes(config.token_expire_minutes)),
    )?;

    Ok(Json(json!({
        "access_token": token,
        "token_type": "bearer",
    })))
}

/// Authenticates a user and returns a token together with the identity payload.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = authenticate(&pool, &payload.username, &payload.password).await?;

    let token = sign_token(
        &user.username,
        &config.jwt_secret,
        config.jwt_algorithm,
        Some(Duration::minutes(config.token_expire_minutes)),
    )?;

    Ok(Json(json!({
        "token": token,
        "user": UserInfo::from(user),
    })))
}

/// Registers a new user with the default 'user' role.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let taken = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = ?")
        .bind(&payload.username)
        .fetch_optional(&pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::BadRequest("Username already registered".to_string()));
    }

    let taken = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = ?")
        .bind(&payload.email)
        .fetch_optional(&pool)
        .await?;
    if taken.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;
    let avatar = format!(
        "https://api.dicebear.com/7.x/adventurer/svg?seed={}",
        payload.username
    );

    let user = User {
        id: Uuid::new_v4().to_string(),
        username: payload.username,
        email: payload.email,
        password: hashed_password,
        role: "user".to_string(),
        avatar: Some(avatar),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO users (id, username, email, password, role, avatar, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.role)
    .bind(&user.avatar)
    .bind(user.created_at)
    .execute(&pool)
    .await
    .map_err(|e| {
        // The pre-checks race against concurrent registrations; the unique
        // constraints are the final arbiter.
        if e.as_database_error()
            .is_some_and(|db| db.is_unique_violation())
        {
            AppError::BadRequest("Username or email already registered".to_string())
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((StatusCode::CREATED, Json(UserInfo::from(user))))
}
