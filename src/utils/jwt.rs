// src/utils/jwt.rs

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    models::user::User,
    permissions::{Permission, permissions_for},
    state::AppState,
};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - the username of the authenticated user.
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: i64,
}

/// Signs a new token for the given subject.
///
/// When `expiry` is `None`, a 15-minute lifetime is used; the application
/// normally passes its configured lifetime instead.
pub fn sign_token(
    subject: &str,
    secret: &str,
    algorithm: Algorithm,
    expiry: Option<Duration>,
) -> Result<String, AppError> {
    let expiry = expiry.unwrap_or_else(|| Duration::minutes(15));

    let claims = Claims {
        sub: subject.to_owned(),
        exp: (Utc::now() + expiry).timestamp(),
    };

    encode(
        &Header::new(algorithm),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

/// Verifies and decodes a token string.
///
/// All failures (bad signature, malformed payload, expired) collapse into the
/// same 401 error, so callers cannot distinguish expired from invalid.
pub fn verify_token(token: &str, secret: &str, algorithm: Algorithm) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(algorithm),
    )
    .map_err(|_| AppError::AuthError("Could not validate credentials".to_string()))?;

    Ok(token_data.claims)
}

/// The authenticated caller, resolved once per request.
///
/// Carries the identity row and the static permission slice for its role.
/// Handlers perform explicit capability checks via [`CurrentUser::require`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub permissions: &'static [Permission],
}

impl CurrentUser {
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "You do not have permission to perform this action".to_string(),
            ))
        }
    }
}

/// Axum extractor: authentication.
///
/// Reads the 'Authorization: Bearer <token>' header, verifies the token and
/// loads the user it names. Fails with 401 if the token is missing, invalid,
/// expired, or the user no longer exists.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::AuthError("Missing Authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::AuthError("Invalid Authorization header".to_string()))?;

        let claims = verify_token(token, &state.config.jwt_secret, state.config.jwt_algorithm)?;

        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password, role, avatar, created_at
             FROM users WHERE username = ?",
        )
        .bind(&claims.sub)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Could not validate credentials".to_string()))?;

        Ok(CurrentUser {
            permissions: permissions_for(&user.role),
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            avatar: user.avatar,
            created_at: user.created_at,
        })
    }
}
