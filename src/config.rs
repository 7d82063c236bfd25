// src/config.rs

use dotenvy::dotenv;
use jsonwebtoken::Algorithm;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_algorithm: Algorithm,
    /// Default lifetime of issued tokens, in minutes.
    pub token_expire_minutes: i64,
    pub upload_dir: PathBuf,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_algorithm = env::var("JWT_ALGORITHM")
            .unwrap_or_else(|_| "HS256".to_string())
            .parse()
            .expect("JWT_ALGORITHM must be a valid JWT algorithm name");

        let token_expire_minutes = env::var("TOKEN_EXPIRE_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()));

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_algorithm,
            token_expire_minutes,
            upload_dir,
            rust_log,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            admin_email: env::var("ADMIN_EMAIL").ok(),
        }
    }
}
