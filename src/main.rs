// src/main.rs

use blog_backend::config::Config;
use blog_backend::routes;
use blog_backend::state::AppState;
use blog_backend::utils::hash::hash_password;
use chrono::Utc;
use dotenvy::dotenv;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .expect("DATABASE_URL must be a valid sqlite connection string")
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Best-effort seeding: failures are logged and startup continues.
    if let Err(e) = seed_initial_data(&pool, &config).await {
        tracing::error!("Failed to seed initial data: {:?}", e);
    }

    // Ensure the upload directory exists
    if let Err(e) = tokio::fs::create_dir_all(&config.upload_dir).await {
        tracing::error!("Failed to create upload directory: {:?}", e);
    }

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

async fn seed_initial_data(
    pool: &SqlitePool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        let user_exists =
            sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE username = ?")
                .bind(username)
                .fetch_optional(pool)
                .await?;

        if user_exists.is_none() {
            tracing::info!("Seeding admin user: {}", username);
            let hashed_password = hash_password(password)?;
            let email = config
                .admin_email
                .clone()
                .unwrap_or_else(|| format!("{}@example.com", username));

            sqlx::query(
                "INSERT INTO users (id, username, email, password, role, avatar, created_at)
                 VALUES (?, ?, ?, ?, 'admin', NULL, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(username)
            .bind(email)
            .bind(hashed_password)
            .bind(Utc::now())
            .execute(pool)
            .await?;
            tracing::info!("Admin user created successfully.");
        }
    }

    let categories = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await?;
    if categories == 0 {
        for name in ["Tech", "Life"] {
            sqlx::query("INSERT INTO categories (id, name, created_at) VALUES (?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(name)
                .bind(Utc::now())
                .execute(pool)
                .await?;
        }
        tracing::info!("Seeded starter categories.");
    }

    let tags = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tags")
        .fetch_one(pool)
        .await?;
    if tags == 0 {
        for name in ["rust", "web"] {
            sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(name)
                .bind(Utc::now())
                .execute(pool)
                .await?;
        }
        tracing::info!("Seeded starter tags.");
    }

    Ok(())
}
