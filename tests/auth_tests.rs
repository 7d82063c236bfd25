// tests/auth_tests.rs

use blog_backend::{config::Config, routes, state::AppState};
use jsonwebtoken::Algorithm;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Spawns the app on a random port backed by a fresh in-memory database.
/// Returns the base URL and a handle to the shared pool for direct assertions.
async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory sqlite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_algorithm: Algorithm::HS256,
        token_expire_minutes: 10,
        upload_dir: std::env::temp_dir().join(format!("blog-test-{}", uuid::Uuid::new_v4())),
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        admin_email: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };
    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

async fn register(client: &reqwest::Client, address: &str, username: &str, email: &str) {
    let response = client
        .post(format!("{}/api/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);
}

async fn login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let body: serde_json::Value = client
        .post(format!("{}/api/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");
    body["token"].as_str().expect("Token not found").to_string()
}

async fn set_role(pool: &SqlitePool, username: &str, role: &str) {
    sqlx::query("UPDATE users SET role = ? WHERE username = ?")
        .bind(role)
        .bind(username)
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn register_returns_identity_without_password() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/register", address))
        .json(&serde_json::json!({
            "username": "alice",
            "email": "alice@x.com",
            "password": "pw123"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "alice@x.com");
    assert_eq!(body["role"], "user");
    assert!(body.get("password").is_none());
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn register_duplicate_username_fails() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "bob", "bob@x.com").await;

    let response = client
        .post(format!("{}/api/register", address))
        .json(&serde_json::json!({
            "username": "bob",
            "email": "other@x.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_duplicate_email_fails() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "carol", "carol@x.com").await;

    let response = client
        .post(format!("{}/api/register", address))
        .json(&serde_json::json!({
            "username": "carol2",
            "email": "carol@x.com",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn login_round_trips_to_identity() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "dave", "dave@x.com").await;

    let body: serde_json::Value = client
        .post(format!("{}/api/login", address))
        .json(&serde_json::json!({
            "username": "dave",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["user"]["username"], "dave");
    let token = body["token"].as_str().unwrap();

    let me: serde_json::Value = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["username"], "dave");
    assert_eq!(me["email"], "dave@x.com");
}

#[tokio::test]
async fn token_endpoint_accepts_form_credentials() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "erin", "erin@x.com").await;

    let response = client
        .post(format!("{}/token", address))
        .form(&[("username", "erin"), ("password", "password123")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");

    let me = client
        .get(format!("{}/api/users/me", address))
        .header(
            "Authorization",
            format!("Bearer {}", body["access_token"].as_str().unwrap()),
        )
        .send()
        .await
        .unwrap();
    assert_eq!(me.status().as_u16(), 200);
}

#[tokio::test]
async fn login_with_bad_credentials_fails_401() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "frank", "frank@x.com").await;

    // Wrong password
    let response = client
        .post(format!("{}/api/login", address))
        .json(&serde_json::json!({
            "username": "frank",
            "password": "wrong-password"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body.get("token").is_none());

    // Unknown user
    let response = client
        .post(format!("{}/api/login", address))
        .json(&serde_json::json!({
            "username": "nobody",
            "password": "password123"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn me_rejects_missing_and_invalid_tokens() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/users/me", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);

    let response = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", "Bearer not.a.token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn expired_token_is_unauthenticated() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "grace", "grace@x.com").await;

    // Expired beyond the verifier's leeway.
    let stale = blog_backend::utils::jwt::sign_token(
        "grace",
        JWT_SECRET,
        Algorithm::HS256,
        Some(chrono::Duration::seconds(-120)),
    )
    .unwrap();

    let response = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", stale))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn token_for_deleted_user_is_unauthenticated() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "henry", "henry@x.com").await;
    let token = login(&client, &address, "henry").await;

    sqlx::query("DELETE FROM users WHERE username = 'henry'")
        .execute(&pool)
        .await
        .unwrap();

    let response = client
        .get(format!("{}/api/users/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn profile_update_changes_email_and_rejects_taken_email() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "ivy", "ivy@x.com").await;
    register(&client, &address, "jack", "jack@x.com").await;
    let token = login(&client, &address, "ivy").await;

    let response = client
        .put(format!("{}/api/users/profile", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "email": "ivy-new@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["email"], "ivy-new@x.com");

    // Taken by jack
    let response = client
        .put(format!("{}/api/users/profile", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "email": "jack@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn role_updates_are_admin_gated() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    register(&client, &address, "root", "root@x.com").await;
    register(&client, &address, "kate", "kate@x.com").await;
    set_role(&pool, "root", "admin").await;

    let admin_token = login(&client, &address, "root").await;
    let kate_token = login(&client, &address, "kate").await;

    // Plain user cannot manage roles
    let response = client
        .put(format!("{}/api/users/root/role?role=user", address))
        .header("Authorization", format!("Bearer {}", kate_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Admin promotes kate to editor
    let response = client
        .put(format!("{}/api/users/kate/role?role=editor", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let role: String = sqlx::query_scalar("SELECT role FROM users WHERE username = 'kate'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(role, "editor");

    // Unknown role
    let response = client
        .put(format!("{}/api/users/kate/role?role=superuser", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Unknown user
    let response = client
        .put(format!("{}/api/users/nobody/role?role=editor", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
