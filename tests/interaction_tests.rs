// tests/interaction_tests.rs

use blog_backend::{config::Config, routes, state::AppState};
use jsonwebtoken::Algorithm;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

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
        jwt_secret: "test_secret_for_integration_tests".to_string(),
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

async fn signup(
    client: &reqwest::Client,
    address: &str,
    pool: &SqlitePool,
    username: &str,
    role: &str,
) -> String {
    let response = client
        .post(format!("{}/api/register", address))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{}@x.com", username),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Register failed");
    assert_eq!(response.status().as_u16(), 201);

    sqlx::query("UPDATE users SET role = ? WHERE username = ?")
        .bind(role)
        .bind(username)
        .execute(pool)
        .await
        .unwrap();

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
        .unwrap();
    body["token"].as_str().expect("Token not found").to_string()
}

async fn seed_post(
    client: &reqwest::Client,
    address: &str,
    author_token: &str,
) -> String {
    let body: serde_json::Value = client
        .post(format!("{}/api/posts", address))
        .header("Authorization", format!("Bearer {}", author_token))
        .json(&serde_json::json!({
            "title": "Target",
            "content": "body",
            "category": "Tech",
            "status": "published"
        }))
        .send()
        .await
        .expect("Create post failed")
        .json()
        .await
        .unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn second_like_fails_and_leaves_a_single_row() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "amy", "editor").await;
    let reader = signup(&client, &address, &pool, "ben", "user").await;
    let post_id = seed_post(&client, &address, &author).await;

    let response = client
        .post(format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .post(format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post_likes WHERE post_id = ?")
        .bind(&post_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let likes: serde_json::Value = client
        .get(format!("{}/api/posts/{}/likes", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(likes["likes"], 1);
}

#[tokio::test]
async fn unlike_removes_the_like_then_404s() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "cal", "editor").await;
    let post_id = seed_post(&client, &address, &author).await;

    client
        .post(format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", author))
        .send()
        .await
        .unwrap();

    let response = client
        .delete(format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", author))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .delete(format!("{}/api/posts/{}/like", address, post_id))
        .header("Authorization", format!("Bearer {}", author))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn likes_on_unknown_posts_are_404() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let reader = signup(&client, &address, &pool, "deb", "user").await;

    let missing = uuid::Uuid::new_v4().to_string();
    let response = client
        .post(format!("{}/api/posts/{}/like", address, missing))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client
        .get(format!("{}/api/posts/{}/likes", address, missing))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn plain_users_can_comment_and_list_is_oldest_first() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "eli", "editor").await;
    let reader = signup(&client, &address, &pool, "fae", "user").await;
    let post_id = seed_post(&client, &address, &author).await;

    for text in ["first", "second"] {
        let response = client
            .post(format!("{}/api/comments", address))
            .header("Authorization", format!("Bearer {}", reader))
            .json(&serde_json::json!({ "content": text, "postId": post_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["content"], text);
        assert_eq!(body["author"], "fae");
        assert_eq!(body["postId"], post_id.as_str());
        assert!(body["parentId"].is_null());
    }

    let comments: Vec<serde_json::Value> = client
        .get(format!("{}/api/posts/{}/comments", address, post_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0]["content"], "first");
    assert_eq!(comments[1]["content"], "second");

    // Comment on a missing post
    let response = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&serde_json::json!({
            "content": "lost",
            "postId": uuid::Uuid::new_v4().to_string()
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn comment_validation_rejects_empty_content() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "gus", "editor").await;
    let post_id = seed_post(&client, &address, &author).await;

    let response = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", format!("Bearer {}", author))
        .json(&serde_json::json!({ "content": "", "postId": post_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn deleting_a_comment_takes_its_replies_with_it() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "hal", "editor").await;
    let reader = signup(&client, &address, &pool, "ida", "user").await;
    let post_id = seed_post(&client, &address, &author).await;

    let parent: serde_json::Value = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&serde_json::json!({ "content": "root", "postId": post_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let parent_id = parent["id"].as_str().unwrap();

    for text in ["reply one", "reply two"] {
        let response = client
            .post(format!("{}/api/comments/{}/reply", address, parent_id))
            .header("Authorization", format!("Bearer {}", author))
            .json(&serde_json::json!({ "content": text, "postId": post_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["parentId"], parent_id);
    }

    let response = client
        .delete(format!("{}/api/comments/{}", address, parent_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE post_id = ?")
        .bind(&post_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn reply_to_unknown_comment_is_404() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "joe", "editor").await;
    let post_id = seed_post(&client, &address, &author).await;

    let response = client
        .post(format!(
            "{}/api/comments/{}/reply",
            address,
            uuid::Uuid::new_v4()
        ))
        .header("Authorization", format!("Bearer {}", author))
        .json(&serde_json::json!({ "content": "orphan", "postId": post_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn only_comment_author_or_admin_may_delete() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let author = signup(&client, &address, &pool, "kim", "editor").await;
    let reader = signup(&client, &address, &pool, "leo", "user").await;
    let admin = signup(&client, &address, &pool, "mia", "admin").await;
    let post_id = seed_post(&client, &address, &author).await;

    let comment: serde_json::Value = client
        .post(format!("{}/api/comments", address))
        .header("Authorization", format!("Bearer {}", author))
        .json(&serde_json::json!({ "content": "keep out", "postId": post_id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let comment_id = comment["id"].as_str().unwrap();

    // A non-author without ManageUsers is rejected
    let response = client
        .delete(format!("{}/api/comments/{}", address, comment_id))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // An admin may delete anyone's comment
    let response = client
        .delete(format!("{}/api/comments/{}", address, comment_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Gone now
    let response = client
        .delete(format!("{}/api/comments/{}", address, comment_id))
        .header("Authorization", format!("Bearer {}", admin))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
