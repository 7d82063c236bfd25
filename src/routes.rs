// src/routes.rs

use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    handlers::{auth, friend_links, interaction, posts, settings, taxonomy, uploads, users},
    state::AppState,
};

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the blog API" }))
}

/// Assembles the main application router.
///
/// * Registers one route per entity/action; protected handlers authenticate
///   themselves through the `CurrentUser` extractor.
/// * Applies global middleware (Trace, CORS) and serves the upload directory
///   read-only under /uploads.
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        // Authentication
        .route("/token", post(auth::token))
        .route("/api/login", post(auth::login))
        .route("/api/register", post(auth::register))
        // Users
        .route("/api/users/me", get(users::me))
        .route("/api/users/profile", put(users::update_profile))
        .route("/api/users/{username}/role", put(users::update_role))
        // Posts
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/posts/{id}/cover", post(posts::upload_cover))
        .route("/api/search", get(posts::search_posts))
        // Likes and comments
        .route(
            "/api/posts/{id}/like",
            post(interaction::like_post).delete(interaction::unlike_post),
        )
        .route("/api/posts/{id}/likes", get(interaction::get_post_likes))
        .route(
            "/api/posts/{id}/comments",
            get(interaction::list_post_comments),
        )
        .route("/api/comments", post(interaction::create_comment))
        .route("/api/comments/{id}", delete(interaction::delete_comment))
        .route("/api/comments/{id}/reply", post(interaction::reply_comment))
        // Categories and tags
        .route(
            "/api/categories",
            get(taxonomy::list_categories).post(taxonomy::create_category),
        )
        .route("/api/categories/{name}", delete(taxonomy::delete_category))
        .route("/api/tags", get(taxonomy::list_tags).post(taxonomy::create_tag))
        .route("/api/tags/{name}", delete(taxonomy::delete_tag))
        // Settings
        .route(
            "/api/settings/{category}",
            get(settings::get_settings).put(settings::update_settings),
        )
        // Friend links
        .route(
            "/api/friend-links",
            get(friend_links::list_friend_links).post(friend_links::create_friend_link),
        )
        .route(
            "/api/friend-links/{id}",
            put(friend_links::update_friend_link).delete(friend_links::delete_friend_link),
        )
        // Uploads
        .route("/api/upload", post(uploads::upload_file))
        .route("/api/upload/list", get(uploads::list_files))
        .route("/api/upload/delete", delete(uploads::delete_file))
        .route("/api/upload/rename", post(uploads::rename_file))
        // Uploaded media, served read-only.
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
