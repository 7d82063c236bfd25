// src/handlers/mod.rs

pub mod auth;
pub mod friend_links;
pub mod interaction;
pub mod posts;
pub mod settings;
pub mod taxonomy;
pub mod uploads;
pub mod users;
