// src/models/mod.rs

pub mod category;
pub mod comment;
pub mod friend_link;
pub mod post;
pub mod setting;
pub mod tag;
pub mod user;
