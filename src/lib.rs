//! Huddle chat backend library.

pub mod admin;
pub mod auth;
pub mod chat;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod observability;
pub mod security;

pub use config::schema::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
