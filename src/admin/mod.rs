//! Account administration.
//!
//! Routes live under `/api/admin` and pass through the request gate like any
//! other API path; the [`AdminUser`](crate::http::extract::AdminUser)
//! extractor then requires an admin session.

pub mod handlers;

use axum::{
    routing::{get, patch},
    Router,
};

use crate::http::server::AppState;
use self::handlers::{create_user, list_users, update_social_counts};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(list_users).post(create_user))
        .route("/api/admin/users/{id}", patch(update_social_counts))
}
