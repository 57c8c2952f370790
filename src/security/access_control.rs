//! Session-presence access rules.
//!
//! The gate only checks that a session cookie carries a value. Whether the
//! token maps to a live session is decided later by the handler extractors.

/// Prefix of the JSON API surface.
pub const API_PREFIX: &str = "/api";

/// Prefix of the browser page surface.
pub const PAGE_PREFIX: &str = "/app";

/// Where unauthenticated page requests are sent.
pub const LOGIN_PATH: &str = "/login";

/// API paths reachable without a session cookie.
pub const PUBLIC_API_ROUTES: [&str; 3] = ["/api/auth/login", "/api/auth/logout", "/api/health"];

/// Which part of the application a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Api,
    Page,
    Other,
}

impl Surface {
    pub fn of(path: &str) -> Self {
        if under(path, API_PREFIX) {
            Surface::Api
        } else if under(path, PAGE_PREFIX) {
            Surface::Page
        } else {
            Surface::Other
        }
    }
}

fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn is_public_api_route(path: &str) -> bool {
    PUBLIC_API_ROUTES.contains(&path)
}

/// What the gate does with a request after rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// 401 JSON for API requests.
    Unauthorized,
    /// 302 to the login page for page requests.
    RedirectToLogin,
}

pub fn evaluate(path: &str, has_session_cookie: bool) -> AccessDecision {
    match Surface::of(path) {
        Surface::Api if !has_session_cookie && !is_public_api_route(path) => {
            AccessDecision::Unauthorized
        }
        Surface::Page if !has_session_cookie => AccessDecision::RedirectToLogin,
        _ => AccessDecision::Allow,
    }
}
