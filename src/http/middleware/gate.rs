//! Request gate.
//!
//! Runs in front of every route:
//! 1. API surface: count the request against `client:path` and answer 429
//!    once the window is exhausted.
//! 2. Require a non-empty session cookie on private API paths (401) and on
//!    the page surface (302 to the login page).
//!
//! The gate never resolves sessions; a stale cookie passes here and is
//! rejected by the handler's extractor.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::auth::cookie::read_cookie;
use crate::http::request::RequestIdExt;
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::access_control::{self, AccessDecision, Surface, LOGIN_PATH};
use crate::security::headers::client_identifier;
use crate::security::RateLimitDecision;

pub async fn gate_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = match check(&state, &request, &path) {
        Some(rejection) => rejection,
        None => next.run(request).await,
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), started);
    response
}

/// The rejection to send, if any.
fn check(state: &AppState, request: &Request<Body>, path: &str) -> Option<Response> {
    if Surface::of(path) == Surface::Api {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let client = client_identifier(request.headers(), peer);

        if let RateLimitDecision::Limited { retry_after } = state.limiter.check(&client, path) {
            warn!(
                request_id = %request.request_id(),
                client = %client,
                path = %path,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            metrics::record_gate_rejection("rate_limited");
            return Some(ApiError::RateLimited { retry_after }.into_response());
        }
    }

    let has_session = read_cookie(request.headers(), &state.config.auth.cookie_name).is_some();
    match access_control::evaluate(path, has_session) {
        AccessDecision::Allow => None,
        AccessDecision::Unauthorized => {
            warn!(request_id = %request.request_id(), path = %path, "Missing session cookie");
            metrics::record_gate_rejection("unauthorized");
            Some(ApiError::Unauthorized.into_response())
        }
        AccessDecision::RedirectToLogin => {
            metrics::record_gate_rejection("redirect");
            // axum's Redirect helpers answer 303/307; page guards use 302.
            Some((StatusCode::FOUND, [(header::LOCATION, LOGIN_PATH)]).into_response())
        }
    }
}
