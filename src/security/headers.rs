//! Client identification from forwarding headers.
//!
//! # Responsibilities
//! - Derive the client identifier used to key rate limits
//!
//! # Design Decisions
//! - The server runs behind a trusted proxy, so the first `X-Forwarded-For`
//!   entry is the client
//! - Falls back to the peer address, then to a shared "unknown" bucket

use std::net::SocketAddr;

use axum::http::HeaderMap;

/// Header listing the forwarded client chain.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Identifier used when neither the header nor the peer address is known.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the client identifier for a request.
pub fn client_identifier(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}
