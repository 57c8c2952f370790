//! Request identification.
//!
//! Every request gets an `x-request-id` (UUID v4) as early as possible so the
//! trace span, gate logs and the response all carry the same id. A client
//! supplied id is kept.

use axum::http::{HeaderMap, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Read the request id set by [`set_request_id_layer`].
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_request_id_lookup() {
        let request = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request.request_id(), "abc-123");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bare.request_id(), "unknown");
    }
}
