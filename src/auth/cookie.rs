//! Session cookie reading and writing.

use axum::http::{header, HeaderMap, HeaderValue};

/// Non-empty value of cookie `name` from the request's `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(name: &str, token: &str, max_age_secs: u64, secure: bool) -> Option<HeaderValue> {
    build(name, token, max_age_secs, secure)
}

/// `Set-Cookie` value that deletes the session cookie.
pub fn clear_cookie(name: &str, secure: bool) -> Option<HeaderValue> {
    build(name, "", 0, secure)
}

fn build(name: &str, value: &str, max_age_secs: u64, secure: bool) -> Option<HeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; session=abc123"));
        assert_eq!(read_cookie(&headers, "session"), Some("abc123"));
        assert_eq!(read_cookie(&headers, "sess"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_value_is_absent() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("session="));
        assert_eq!(read_cookie(&headers, "session"), None);
    }

    #[test]
    fn test_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("session=xyz"));
        assert_eq!(read_cookie(&headers, "session"), Some("xyz"));
    }

    #[test]
    fn test_set_cookie_attributes() {
        let value = session_cookie("session", "tok", 60, true).unwrap();
        assert_eq!(
            value.to_str().unwrap(),
            "session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60; Secure"
        );
        let cleared = clear_cookie("session", false).unwrap();
        assert_eq!(
            cleared.to_str().unwrap(),
            "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
