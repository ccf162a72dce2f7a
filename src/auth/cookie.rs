//! Session credential parsing and cookie construction.

use axum::http::{HeaderMap, header};

/// Cookie carrying the identity provider's access token.
pub const SESSION_COOKIE_NAME: &str = "sb-access-token";

/// Extract a cookie value. HTTP/2 clients may split cookies across several
/// Cookie fields, so every field is searched in order.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|field| field.split(';'))
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim())
}

/// Extract a bearer token from the Authorization header.
pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim())
}

/// Session token presented by the request: cookie first, then bearer header.
/// Empty values count as absent.
pub fn extract_session_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, SESSION_COOKIE_NAME)
        .filter(|t| !t.is_empty())
        .or_else(|| get_bearer_token(headers).filter(|t| !t.is_empty()))
}

/// Build the Set-Cookie value for a freshly issued session.
pub fn session_cookie(token: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        SESSION_COOKIE_NAME,
        token,
        max_age,
        secure_attr(secure)
    )
}

/// Build the Set-Cookie value that removes the session cookie.
pub fn clear_session_cookie(secure: bool) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{}",
        SESSION_COOKIE_NAME,
        secure_attr(secure)
    )
}

fn secure_attr(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=abc123"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; sb-access-token=abc123; theme=dark"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
        assert_eq!(get_cookie(&headers, "theme"), Some("dark"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  sb-access-token = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_across_split_fields() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=abc123"),
        );

        assert_eq!(get_cookie(&headers, SESSION_COOKIE_NAME), Some("abc123"));
        assert_eq!(extract_session_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer tok-1"),
        );
        assert_eq!(get_bearer_token(&headers), Some("tok-1"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("bearer tok-2"),
        );
        assert_eq!(get_bearer_token(&headers), Some("tok-2"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(get_bearer_token(&headers), None);
    }

    #[test]
    fn test_cookie_takes_precedence_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=from-cookie"),
        );
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_session_token(&headers), Some("from-cookie"));
    }

    #[test]
    fn test_empty_cookie_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sb-access-token="));
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(extract_session_token(&headers), Some("from-header"));
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", 3600, true);
        assert_eq!(
            cookie,
            "sb-access-token=tok; HttpOnly; SameSite=Lax; Path=/; Max-Age=3600; Secure"
        );

        let cleared = clear_session_cookie(false);
        assert_eq!(
            cleared,
            "sb-access-token=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0"
        );
    }
}
