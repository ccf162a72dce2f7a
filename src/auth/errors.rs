//! Responses produced when the gate blocks a request.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Stable error body for unauthenticated API requests.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Why the gate refused to pass a request on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateRejection {
    /// Protected page: send the browser to the login page.
    Redirect { location: String },
    /// Protected API: machine-readable error with the configured status.
    Unauthorized { status: StatusCode },
}

impl GateRejection {
    /// Redirect to `login_path`, carrying the original target as `next`.
    pub fn redirect_to_login(login_path: &str, original: &str) -> Self {
        let next: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
        let separator = if login_path.contains('?') { '&' } else { '?' };
        GateRejection::Redirect {
            location: format!("{}{}next={}", login_path, separator, next),
        }
    }

    pub fn unauthorized(status: StatusCode) -> Self {
        GateRejection::Unauthorized { status }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Redirect { location } => {
                // 303: the login page only answers GET
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
            }
            GateRejection::Unauthorized { status } => (
                status,
                Json(ErrorResponse {
                    error: UNAUTHORIZED_MESSAGE,
                }),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_encodes_next() {
        let rejection = GateRejection::redirect_to_login("/login", "/chat?id=1&x=2");
        assert_eq!(
            rejection,
            GateRejection::Redirect {
                location: "/login?next=%2Fchat%3Fid%3D1%26x%3D2".to_string()
            }
        );
    }

    #[test]
    fn test_redirect_appends_to_existing_query() {
        let rejection = GateRejection::redirect_to_login("/login?mode=signin", "/you");
        assert_eq!(
            rejection,
            GateRejection::Redirect {
                location: "/login?mode=signin&next=%2Fyou".to_string()
            }
        );
    }

    #[test]
    fn test_redirect_response() {
        let response = GateRejection::redirect_to_login("/login", "/chat").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fchat"
        );
    }

    #[tokio::test]
    async fn test_unauthorized_response_body() {
        let response = GateRejection::unauthorized(StatusCode::UNAUTHORIZED).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"error": "Unauthorized"}));
    }
}
