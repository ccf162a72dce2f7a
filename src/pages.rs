//! Server-rendered placeholder pages.
//!
//! The real frontend is served elsewhere; these exist so every page route
//! answers and the gate's redirects have somewhere to land.

use axum::{
    Router,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::auth::Auth;

/// HTML files are never cached; the signed-in user differs per request.
pub const NO_CACHE: &str = "no-cache";

/// Pages contain no scripts and only load same-origin resources.
const PAGE_CSP: &str = "default-src 'self'; script-src 'none'; frame-ancestors 'none'";

pub fn router() -> Router {
    Router::new()
        .route("/", get(|| public_page("Arenas")))
        .route("/pricing", get(|| public_page("Pricing")))
        .route("/privacy", get(|| public_page("Privacy Policy")))
        .route("/terms", get(|| public_page("Terms")))
        .route("/terms-of-service", get(|| public_page("Terms of Service")))
        .route("/changelog", get(|| public_page("Changelog")))
        .route("/login", get(|| public_page("Log in")))
        .route("/register", get(|| public_page("Create an account")))
        .route("/signin", get(|| public_page("Sign in")))
        .route(
            "/auth/auth-code-error",
            get(|| public_page("This sign-in link is invalid or has expired")),
        )
        .route("/chat", get(|auth: Auth| protected_page("Chat", auth)))
        .route("/files", get(|auth: Auth| protected_page("Files", auth)))
        .route("/you", get(|auth: Auth| protected_page("Your account", auth)))
        .route(
            "/update-password",
            get(|auth: Auth| protected_page("Update password", auth)),
        )
}

async fn public_page(title: &'static str) -> Response {
    html_response(StatusCode::OK, &render(title, ""))
}

async fn protected_page(title: &'static str, Auth(identity): Auth) -> Response {
    let body = format!(
        "<p>Signed in as {}</p>\n\
         <form method=\"post\" action=\"/auth/signout\"><button>Sign out</button></form>",
        escape_html(&identity.email)
    );
    html_response(StatusCode::OK, &render(title, &body))
}

/// Fallback for unknown routes that made it past the gate.
pub async fn not_found() -> Response {
    html_response(StatusCode::NOT_FOUND, &render("Not found", ""))
}

fn render(title: &str, body: &str) -> String {
    let title = escape_html(title);
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn html_response(status: StatusCode, body: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, NO_CACHE),
            (header::CONTENT_SECURITY_POLICY, PAGE_CSP),
        ],
        body.to_owned(),
    )
        .into_response()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
