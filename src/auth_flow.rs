//! Routes that create and end sessions.
//!
//! `/auth/confirm` and `/auth/callback` exchange an emailed one-time code for
//! a session and store its access token in the session cookie.
//! `/auth/signout` drops the session everywhere it is known.

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::{SessionResolver, clear_session_cookie, extract_session_token, session_cookie};
use crate::policy::is_local_path;
use crate::provider::{OtpKind, ProviderError};
use crate::rate_limit::{RateLimitConfig, rate_limit_otp_verify};

/// Landing page when a one-time code cannot be verified.
pub const AUTH_CODE_ERROR_PATH: &str = "/auth/auth-code-error";

const CONFIRM_DEFAULT_NEXT: &str = "/you";
const CALLBACK_DEFAULT_NEXT: &str = "/";

#[derive(Clone)]
pub struct AuthFlowState {
    pub resolver: SessionResolver,
    pub login_path: String,
    pub secure_cookies: bool,
}

pub fn router(state: AuthFlowState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let verify_routes = Router::new()
        .route("/auth/confirm", get(confirm))
        .route("/auth/callback", get(callback))
        .layer(middleware::from_fn_with_state(
            rate_limits,
            rate_limit_otp_verify,
        ));

    Router::new()
        .route("/auth/signout", post(signout))
        .merge(verify_routes)
        .with_state(state)
}

#[derive(Deserialize)]
struct OtpQuery {
    token_hash: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    next: Option<String>,
    /// Takes precedence over `next` when both are given.
    #[serde(rename = "redirectUrl")]
    redirect_url: Option<String>,
}

type OtpQueryResult = Result<Query<OtpQuery>, QueryRejection>;

async fn confirm(State(state): State<AuthFlowState>, query: OtpQueryResult) -> Response {
    verify_and_redirect(&state, query, CONFIRM_DEFAULT_NEXT).await
}

async fn callback(State(state): State<AuthFlowState>, query: OtpQueryResult) -> Response {
    verify_and_redirect(&state, query, CALLBACK_DEFAULT_NEXT).await
}

async fn verify_and_redirect(
    state: &AuthFlowState,
    query: OtpQueryResult,
    default_next: &str,
) -> Response {
    let query = match query {
        Ok(Query(query)) => query,
        Err(e) => {
            debug!(error = %e, "Malformed one-time code query");
            return code_error(state.secure_cookies);
        }
    };

    let token_hash = query.token_hash.as_deref().filter(|t| !t.is_empty());
    let kind = query.kind.as_deref().and_then(OtpKind::parse);

    let (Some(token_hash), Some(kind)) = (token_hash, kind) else {
        debug!("One-time code request missing token_hash or type");
        return code_error(state.secure_cookies);
    };

    let session = match state.resolver.provider().verify_otp(token_hash, kind).await {
        Ok(session) => session,
        Err(e @ ProviderError::InvalidCredential(_)) => {
            debug!(error = %e, kind = kind.as_str(), "One-time code rejected");
            return code_error(state.secure_cookies);
        }
        Err(e) => {
            warn!(error = %e, kind = kind.as_str(), "One-time code verification failed");
            return code_error(state.secure_cookies);
        }
    };

    state
        .resolver
        .remember(&session.access_token, &session.identity);
    info!(
        subject = %session.identity.subject_id,
        kind = kind.as_str(),
        "Session issued from one-time code"
    );

    let target = query.redirect_url.as_deref().or(query.next.as_deref());
    let location = safe_next(target, default_next);
    let cookie = session_cookie(
        &session.access_token,
        session.expires_in,
        state.secure_cookies,
    );

    (
        StatusCode::SEE_OTHER,
        [(header::LOCATION, location), (header::SET_COOKIE, cookie)],
    )
        .into_response()
}

async fn signout(State(state): State<AuthFlowState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_session_token(&headers) {
        state.resolver.invalidate(token);

        match state.resolver.provider().revoke_session(token).await {
            Ok(()) => debug!("Session revoked at provider"),
            // Already expired or revoked
            Err(ProviderError::InvalidCredential(_)) => {}
            Err(e) => warn!(error = %e, "Failed to revoke session at provider"),
        }
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, state.login_path.clone()),
            (header::SET_COOKIE, clear_session_cookie(state.secure_cookies)),
        ],
    )
        .into_response()
}

fn code_error(secure_cookies: bool) -> Response {
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, AUTH_CODE_ERROR_PATH.to_string()),
            (header::SET_COOKIE, clear_session_cookie(secure_cookies)),
        ],
    )
        .into_response()
}

/// Only same-site absolute paths are followed after sign-in.
fn safe_next(next: Option<&str>, default: &str) -> String {
    match next {
        Some(next) if is_local_path(next) => next.to_string(),
        Some(next) => {
            debug!(next, "Ignoring off-site redirect target");
            default.to_string()
        }
        None => default.to_string(),
    }
}
