mod error;
mod health;
mod newsletter;
mod scripts;
mod session;
mod workspaces;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::db::Database;
use crate::newsletter::NewsletterClient;
use crate::rate_limit::{RateLimitConfig, rate_limit_newsletter};

pub use error::{ApiError, ResultExt};

/// Shared state of the data API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub db: Database,
    pub newsletter: Option<Arc<NewsletterClient>>,
}

/// Create the API router. Authentication is enforced by the access gate in
/// front of it; handlers only read the attached identity.
pub fn create_api_router(state: ApiState, rate_limits: Arc<RateLimitConfig>) -> Router {
    let newsletter_router = newsletter::router(state.clone()).layer(
        middleware::from_fn_with_state(rate_limits, rate_limit_newsletter),
    );

    Router::new()
        .nest("/health", health::router())
        .nest("/newsletter", newsletter_router)
        .nest("/session", session::router())
        .nest("/workspaces", workspaces::router(state.clone()))
        .nest("/scripts", scripts::router(state))
}
