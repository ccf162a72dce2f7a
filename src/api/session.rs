use axum::{Json, Router, response::IntoResponse, routing::get};

use crate::auth::Auth;

pub fn router() -> Router {
    Router::new().route("/", get(current_session))
}

/// The identity the gate resolved for this request.
async fn current_session(Auth(identity): Auth) -> impl IntoResponse {
    Json(identity)
}
