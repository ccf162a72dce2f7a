use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::ApiState;
use super::error::ApiError;
use crate::newsletter::is_plausible_email;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(subscribe))
        .with_state(state)
}

#[derive(Deserialize)]
struct SubscribeRequest {
    email: String,
}

async fn subscribe(
    State(state): State<ApiState>,
    Json(payload): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let client = state
        .newsletter
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Newsletter is not configured"))?;

    let email = payload.email.trim();
    if !is_plausible_email(email) {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    client.subscribe(email).await.map_err(|e| {
        error!("Newsletter subscription error: {}", e);
        ApiError::bad_gateway("Failed to subscribe to newsletter")
    })?;

    Ok(Json(json!({ "success": true })))
}
