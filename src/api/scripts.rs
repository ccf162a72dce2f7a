use axum::{
    Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post,
};
use serde::Deserialize;

use super::ApiState;
use super::error::{ApiError, ResultExt, validate_name, validate_uuid};
use crate::auth::Auth;
use crate::db::{ScriptRuntime, ScriptUpdate};

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", post(create_script).put(update_script))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateScriptRequest {
    workspace_id: String,
    name: String,
    #[serde(default)]
    content: String,
    #[serde(default = "default_runtime")]
    runtime: ScriptRuntime,
}

fn default_runtime() -> ScriptRuntime {
    ScriptRuntime::Python
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateScriptRequest {
    script_id: String,
    updates: ScriptUpdates,
}

#[derive(Deserialize, Default)]
struct ScriptUpdates {
    name: Option<String>,
    content: Option<String>,
    runtime: Option<ScriptRuntime>,
}

async fn create_script(
    State(state): State<ApiState>,
    Auth(identity): Auth,
    Json(payload): Json<CreateScriptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&payload.workspace_id)?;
    let name = validate_name(&payload.name, "Script name")?;

    let script = state
        .db
        .scripts()
        .create(
            &identity.subject_id,
            &payload.workspace_id,
            &name,
            &payload.content,
            payload.runtime,
        )
        .await
        .db_err("Failed to create script")?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    Ok((StatusCode::CREATED, Json(script)))
}

async fn update_script(
    State(state): State<ApiState>,
    Auth(identity): Auth,
    Json(payload): Json<UpdateScriptRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&payload.script_id)?;

    let name = match payload.updates.name.as_deref() {
        Some(name) => Some(validate_name(name, "Script name")?),
        None => None,
    };
    let update = ScriptUpdate {
        name,
        content: payload.updates.content,
        runtime: payload.updates.runtime,
    };

    let script = state
        .db
        .scripts()
        .update(&identity.subject_id, &payload.script_id, &update)
        .await
        .db_err("Failed to update script")?
        .ok_or_else(|| ApiError::not_found("Script not found"))?;

    Ok(Json(script))
}
