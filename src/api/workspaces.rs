use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;

use super::ApiState;
use super::error::{ApiError, ResultExt, validate_name, validate_uuid};
use crate::auth::Auth;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(list_workspaces).post(create_workspace))
        .route("/{id}", delete(delete_workspace))
        .route("/{id}/scripts", get(list_scripts))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateWorkspaceRequest {
    name: String,
    #[serde(default)]
    description: String,
}

async fn list_workspaces(
    State(state): State<ApiState>,
    Auth(identity): Auth,
) -> Result<impl IntoResponse, ApiError> {
    let workspaces = state
        .db
        .workspaces()
        .list(&identity.subject_id)
        .await
        .db_err("Failed to fetch workspaces")?;

    Ok(Json(workspaces))
}

async fn create_workspace(
    State(state): State<ApiState>,
    Auth(identity): Auth,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = validate_name(&payload.name, "Workspace name")?;

    let workspace = state
        .db
        .workspaces()
        .create(&identity.subject_id, &name, payload.description.trim())
        .await
        .db_err("Failed to create workspace")?;

    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn delete_workspace(
    State(state): State<ApiState>,
    Auth(identity): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    let deleted = state
        .db
        .workspaces()
        .delete(&identity.subject_id, &id)
        .await
        .db_err("Failed to delete workspace")?;

    if !deleted {
        return Err(ApiError::not_found("Workspace not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn list_scripts(
    State(state): State<ApiState>,
    Auth(identity): Auth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_uuid(&id)?;

    // Distinguish "not yours / missing" from "empty"
    state
        .db
        .workspaces()
        .get(&identity.subject_id, &id)
        .await
        .db_err("Failed to fetch workspace")?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    let scripts = state
        .db
        .scripts()
        .list_by_workspace(&identity.subject_id, &id)
        .await
        .db_err("Failed to fetch scripts")?;

    Ok(Json(scripts))
}
