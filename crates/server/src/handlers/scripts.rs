//! Script management endpoints.

use crate::auth::Principal;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use runlet_core::{OwnerId, ScriptId};
use runlet_metadata::ScriptRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::format_description::well_known::Rfc3339;

/// Request to create a script.
#[derive(Debug, Deserialize)]
pub struct CreateScriptRequest {
    pub name: String,
    /// Base64-encoded script source.
    pub content: String,
    #[serde(default)]
    pub env: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CreateScriptResponse {
    pub id: ScriptId,
}

/// Request to edit a script. A different `name` renames it as well.
#[derive(Debug, Deserialize)]
pub struct UpdateScriptRequest {
    pub name: String,
    /// Base64-encoded script source.
    pub content: String,
    /// Replacement env; omitted keeps the stored env.
    #[serde(default)]
    pub env: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RenameScriptRequest {
    pub new_name: String,
}

/// Script record as returned by the API.
#[derive(Debug, Serialize)]
pub struct ScriptResponse {
    pub id: ScriptId,
    pub owner_id: OwnerId,
    pub scope: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<ScriptRow> for ScriptResponse {
    fn from(row: ScriptRow) -> Self {
        Self {
            id: row.script_id,
            owner_id: row.owner_id,
            scope: row.scope,
            name: row.name,
            created_at: row.created_at.format(&Rfc3339).unwrap_or_default(),
            updated_at: row.updated_at.format(&Rfc3339).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScriptContentResponse {
    /// Base64-encoded script source.
    pub content: String,
}

fn decode_content(content: &str) -> ApiResult<Vec<u8>> {
    BASE64
        .decode(content.trim())
        .map_err(|e| ApiError::BadRequest(format!("content must be base64: {e}")))
}

/// GET /v1/scripts
pub async fn list_scripts(
    State(state): State<AppState>,
    principal: Principal,
) -> ApiResult<Json<Vec<ScriptResponse>>> {
    let rows = state.coordinator.list(principal.owner_id).await?;
    Ok(Json(rows.into_iter().map(ScriptResponse::from).collect()))
}

/// POST /v1/scripts
pub async fn create_script(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateScriptRequest>,
) -> ApiResult<(StatusCode, Json<CreateScriptResponse>)> {
    let content = decode_content(&body.content)?;
    let id = state
        .coordinator
        .add(
            principal.owner_id,
            principal.scope.as_str(),
            &body.name,
            &content,
            body.env.as_ref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(CreateScriptResponse { id })))
}

/// GET /v1/scripts/{id}
pub async fn get_script(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<ScriptId>,
) -> ApiResult<Json<ScriptResponse>> {
    let row = state.coordinator.get(principal.owner_id, id).await?;
    Ok(Json(row.into()))
}

/// GET /v1/scripts/{id}/content
pub async fn get_script_content(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<ScriptId>,
) -> ApiResult<Json<ScriptContentResponse>> {
    let content = state.coordinator.get_content(principal.owner_id, id).await?;
    Ok(Json(ScriptContentResponse {
        content: BASE64.encode(&content),
    }))
}

/// PUT /v1/scripts/{id}
pub async fn update_script(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<ScriptId>,
    Json(body): Json<UpdateScriptRequest>,
) -> ApiResult<StatusCode> {
    let content = decode_content(&body.content)?;
    state
        .coordinator
        .edit(principal.owner_id, id, &body.name, &content, body.env.as_ref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/scripts/{id}/rename
pub async fn rename_script(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<ScriptId>,
    Json(body): Json<RenameScriptRequest>,
) -> ApiResult<StatusCode> {
    state
        .coordinator
        .rename(principal.owner_id, id, &body.new_name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /v1/scripts/{id}
pub async fn delete_script(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<ScriptId>,
) -> ApiResult<StatusCode> {
    state.coordinator.delete(principal.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
