// ABOUTME: Workspace management handlers, scoped to the authenticated owner
// ABOUTME: Thin translation between HTTP and the workspace backend contract

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use warren_fleet::ContainerStats;
use warren_proxy::status_for;
use warren_workspaces::{
    CreateWorkspaceRequest, Tier, Workspace, WorkspaceBackend, WorkspaceError,
};

use crate::response::ApiResponse;

/// Header carrying the authenticated owner id, set by the platform gateway.
pub const USER_HEADER: &str = "x-warren-user-id";

pub type ApiState = Arc<dyn WorkspaceBackend>;

fn owner(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error("missing user identity")),
            )
                .into_response()
        })
}

fn error_response(error: &WorkspaceError) -> Response {
    (status_for(error), Json(ApiResponse::<()>::error(error))).into_response()
}

/// Resolve a workspace and require the caller to own it. Foreign workspaces
/// read as absent rather than forbidden.
async fn owned_workspace(
    backend: &ApiState,
    workspace_id: &str,
    user_id: &str,
) -> Result<Workspace, Response> {
    match backend.get_workspace(workspace_id).await {
        Ok(workspace) if workspace.user_id == user_id => Ok(workspace),
        Ok(_) => Err(error_response(&WorkspaceError::NotFound(
            workspace_id.to_string(),
        ))),
        Err(e) => Err(error_response(&e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateWorkspaceBody {
    pub session_id: String,
    pub tier: Tier,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub cpu_architecture: Option<String>,
    #[serde(default)]
    pub requires_gpu: bool,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
}

pub async fn create_workspace(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<CreateWorkspaceBody>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    info!(user = %user_id, tier = body.tier.as_str(), "Create workspace requested");

    let request = CreateWorkspaceRequest {
        user_id,
        session_id: body.session_id,
        tier: body.tier,
        region: body.region,
        cpu_architecture: body.cpu_architecture,
        requires_gpu: body.requires_gpu,
        env_vars: body.env_vars,
    };
    match backend.create_workspace(request).await {
        Ok(workspace) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(workspace)),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_workspaces(State(backend): State<ApiState>, headers: HeaderMap) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match backend.list_workspaces(Some(&user_id)).await {
        Ok(workspaces) => Json(ApiResponse::success(workspaces)).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn get_workspace(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    match owned_workspace(&backend, &workspace_id, &user_id).await {
        Ok(workspace) => Json(ApiResponse::success(workspace)).into_response(),
        Err(response) => response,
    }
}

pub async fn stop_workspace(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.stop_workspace(&workspace_id).await {
        Ok(()) => Json(ApiResponse::success(())).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub preserve_files: bool,
}

pub async fn delete_workspace(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend
        .delete_workspace(&workspace_id, query.preserve_files)
        .await
    {
        Ok(()) => Json(ApiResponse::success(())).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecBody {
    pub command: Vec<String>,
    #[serde(default)]
    pub env_vars: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
pub struct ExecResponse {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

pub async fn exec_command(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Json(body): Json<ExecBody>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.exec(&workspace_id, body.command, body.env_vars).await {
        Ok(output) => Json(ApiResponse::success(ExecResponse {
            exit_code: output.exit_code,
            stdout: output.stdout_utf8(),
            stderr: output.stderr_utf8(),
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn heartbeat(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.heartbeat(&workspace_id).await {
        Ok(()) => Json(ApiResponse::success(())).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn workspace_stats(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.workspace_stats(&workspace_id).await {
        Ok(stats) => Json(ApiResponse::<ContainerStats>::success(stats)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: String,
}

pub async fn read_file(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.read_file(&workspace_id, &query.path).await {
        Ok(contents) => (
            StatusCode::OK,
            [("content-type", "application/octet-stream")],
            contents,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn write_file(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(query): Query<FileQuery>,
    body: Bytes,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.write_file(&workspace_id, &query.path, &body).await {
        Ok(()) => Json(ApiResponse::success(())).into_response(),
        Err(e) => error_response(&e),
    }
}

pub async fn list_files(
    State(backend): State<ApiState>,
    headers: HeaderMap,
    Path(workspace_id): Path<String>,
    Query(query): Query<FileQuery>,
) -> Response {
    let user_id = match owner(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    if let Err(response) = owned_workspace(&backend, &workspace_id, &user_id).await {
        return response;
    }
    match backend.list_files(&workspace_id, &query.path).await {
        Ok(entries) => Json(ApiResponse::success(entries)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Health check endpoint for the compute service.
pub async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("Warren compute is healthy".to_string()))
}
