// ABOUTME: HTTP reverse proxy surface forwarding requests into workspace ports
// ABOUTME: Transparent pass-through; only errors are translated at this boundary

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use warren_workspaces::{ProxyRequest, WorkspaceBackend, WorkspaceError, WorkspaceStatus};

use crate::error::status_for;

/// Shared state for the proxy surface.
#[derive(Clone)]
pub struct ProxyContext {
    pub backend: Arc<dyn WorkspaceBackend>,
    /// Container port the `/app` convenience routes forward to.
    pub default_app_port: u16,
}

/// Routes for the preview/proxy surface.
pub fn preview_router(ctx: ProxyContext) -> Router {
    Router::new()
        .route("/preview/{workspace_id}", get(preview_status))
        .route("/preview/{workspace_id}/ports", get(list_ports))
        .route("/preview/{workspace_id}/proxy/{port}", any(proxy_port_root))
        .route(
            "/preview/{workspace_id}/proxy/{port}/{*path}",
            any(proxy_port_path),
        )
        .route("/preview/{workspace_id}/app", any(app_root))
        .route("/preview/{workspace_id}/app/{*path}", any(app_path))
        .with_state(ctx)
}

/// Workspace status, active ports, and base proxy URL for dashboard use.
#[derive(Debug, Serialize)]
pub struct PreviewStatusResponse {
    pub workspace_id: String,
    pub status: WorkspaceStatus,
    pub active_ports: Vec<u16>,
    pub base_url: String,
}

#[derive(Debug, Serialize)]
pub struct PortsResponse {
    pub ports: Vec<u16>,
}

fn error_response(error: &WorkspaceError) -> Response {
    let status = status_for(error);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

async fn preview_status(
    State(ctx): State<ProxyContext>,
    Path(workspace_id): Path<String>,
) -> Response {
    let workspace = match ctx.backend.get_workspace(&workspace_id).await {
        Ok(workspace) => workspace,
        Err(e) => return error_response(&e),
    };
    let active_ports = if workspace.status == WorkspaceStatus::Running {
        ctx.backend
            .active_ports(&workspace_id)
            .await
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    let base_url = match ctx.backend.preview_url(&workspace_id).await {
        Ok(url) => url,
        Err(e) => return error_response(&e),
    };
    Json(PreviewStatusResponse {
        workspace_id,
        status: workspace.status,
        active_ports,
        base_url,
    })
    .into_response()
}

async fn list_ports(
    State(ctx): State<ProxyContext>,
    Path(workspace_id): Path<String>,
) -> Response {
    match ctx.backend.active_ports(&workspace_id).await {
        Ok(ports) => Json(PortsResponse { ports }).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn proxy_port_root(
    State(ctx): State<ProxyContext>,
    Path((workspace_id, port)): Path<(String, u16)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(ctx, workspace_id, port, String::new(), method, headers, query, body).await
}

async fn proxy_port_path(
    State(ctx): State<ProxyContext>,
    Path((workspace_id, port, path)): Path<(String, u16, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    forward(ctx, workspace_id, port, path, method, headers, query, body).await
}

async fn app_root(
    State(ctx): State<ProxyContext>,
    Path(workspace_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let port = ctx.default_app_port;
    forward(ctx, workspace_id, port, String::new(), method, headers, query, body).await
}

async fn app_path(
    State(ctx): State<ProxyContext>,
    Path((workspace_id, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let port = ctx.default_app_port;
    forward(ctx, workspace_id, port, path, method, headers, query, body).await
}

#[allow(clippy::too_many_arguments)]
async fn forward(
    ctx: ProxyContext,
    workspace_id: String,
    port: u16,
    path: String,
    method: Method,
    headers: HeaderMap,
    query: Option<String>,
    body: Bytes,
) -> Response {
    debug!(workspace = %workspace_id, port, path = %path, method = %method, "Proxying request");

    let request = ProxyRequest {
        workspace_id,
        port,
        method: method.to_string(),
        path: format!("/{}", path.trim_start_matches('/')),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect(),
        body: (!body.is_empty()).then(|| body.to_vec()),
        query,
    };

    match ctx.backend.proxy_request(request).await {
        Ok(upstream) => upstream_response(upstream),
        Err(e) => error_response(&e),
    }
}

/// Rebuild the upstream answer verbatim. Framing headers are dropped because
/// the body has already been collected into one buffer.
fn upstream_response(upstream: warren_workspaces::ProxyResponse) -> Response {
    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in &upstream.headers {
        if name.eq_ignore_ascii_case("content-length")
            || name.eq_ignore_ascii_case("transfer-encoding")
            || name.eq_ignore_ascii_case("connection")
        {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(upstream.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
