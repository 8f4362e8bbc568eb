// ABOUTME: Router tests for the HTTP proxy surface and its error translations
// ABOUTME: Drives real axum routing against a scripted workspace backend

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use warren_engine::{ExecOutput, FileEntry};
use warren_fleet::ContainerStats;
use warren_proxy::{router, ProxyContext};
use warren_workspaces::{
    CreateWorkspaceRequest, ProxyRequest, ProxyResponse, Tier, Workspace, WorkspaceBackend,
    WorkspaceError, WorkspaceStatus,
};

/// Scripted backend: returns the configured proxy result and records the
/// request it was handed.
struct ScriptedBackend {
    workspace_status: WorkspaceStatus,
    proxy_result: Mutex<Option<Result<ProxyResponse, WorkspaceError>>>,
    seen_request: Mutex<Option<ProxyRequest>>,
}

impl ScriptedBackend {
    fn new(
        workspace_status: WorkspaceStatus,
        proxy_result: Result<ProxyResponse, WorkspaceError>,
    ) -> Arc<Self> {
        Arc::new(Self {
            workspace_status,
            proxy_result: Mutex::new(Some(proxy_result)),
            seen_request: Mutex::new(None),
        })
    }

    fn workspace(&self, workspace_id: &str) -> Workspace {
        let now = Utc::now();
        Workspace {
            id: workspace_id.to_string(),
            user_id: "user-1".to_string(),
            session_id: "session-1".to_string(),
            host_id: "host-a".to_string(),
            tier: Tier::Standard,
            status: self.workspace_status,
            container_id: Some("ctr-1".to_string()),
            container_name: "warren-ws-1".to_string(),
            proxy_host: Some("127.0.0.1".to_string()),
            created_at: now,
            last_activity: now,
            last_usage_report_at: now,
            error_message: None,
        }
    }
}

#[async_trait]
impl WorkspaceBackend for ScriptedBackend {
    async fn create_workspace(
        &self,
        _request: CreateWorkspaceRequest,
    ) -> warren_workspaces::Result<Workspace> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn get_workspace(&self, workspace_id: &str) -> warren_workspaces::Result<Workspace> {
        if workspace_id == "missing" {
            return Err(WorkspaceError::NotFound(workspace_id.to_string()));
        }
        Ok(self.workspace(workspace_id))
    }

    async fn list_workspaces(
        &self,
        _user_id: Option<&str>,
    ) -> warren_workspaces::Result<Vec<Workspace>> {
        Ok(Vec::new())
    }

    async fn stop_workspace(&self, _workspace_id: &str) -> warren_workspaces::Result<()> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn delete_workspace(
        &self,
        _workspace_id: &str,
        _preserve_files: bool,
    ) -> warren_workspaces::Result<()> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn exec(
        &self,
        _workspace_id: &str,
        _command: Vec<String>,
        _env_vars: Option<HashMap<String, String>>,
    ) -> warren_workspaces::Result<ExecOutput> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn read_file(
        &self,
        _workspace_id: &str,
        _path: &str,
    ) -> warren_workspaces::Result<Vec<u8>> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn write_file(
        &self,
        _workspace_id: &str,
        _path: &str,
        _contents: &[u8],
    ) -> warren_workspaces::Result<()> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn list_files(
        &self,
        _workspace_id: &str,
        _path: &str,
    ) -> warren_workspaces::Result<Vec<FileEntry>> {
        Err(WorkspaceError::Internal("not scripted".to_string()))
    }

    async fn heartbeat(&self, _workspace_id: &str) -> warren_workspaces::Result<()> {
        Ok(())
    }

    async fn cleanup_idle_workspaces(&self) -> warren_workspaces::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn track_usage(&self) -> warren_workspaces::Result<()> {
        Ok(())
    }

    async fn active_ports(&self, _workspace_id: &str) -> warren_workspaces::Result<Vec<u16>> {
        Ok(vec![3000, 8080])
    }

    async fn preview_url(&self, workspace_id: &str) -> warren_workspaces::Result<String> {
        Ok(format!("http://localhost:4820/preview/{}", workspace_id))
    }

    async fn proxy_request(
        &self,
        request: ProxyRequest,
    ) -> warren_workspaces::Result<ProxyResponse> {
        *self.seen_request.lock().unwrap() = Some(request);
        self.proxy_result
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(WorkspaceError::Internal("exhausted".to_string())))
    }

    async fn workspace_stats(
        &self,
        _workspace_id: &str,
    ) -> warren_workspaces::Result<ContainerStats> {
        Ok(ContainerStats::default())
    }
}

fn app(backend: Arc<ScriptedBackend>) -> axum::Router {
    router(ProxyContext {
        backend,
        default_app_port: 3000,
    })
}

#[tokio::test]
async fn proxy_passes_upstream_response_through() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Ok(ProxyResponse {
            status: 201,
            headers: vec![
                ("x-upstream".to_string(), "yes".to_string()),
                ("content-length".to_string(), "999".to_string()),
            ],
            body: b"created".to_vec(),
        }),
    );
    let app = app(backend.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/preview/ws-1/proxy/8080/api/items?limit=5")
                .body(Body::from("payload"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers().get("x-upstream").unwrap(), "yes");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"created");

    let seen = backend.seen_request.lock().unwrap().clone().unwrap();
    assert_eq!(seen.workspace_id, "ws-1");
    assert_eq!(seen.port, 8080);
    assert_eq!(seen.method, "POST");
    assert_eq!(seen.path, "/api/items");
    assert_eq!(seen.query.as_deref(), Some("limit=5"));
    assert_eq!(seen.body.as_deref(), Some(&b"payload"[..]));
}

#[tokio::test]
async fn app_route_uses_the_default_port() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Ok(ProxyResponse {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }),
    );
    let app = app(backend.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/preview/ws-1/app/index.html")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.seen_request.lock().unwrap().clone().unwrap();
    assert_eq!(seen.port, 3000);
    assert_eq!(seen.path, "/index.html");
}

#[tokio::test]
async fn stopped_workspace_yields_503() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Stopped,
        Err(WorkspaceError::NotRunning("ws-1".to_string())),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/preview/ws-1/proxy/3000/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_workspace_yields_404() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Err(WorkspaceError::NotFound("missing".to_string())),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/preview/missing/proxy/3000/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn connection_refused_yields_502_and_timeout_504() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Err(WorkspaceError::UpstreamConnection("refused".to_string())),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/preview/ws-1/proxy/3000/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Err(WorkspaceError::UpstreamTimeout("slow".to_string())),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/preview/ws-1/proxy/3000/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn preview_status_reports_ports_and_base_url() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Ok(ProxyResponse {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/preview/ws-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["workspace_id"], "ws-1");
    assert_eq!(json["status"], "running");
    assert_eq!(json["active_ports"], serde_json::json!([3000, 8080]));
    assert_eq!(json["base_url"], "http://localhost:4820/preview/ws-1");
}

#[tokio::test]
async fn websocket_route_rejects_missing_workspace_pre_upgrade() {
    let backend = ScriptedBackend::new(
        WorkspaceStatus::Running,
        Ok(ProxyResponse {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
        }),
    );
    let response = app(backend)
        .oneshot(
            Request::builder()
                .uri("/ws/missing/3000")
                .header("upgrade", "websocket")
                .header("connection", "upgrade")
                .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
                .header("sec-websocket-version", "13")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
