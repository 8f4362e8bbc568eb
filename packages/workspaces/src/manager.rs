// ABOUTME: The compute manager contract implemented by workspace backends
// ABOUTME: Callers depend on this capability set, never on a concrete backend

use async_trait::async_trait;
use std::collections::HashMap;

use warren_engine::{ExecOutput, FileEntry};
use warren_fleet::ContainerStats;

use crate::error::Result;
use crate::types::{CreateWorkspaceRequest, ProxyRequest, ProxyResponse, Workspace};

/// Capability set every workspace backend provides (fleet-backed,
/// single-host, or cloud-managed). All operations are async and report
/// failure through [`crate::WorkspaceError`], never via silent defaults.
#[async_trait]
pub trait WorkspaceBackend: Send + Sync {
    /// Place and provision a new workspace. On success the record is
    /// `running`; on failure a typed error is returned and no capacity
    /// stays reserved.
    async fn create_workspace(&self, request: CreateWorkspaceRequest) -> Result<Workspace>;

    async fn get_workspace(&self, workspace_id: &str) -> Result<Workspace>;

    /// List workspaces, optionally scoped to one owner.
    async fn list_workspaces(&self, user_id: Option<&str>) -> Result<Vec<Workspace>>;

    /// Gracefully stop a running workspace. Stopping a stopped workspace
    /// succeeds.
    async fn stop_workspace(&self, workspace_id: &str) -> Result<()>;

    /// Stop if needed, remove the container, and drop the record.
    /// `preserve_files` flushes the workspace files before removal.
    async fn delete_workspace(&self, workspace_id: &str, preserve_files: bool) -> Result<()>;

    /// Run a command inside a running workspace.
    async fn exec(
        &self,
        workspace_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<ExecOutput>;

    async fn read_file(&self, workspace_id: &str, path: &str) -> Result<Vec<u8>>;

    async fn write_file(&self, workspace_id: &str, path: &str, contents: &[u8]) -> Result<()>;

    async fn list_files(&self, workspace_id: &str, path: &str) -> Result<Vec<FileEntry>>;

    /// Record caller activity; bumps the idle-eviction clock and nothing else.
    async fn heartbeat(&self, workspace_id: &str) -> Result<()>;

    /// Evict running workspaces idle beyond the configured timeout.
    /// Returns the evicted ids so the caller can notify collaborators.
    async fn cleanup_idle_workspaces(&self) -> Result<Vec<String>>;

    /// Emit one billing record per running workspace covering the elapsed
    /// interval since its last successful report.
    async fn track_usage(&self) -> Result<()>;

    /// Ports currently listening inside the workspace container.
    async fn active_ports(&self, workspace_id: &str) -> Result<Vec<u16>>;

    /// Public base URL callers use to reach the workspace's proxy routes.
    async fn preview_url(&self, workspace_id: &str) -> Result<String>;

    /// Forward one HTTP request to a port inside the workspace and return
    /// the upstream response verbatim.
    async fn proxy_request(&self, request: ProxyRequest) -> Result<ProxyResponse>;

    /// Live normalized container metrics for the workspace.
    async fn workspace_stats(&self, workspace_id: &str) -> Result<ContainerStats>;

    /// Re-adopt containers that match this service's naming convention,
    /// typically once at process start. Returns how many records were
    /// rebuilt. Default is a no-op for backends without discovery.
    async fn discover_existing_workspaces(&self) -> Result<usize> {
        Ok(0)
    }
}
