// ABOUTME: Fleet-backed workspace lifecycle manager
// ABOUTME: Owns the per-workspace state machine, placement, eviction, billing, and recovery

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use warren_engine::{
    ContainerEngine, ContainerSpec, EngineFactory, ExecOutput, FileEntry,
};
use warren_fleet::{normalize, ContainerStats, Fleet, Host, PlacementConstraints, PlacementRequest, Scheduler};

use crate::billing::UsageReporter;
use crate::error::{Result, WorkspaceError};
use crate::manager::WorkspaceBackend;
use crate::ports::parse_listening_ports;
use crate::types::{
    CreateWorkspaceRequest, ProxyRequest, ProxyResponse, Workspace, WorkspaceStatus,
};

/// Label marking containers this service owns.
pub const MANAGED_LABEL: &str = "warren.managed";
pub const LABEL_WORKSPACE_ID: &str = "warren.workspace_id";
pub const LABEL_USER_ID: &str = "warren.user_id";
pub const LABEL_SESSION_ID: &str = "warren.session_id";
pub const LABEL_TIER: &str = "warren.tier";

const CONTAINER_NAME_PREFIX: &str = "warren-ws";
const WORKSPACE_DIR: &str = "/workspace";

/// Tunables for the fleet-backed manager.
#[derive(Debug, Clone)]
pub struct WorkspacesConfig {
    /// Inactivity window after which a running workspace is evicted.
    pub idle_timeout: Duration,
    /// Deadline for exec calls inside workspaces.
    pub exec_timeout: Duration,
    /// Deadline for proxied upstream requests.
    pub proxy_timeout: Duration,
    /// Grace period granted to containers on stop.
    pub container_stop_timeout_secs: u64,
    /// Base URL advertised in preview URLs.
    pub public_base_url: String,
    /// Directory workspace file archives are flushed to on preserving deletes.
    pub preserve_dir: PathBuf,
}

impl Default for WorkspacesConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(1800),
            exec_timeout: Duration::from_secs(120),
            proxy_timeout: Duration::from_secs(30),
            container_stop_timeout_secs: 10,
            public_base_url: "http://localhost:4820".to_string(),
            preserve_dir: std::env::temp_dir().join("warren-preserved"),
        }
    }
}

/// Workspace lifecycle manager over a fleet of container hosts.
///
/// State transitions for one workspace are serialized by a per-workspace
/// mutex; capacity counters are only touched through the fleet registry, and
/// a reservation is released exactly once when a capacity-holding status
/// (`creating`/`running`/`stopping`) is left.
pub struct FleetWorkspaceManager {
    fleet: Fleet,
    scheduler: Scheduler,
    engines: Arc<dyn EngineFactory>,
    reporter: Arc<dyn UsageReporter>,
    config: WorkspacesConfig,
    http: reqwest::Client,
    workspaces: RwLock<HashMap<String, Workspace>>,
    guards: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FleetWorkspaceManager {
    pub fn new(
        fleet: Fleet,
        engines: Arc<dyn EngineFactory>,
        reporter: Arc<dyn UsageReporter>,
        config: WorkspacesConfig,
    ) -> Self {
        let scheduler = Scheduler::new(fleet.clone());
        Self {
            fleet,
            scheduler,
            engines,
            reporter,
            config,
            http: reqwest::Client::new(),
            workspaces: RwLock::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn reporter(&self) -> Arc<dyn UsageReporter> {
        self.reporter.clone()
    }

    /// Per-workspace transition mutex. Concurrent create/stop/delete on the
    /// same id must not interleave.
    async fn guard(&self, workspace_id: &str) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().await;
        guards
            .entry(workspace_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn drop_guard(&self, workspace_id: &str) {
        let mut guards = self.guards.lock().await;
        guards.remove(workspace_id);
    }

    /// Move a workspace to `new_status`, releasing its host reservation when
    /// a capacity-holding status is left.
    async fn set_status(
        &self,
        workspace_id: &str,
        new_status: WorkspaceStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let release = {
            let mut map = self.workspaces.write().await;
            let workspace = map
                .get_mut(workspace_id)
                .ok_or_else(|| WorkspaceError::NotFound(workspace_id.to_string()))?;
            let leaving_capacity =
                workspace.status.holds_capacity() && !new_status.holds_capacity();
            debug!(
                workspace = %workspace_id,
                from = workspace.status.as_str(),
                to = new_status.as_str(),
                "Workspace transition"
            );
            workspace.status = new_status;
            if error_message.is_some() {
                workspace.error_message = error_message;
            }
            leaving_capacity.then(|| (workspace.host_id.clone(), workspace.tier.footprint()))
        };

        if let Some((host_id, footprint)) = release {
            self.fleet.release(&host_id, footprint).await;
        }
        Ok(())
    }

    async fn engine_for_workspace(&self, workspace: &Workspace) -> Result<(Arc<dyn ContainerEngine>, String)> {
        let host = self.fleet.get_host(&workspace.host_id).await?;
        let engine = self.engines.engine_for(&host).await?;
        let container_id = workspace
            .container_id
            .clone()
            .ok_or_else(|| WorkspaceError::Internal(format!(
                "workspace {} has no container",
                workspace.id
            )))?;
        Ok((engine, container_id))
    }

    async fn require_running(&self, workspace_id: &str) -> Result<Workspace> {
        let workspace = self.get_workspace(workspace_id).await?;
        if workspace.status != WorkspaceStatus::Running {
            return Err(WorkspaceError::NotRunning(workspace_id.to_string()));
        }
        Ok(workspace)
    }

    async fn touch_activity(&self, workspace_id: &str) {
        let mut map = self.workspaces.write().await;
        if let Some(workspace) = map.get_mut(workspace_id) {
            workspace.last_activity = Utc::now();
        }
    }

    fn container_spec(&self, workspace: &Workspace, request: &CreateWorkspaceRequest) -> ContainerSpec {
        let resources = workspace.tier.resources();
        let labels = HashMap::from([
            (MANAGED_LABEL.to_string(), "true".to_string()),
            (LABEL_WORKSPACE_ID.to_string(), workspace.id.clone()),
            (LABEL_USER_ID.to_string(), workspace.user_id.clone()),
            (LABEL_SESSION_ID.to_string(), workspace.session_id.clone()),
            (LABEL_TIER.to_string(), workspace.tier.as_str().to_string()),
        ]);
        ContainerSpec {
            name: workspace.container_name.clone(),
            image: workspace.tier.image().to_string(),
            env_vars: request.env_vars.clone(),
            labels,
            cpu_cores: resources.cpu_cores,
            memory_mb: resources.memory_mb,
            disk_gb: resources.disk_gb,
            command: None,
            working_dir: Some(WORKSPACE_DIR.to_string()),
        }
    }

    /// Ping every host's engine and fold the results into host health.
    /// One unreachable host never aborts the sweep.
    pub async fn ingest_host_heartbeats(&self) {
        for host in self.fleet.list_hosts().await {
            let outcome = match self.engines.engine_for(&host).await {
                Ok(engine) => engine.ping().await,
                Err(e) => Err(e),
            };
            let result = match outcome {
                Ok(()) => self.fleet.record_heartbeat(&host.id).await,
                Err(e) => {
                    self.fleet
                        .record_heartbeat_failure(&host.id, &e.to_string())
                        .await
                }
            };
            if let Err(e) = result {
                warn!(host = %host.id, error = %e, "Heartbeat ingest failed");
            }
        }
    }

    async fn adopt_container(
        &self,
        host: &Host,
        summary: &warren_engine::ContainerSummary,
    ) -> Option<String> {
        let workspace_id = summary.labels.get(LABEL_WORKSPACE_ID)?.clone();
        {
            let map = self.workspaces.read().await;
            if map.contains_key(&workspace_id) {
                return None;
            }
        }
        let tier = match summary
            .labels
            .get(LABEL_TIER)
            .and_then(|t| t.parse::<crate::tier::Tier>().ok())
        {
            Some(tier) => tier,
            None => {
                warn!(
                    container = %summary.name,
                    "Managed container has no parseable tier label, skipping adoption"
                );
                return None;
            }
        };

        let running = summary.is_running();
        if running {
            if let Err(e) = self.fleet.reserve(&host.id, tier.footprint()).await {
                warn!(host = %host.id, error = %e, "Could not re-reserve capacity for adopted workspace");
            }
        }

        let now = Utc::now();
        let workspace = Workspace {
            id: workspace_id.clone(),
            user_id: summary
                .labels
                .get(LABEL_USER_ID)
                .cloned()
                .unwrap_or_default(),
            session_id: summary
                .labels
                .get(LABEL_SESSION_ID)
                .cloned()
                .unwrap_or_default(),
            host_id: host.id.clone(),
            tier,
            status: if running {
                WorkspaceStatus::Running
            } else {
                WorkspaceStatus::Stopped
            },
            container_id: Some(summary.id.clone()),
            container_name: summary.name.clone(),
            proxy_host: summary.ip_address.clone(),
            created_at: summary.created_at.unwrap_or(now),
            // Fresh activity so a recovered workspace is not evicted
            // before its owner gets a chance to reconnect.
            last_activity: now,
            last_usage_report_at: now,
            error_message: None,
        };

        self.workspaces
            .write()
            .await
            .insert(workspace_id.clone(), workspace);
        Some(workspace_id)
    }
}

#[async_trait]
impl WorkspaceBackend for FleetWorkspaceManager {
    async fn create_workspace(&self, request: CreateWorkspaceRequest) -> Result<Workspace> {
        if request.user_id.is_empty() || request.session_id.is_empty() {
            return Err(WorkspaceError::InvalidRequest(
                "user_id and session_id are required".to_string(),
            ));
        }

        let workspace_id = Uuid::new_v4().to_string();
        let placement = PlacementRequest {
            footprint: request.tier.footprint(),
            constraints: PlacementConstraints {
                region: request.region.clone(),
                cpu_architecture: request.cpu_architecture.clone(),
                requires_gpu: request.requires_gpu,
            },
        };

        // Capacity is reserved here; every failure path below must leave a
        // non-holding status behind so the reservation is returned.
        let host = self.scheduler.place(&placement).await?;

        let now = Utc::now();
        let workspace = Workspace {
            id: workspace_id.clone(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            host_id: host.id.clone(),
            tier: request.tier,
            status: WorkspaceStatus::Creating,
            container_id: None,
            container_name: format!("{}-{}", CONTAINER_NAME_PREFIX, workspace_id),
            proxy_host: None,
            created_at: now,
            last_activity: now,
            last_usage_report_at: now,
            error_message: None,
        };
        let spec = self.container_spec(&workspace, &request);

        // Take the transition guard before the record becomes visible so a
        // racing stop/delete cannot interleave with provisioning.
        let guard = self.guard(&workspace_id).await;
        let _transition = guard.lock().await;
        self.workspaces
            .write()
            .await
            .insert(workspace_id.clone(), workspace);

        let created: Result<_> = async {
            let engine = self.engines.engine_for(&host).await?;
            Ok(engine.create_container(&spec).await?)
        }
        .await;

        match created {
            Ok(container) => {
                let workspace = {
                    let mut map = self.workspaces.write().await;
                    let workspace = map
                        .get_mut(&workspace_id)
                        .ok_or_else(|| WorkspaceError::NotFound(workspace_id.clone()))?;
                    workspace.container_id = Some(container.id.clone());
                    workspace.proxy_host = Some(container.ip_address);
                    workspace.status = WorkspaceStatus::Running;
                    workspace.clone()
                };
                info!(
                    workspace = %workspace_id,
                    host = %host.id,
                    container = %container.id,
                    tier = workspace.tier.as_str(),
                    "Workspace running"
                );
                if let Err(e) = self
                    .reporter
                    .sync_status(&workspace_id, WorkspaceStatus::Running, Some(&container.id))
                    .await
                {
                    warn!(workspace = %workspace_id, error = %e, "Status sync failed");
                }
                Ok(workspace)
            }
            Err(e) => {
                error!(workspace = %workspace_id, host = %host.id, error = %e, "Workspace create failed");
                self.set_status(&workspace_id, WorkspaceStatus::Error, Some(e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }

    async fn get_workspace(&self, workspace_id: &str) -> Result<Workspace> {
        let map = self.workspaces.read().await;
        map.get(workspace_id)
            .cloned()
            .ok_or_else(|| WorkspaceError::NotFound(workspace_id.to_string()))
    }

    async fn list_workspaces(&self, user_id: Option<&str>) -> Result<Vec<Workspace>> {
        let map = self.workspaces.read().await;
        let mut workspaces: Vec<Workspace> = map
            .values()
            .filter(|w| user_id.map_or(true, |user| w.user_id == user))
            .cloned()
            .collect();
        workspaces.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(workspaces)
    }

    async fn stop_workspace(&self, workspace_id: &str) -> Result<()> {
        let guard = self.guard(workspace_id).await;
        let _transition = guard.lock().await;

        let workspace = self.get_workspace(workspace_id).await?;
        match workspace.status {
            WorkspaceStatus::Stopped => return Ok(()),
            WorkspaceStatus::Running | WorkspaceStatus::Stopping => {}
            _ => return Err(WorkspaceError::NotRunning(workspace_id.to_string())),
        }

        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        self.set_status(workspace_id, WorkspaceStatus::Stopping, None)
            .await?;

        match engine
            .stop_container(&container_id, self.config.container_stop_timeout_secs)
            .await
        {
            Ok(()) => {
                self.set_status(workspace_id, WorkspaceStatus::Stopped, None)
                    .await?;
                info!(workspace = %workspace_id, "Workspace stopped");
                if let Err(e) = self
                    .reporter
                    .sync_status(workspace_id, WorkspaceStatus::Stopped, Some(&container_id))
                    .await
                {
                    warn!(workspace = %workspace_id, error = %e, "Status sync failed");
                }
                Ok(())
            }
            Err(e) => {
                error!(workspace = %workspace_id, error = %e, "Stop failed");
                self.set_status(workspace_id, WorkspaceStatus::Error, Some(e.to_string()))
                    .await?;
                Err(e.into())
            }
        }
    }

    async fn delete_workspace(&self, workspace_id: &str, preserve_files: bool) -> Result<()> {
        let guard = self.guard(workspace_id).await;
        let _transition = guard.lock().await;

        let workspace = self.get_workspace(workspace_id).await?;

        if let Some(container_id) = &workspace.container_id {
            match self.engine_for_workspace(&workspace).await {
                Ok((engine, _)) => {
                    if workspace.status == WorkspaceStatus::Running
                        || workspace.status == WorkspaceStatus::Stopping
                    {
                        if let Err(e) = engine
                            .stop_container(container_id, self.config.container_stop_timeout_secs)
                            .await
                        {
                            warn!(workspace = %workspace_id, error = %e, "Stop before delete failed");
                        }
                    }

                    if preserve_files {
                        match engine.export_path(container_id, WORKSPACE_DIR).await {
                            Ok(archive) => {
                                let target = self
                                    .config
                                    .preserve_dir
                                    .join(format!("{}.tar", workspace_id));
                                if let Err(e) = tokio::fs::create_dir_all(&self.config.preserve_dir)
                                    .await
                                {
                                    warn!(workspace = %workspace_id, error = %e, "Preserve dir unavailable");
                                } else if let Err(e) = tokio::fs::write(&target, archive).await {
                                    warn!(workspace = %workspace_id, error = %e, "File preservation failed");
                                } else {
                                    info!(workspace = %workspace_id, path = %target.display(), "Workspace files preserved");
                                }
                            }
                            Err(e) => {
                                warn!(workspace = %workspace_id, error = %e, "File export failed");
                            }
                        }
                    }

                    // Surfaced, not retried: re-running a partially-applied
                    // removal risks acting on a recreated container.
                    if let Err(e) = engine.remove_container(container_id, true).await {
                        error!(workspace = %workspace_id, error = %e, "Container removal failed");
                        self.set_status(workspace_id, WorkspaceStatus::Error, Some(e.to_string()))
                            .await?;
                        return Err(e.into());
                    }
                }
                Err(e) => {
                    warn!(workspace = %workspace_id, error = %e, "Host unreachable during delete, dropping record");
                }
            }
        }

        let released = {
            let mut map = self.workspaces.write().await;
            map.remove(workspace_id)
                .filter(|w| w.status.holds_capacity())
                .map(|w| (w.host_id, w.tier.footprint()))
        };
        if let Some((host_id, footprint)) = released {
            self.fleet.release(&host_id, footprint).await;
        }
        self.drop_guard(workspace_id).await;

        info!(workspace = %workspace_id, "Workspace deleted");
        if let Err(e) = self
            .reporter
            .sync_status(workspace_id, WorkspaceStatus::Stopped, None)
            .await
        {
            warn!(workspace = %workspace_id, error = %e, "Status sync failed");
        }
        Ok(())
    }

    async fn exec(
        &self,
        workspace_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<ExecOutput> {
        if command.is_empty() {
            return Err(WorkspaceError::InvalidRequest(
                "command must not be empty".to_string(),
            ));
        }
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        let output = engine
            .exec(&container_id, command, env_vars, self.config.exec_timeout)
            .await?;
        self.touch_activity(workspace_id).await;
        Ok(output)
    }

    async fn read_file(&self, workspace_id: &str, path: &str) -> Result<Vec<u8>> {
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        let contents = engine.read_file(&container_id, path).await?;
        self.touch_activity(workspace_id).await;
        Ok(contents)
    }

    async fn write_file(&self, workspace_id: &str, path: &str, contents: &[u8]) -> Result<()> {
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        engine.write_file(&container_id, path, contents).await?;
        self.touch_activity(workspace_id).await;
        Ok(())
    }

    async fn list_files(&self, workspace_id: &str, path: &str) -> Result<Vec<FileEntry>> {
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        let output = engine
            .exec(
                &container_id,
                vec!["ls".to_string(), "-1Ap".to_string(), path.to_string()],
                None,
                self.config.exec_timeout,
            )
            .await?;
        if output.exit_code != 0 {
            return Err(WorkspaceError::InvalidRequest(format!(
                "cannot list {}: {}",
                path,
                output.stderr_utf8().trim()
            )));
        }
        let entries = output
            .stdout_utf8()
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| FileEntry {
                name: line.trim_end_matches('/').to_string(),
                is_dir: line.ends_with('/'),
            })
            .collect();
        Ok(entries)
    }

    async fn heartbeat(&self, workspace_id: &str) -> Result<()> {
        let mut map = self.workspaces.write().await;
        let workspace = map
            .get_mut(workspace_id)
            .ok_or_else(|| WorkspaceError::NotFound(workspace_id.to_string()))?;
        workspace.last_activity = Utc::now();
        Ok(())
    }

    async fn cleanup_idle_workspaces(&self) -> Result<Vec<String>> {
        let now = Utc::now();
        let idle_timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::seconds(1800));

        let candidates: Vec<String> = {
            let map = self.workspaces.read().await;
            map.values()
                .filter(|w| {
                    w.status == WorkspaceStatus::Running && now - w.last_activity > idle_timeout
                })
                .map(|w| w.id.clone())
                .collect()
        };

        let mut evicted = Vec::new();
        for workspace_id in candidates {
            match self.stop_workspace(&workspace_id).await {
                Ok(()) => {
                    info!(workspace = %workspace_id, "Evicted idle workspace");
                    evicted.push(workspace_id);
                }
                Err(e) => {
                    // One failing workspace must not abort the sweep
                    warn!(workspace = %workspace_id, error = %e, "Idle eviction failed");
                }
            }
        }
        Ok(evicted)
    }

    async fn track_usage(&self) -> Result<()> {
        let now = Utc::now();
        let running: Vec<(String, crate::tier::Tier, chrono::DateTime<Utc>)> = {
            let map = self.workspaces.read().await;
            map.values()
                .filter(|w| w.status == WorkspaceStatus::Running)
                .map(|w| (w.id.clone(), w.tier, w.last_usage_report_at))
                .collect()
        };

        for (workspace_id, tier, last_report) in running {
            let elapsed = (now - last_report).num_seconds();
            if elapsed < 1 {
                continue;
            }
            match self
                .reporter
                .record_usage(&workspace_id, elapsed as u64, tier)
                .await
            {
                Ok(()) => {
                    let mut map = self.workspaces.write().await;
                    if let Some(workspace) = map.get_mut(&workspace_id) {
                        workspace.last_usage_report_at = now;
                    }
                }
                Err(e) => {
                    // Leave the watermark; the next tick re-covers this window
                    warn!(workspace = %workspace_id, error = %e, "Usage report failed, will retry");
                }
            }
        }
        Ok(())
    }

    async fn active_ports(&self, workspace_id: &str) -> Result<Vec<u16>> {
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        let output = engine
            .exec(
                &container_id,
                vec![
                    "sh".to_string(),
                    "-c".to_string(),
                    "cat /proc/net/tcp /proc/net/tcp6 2>/dev/null".to_string(),
                ],
                None,
                self.config.exec_timeout,
            )
            .await?;
        Ok(parse_listening_ports(&output.stdout_utf8()))
    }

    async fn preview_url(&self, workspace_id: &str) -> Result<String> {
        let workspace = self.get_workspace(workspace_id).await?;
        Ok(format!(
            "{}/preview/{}",
            self.config.public_base_url.trim_end_matches('/'),
            workspace.id
        ))
    }

    async fn proxy_request(&self, request: ProxyRequest) -> Result<ProxyResponse> {
        let workspace = self.get_workspace(&request.workspace_id).await?;
        if workspace.status != WorkspaceStatus::Running {
            return Err(WorkspaceError::NotRunning(request.workspace_id.clone()));
        }
        let upstream_host = workspace.proxy_host.ok_or_else(|| {
            WorkspaceError::Internal(format!(
                "workspace {} has no proxy address",
                request.workspace_id
            ))
        })?;

        let mut path = request.path.clone();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        let mut url = format!("http://{}:{}{}", upstream_host, request.port, path);
        if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| WorkspaceError::InvalidRequest(format!("bad method {}", request.method)))?;

        let mut builder = self
            .http
            .request(method, &url)
            .timeout(self.config.proxy_timeout);
        for (name, value) in &request.headers {
            // The upstream owns its own host/framing headers
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                WorkspaceError::UpstreamTimeout(url.clone())
            } else if e.is_connect() {
                WorkspaceError::UpstreamConnection(url.clone())
            } else {
                WorkspaceError::Internal(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkspaceError::UpstreamConnection(e.to_string()))?
            .to_vec();

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    async fn workspace_stats(&self, workspace_id: &str) -> Result<ContainerStats> {
        let workspace = self.require_running(workspace_id).await?;
        let (engine, container_id) = self.engine_for_workspace(&workspace).await?;
        let raw = engine.stats(&container_id).await?;
        Ok(normalize(&raw))
    }

    async fn discover_existing_workspaces(&self) -> Result<usize> {
        let mut discovered = 0;
        for host in self.fleet.list_hosts().await {
            let engine = match self.engines.engine_for(&host).await {
                Ok(engine) => engine,
                Err(e) => {
                    warn!(host = %host.id, error = %e, "Discovery skipped unreachable host");
                    continue;
                }
            };
            let summaries = match engine
                .list_containers(&format!("{}=true", MANAGED_LABEL))
                .await
            {
                Ok(summaries) => summaries,
                Err(e) => {
                    warn!(host = %host.id, error = %e, "Discovery listing failed");
                    continue;
                }
            };
            for summary in summaries {
                if let Some(workspace_id) = self.adopt_container(&host, &summary).await {
                    info!(
                        workspace = %workspace_id,
                        host = %host.id,
                        container = %summary.name,
                        "Adopted existing workspace"
                    );
                    discovered += 1;
                }
            }
        }
        Ok(discovered)
    }
}
