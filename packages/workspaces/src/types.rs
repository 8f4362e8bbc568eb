// ABOUTME: Core type definitions for workspace lifecycle and proxying
// ABOUTME: Workspace records, create requests, and proxy value objects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tier::Tier;

/// Workspace lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    /// Placement done, container being provisioned
    Creating,
    /// Container up, reachable through the proxies
    Running,
    /// Graceful stop in progress
    Stopping,
    /// Container stopped; record retained until delete
    Stopped,
    /// Unrecoverable failure; record retained for diagnosis
    Error,
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceStatus::Creating => "creating",
            WorkspaceStatus::Running => "running",
            WorkspaceStatus::Stopping => "stopping",
            WorkspaceStatus::Stopped => "stopped",
            WorkspaceStatus::Error => "error",
        }
    }

    /// Statuses that hold reserved capacity on their host. Leaving this set
    /// releases the reservation exactly once.
    pub fn holds_capacity(&self) -> bool {
        matches!(
            self,
            WorkspaceStatus::Creating | WorkspaceStatus::Running | WorkspaceStatus::Stopping
        )
    }
}

/// One user's isolated container-backed development environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    /// Host assignment is immutable for the life of the record;
    /// rescheduling means delete + recreate.
    pub host_id: String,
    pub tier: Tier,
    pub status: WorkspaceStatus,
    pub container_id: Option<String>,
    pub container_name: String,
    /// Address the proxies dial, routable from this service.
    pub proxy_host: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub last_usage_report_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

/// Request to create a new workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkspaceRequest {
    pub user_id: String,
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

/// A single HTTP request to forward into a workspace. Carries no state
/// beyond one call.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub workspace_id: String,
    pub port: u16,
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub query: Option<String>,
}

/// The upstream's verbatim answer to a [`ProxyRequest`].
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}
