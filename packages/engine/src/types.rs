// ABOUTME: Value types exchanged with container-engine drivers
// ABOUTME: Container specs, summaries, and exec results independent of any engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything a driver needs to create and start one workspace container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub env_vars: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub cpu_cores: f64,
    pub memory_mb: u64,
    pub disk_gb: u64,
    pub command: Option<Vec<String>>,
    pub working_dir: Option<String>,
}

/// Handle returned after a successful container create+start.
#[derive(Debug, Clone)]
pub struct CreatedContainer {
    pub id: String,
    /// Container IP routable from this service, used as the proxy target.
    pub ip_address: String,
}

/// Summary of an existing container, as returned by a label-filtered listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub state: String,
    pub labels: HashMap<String, String>,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state.eq_ignore_ascii_case("running")
    }
}

/// Result of running a command inside a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecOutput {
    pub fn stdout_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_utf8(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// One entry from a directory listing inside a container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
}
