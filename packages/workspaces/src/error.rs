// ABOUTME: Error types for workspace lifecycle operations
// ABOUTME: The typed taxonomy callers and the proxy boundary translate from

use thiserror::Error;
use warren_engine::EngineError;
use warren_fleet::FleetError;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// Workspace record does not exist
    #[error("Workspace not found: {0}")]
    NotFound(String),

    /// Referenced host is not in the fleet registry
    #[error("Host not found: {0}")]
    HostNotFound(String),

    /// Operation requires the workspace to be running
    #[error("Workspace is not running: {0}")]
    NotRunning(String),

    /// No host satisfies the placement constraints; caller may retry later
    #[error("Capacity exhausted: {0}")]
    CapacityExhausted(String),

    /// Proxy target unreachable (connection refused or no route)
    #[error("Upstream connection failed: {0}")]
    UpstreamConnection(String),

    /// Proxy target did not answer within the deadline
    #[error("Upstream request timed out: {0}")]
    UpstreamTimeout(String),

    /// Container-engine call failed
    #[error("Engine driver error: {0}")]
    Driver(#[from] EngineError),

    /// Malformed caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Anything that is a bug or an environment fault, not a caller fault
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FleetError> for WorkspaceError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::CapacityExhausted(msg) => WorkspaceError::CapacityExhausted(msg),
            FleetError::HostNotFound(id) => WorkspaceError::HostNotFound(id),
            FleetError::InvalidInventory(msg) => WorkspaceError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;
