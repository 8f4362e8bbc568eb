// ABOUTME: Container-engine driver abstraction for Warren hosts
// ABOUTME: Defines the driver capability set and the Docker (bollard) implementation

pub mod docker;
pub mod error;
pub mod factory;
pub mod types;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use warren_fleet::RawStatsSnapshot;

pub use docker::{raw_snapshot_from_stats, DockerEngine};
pub use error::{EngineError, Result};
pub use factory::{DockerEngineFactory, EngineFactory};
pub use types::{ContainerSpec, ContainerSummary, CreatedContainer, ExecOutput, FileEntry};

/// Driver capability set for one container host. The transport/protocol is
/// the driver's business; callers see containers by id and typed errors.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Liveness probe against the engine endpoint.
    async fn ping(&self) -> Result<()>;

    /// Create and start a container, returning its id and routable IP.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer>;

    /// Stop a container, granting it `timeout_secs` to exit gracefully.
    /// Stopping an already-stopped container succeeds.
    async fn stop_container(&self, container_id: &str, timeout_secs: u64) -> Result<()>;

    /// Remove a container. Removing an already-removed container succeeds.
    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()>;

    /// Run a command inside a running container with an explicit deadline.
    async fn exec(
        &self,
        container_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
        timeout: Duration,
    ) -> Result<ExecOutput>;

    /// Fetch a point-in-time raw stats snapshot.
    async fn stats(&self, container_id: &str) -> Result<RawStatsSnapshot>;

    /// List containers matching a `key=value` label filter, including
    /// stopped ones. Used by startup discovery.
    async fn list_containers(&self, label_filter: &str) -> Result<Vec<ContainerSummary>>;

    /// Read a single file out of the container filesystem.
    async fn read_file(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Write a single file into the container filesystem.
    async fn write_file(&self, container_id: &str, path: &str, contents: &[u8]) -> Result<()>;

    /// Export a path as a tar archive (used to preserve files on delete).
    async fn export_path(&self, container_id: &str, path: &str) -> Result<Vec<u8>>;
}
