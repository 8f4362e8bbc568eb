// ABOUTME: Docker driver for Warren hosts via bollard
// ABOUTME: Creates, inspects, execs into, and tears down workspace containers

use async_trait::async_trait;
use bollard::{
    container::{
        Config, CreateContainerOptions, DownloadFromContainerOptions, ListContainersOptions,
        LogOutput, RemoveContainerOptions, StartContainerOptions, StatsOptions,
        StopContainerOptions, UploadToContainerOptions,
    },
    exec::{CreateExecOptions, StartExecResults},
    image::CreateImageOptions,
    Docker,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

use warren_fleet::stats::{RawBlkioEntry, RawCpuSample, RawMemoryStats, RawNetworkStats, RawStatsSnapshot};

use crate::error::{EngineError, Result};
use crate::types::{ContainerSpec, ContainerSummary, CreatedContainer, ExecOutput};
use crate::ContainerEngine;

/// Default per-call deadline for engine API calls.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Docker engine driver for a single host.
pub struct DockerEngine {
    client: Docker,
    call_timeout: Duration,
}

impl DockerEngine {
    /// Connect to the local Docker daemon (socket defaults).
    pub fn local() -> Result<Self> {
        let client = Docker::connect_with_defaults()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    /// Connect to a remote host's Docker API over TCP.
    pub fn remote(address: &str, port: u16) -> Result<Self> {
        let endpoint = format!("http://{}:{}", address, port);
        let client = Docker::connect_with_http(&endpoint, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        })
    }

    /// Use an existing bollard client (tests, custom transports).
    pub fn with_client(client: Docker) -> Self {
        Self {
            client,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    async fn deadline<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }

    /// Ensure an image is available locally, pulling it if necessary.
    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.client.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image already present");
            return Ok(());
        }

        info!(image = %image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }
        Ok(())
    }

    fn to_bollard_config(spec: &ContainerSpec) -> Config<String> {
        let env: Vec<String> = spec
            .env_vars
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut host_config = bollard::models::HostConfig {
            memory: Some((spec.memory_mb * 1024 * 1024) as i64),
            // CPU quota against the default 100ms period (100000 = 1 core)
            cpu_quota: Some((spec.cpu_cores * 100_000.0) as i64),
            cpu_period: Some(100_000),
            network_mode: Some("bridge".to_string()),
            cap_drop: Some(vec!["ALL".to_string()]),
            privileged: Some(false),
            ..Default::default()
        };

        if spec.disk_gb > 0 {
            host_config.storage_opt = Some(HashMap::from([(
                "size".to_string(),
                format!("{}G", spec.disk_gb),
            )]));
        }

        Config {
            image: Some(spec.image.clone()),
            cmd: spec.command.clone(),
            env: Some(env),
            working_dir: spec.working_dir.clone(),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn container_ip(&self, container_id: &str) -> Result<String> {
        let inspect = self.client.inspect_container(container_id, None).await?;
        let networks = inspect
            .network_settings
            .and_then(|ns| ns.networks)
            .unwrap_or_default();
        for (_name, endpoint) in networks {
            if let Some(ip) = endpoint.ip_address {
                if !ip.is_empty() {
                    return Ok(ip);
                }
            }
        }
        Err(EngineError::Api(format!(
            "container {} has no IP address",
            container_id
        )))
    }
}

/// Pack a single file into an in-memory tar archive for upload.
fn pack_single_file(name: &str, contents: &[u8]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, name, contents)
        .map_err(|e| EngineError::FileTransfer(e.to_string()))?;
    builder
        .into_inner()
        .map_err(|e| EngineError::FileTransfer(e.to_string()))
}

/// Extract the first regular file from a tar archive.
fn unpack_single_file(data: &[u8]) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(data);
    let entries = archive
        .entries()
        .map_err(|e| EngineError::FileTransfer(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| EngineError::FileTransfer(e.to_string()))?;
        if entry.header().entry_type().is_file() {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| EngineError::FileTransfer(e.to_string()))?;
            return Ok(buf);
        }
    }
    Err(EngineError::FileTransfer(
        "archive contained no regular file".to_string(),
    ))
}

fn split_container_path(path: &str) -> (String, String) {
    match path.rsplit_once('/') {
        Some((dir, file)) if !dir.is_empty() => (dir.to_string(), file.to_string()),
        Some((_, file)) => ("/".to_string(), file.to_string()),
        None => ("/".to_string(), path.to_string()),
    }
}

/// Convert a bollard stats sample into the engine-agnostic raw snapshot
/// consumed by the stats normalizer.
pub fn raw_snapshot_from_stats(stats: &bollard::container::Stats) -> RawStatsSnapshot {
    let cpu = Some(RawCpuSample {
        total_usage: stats.cpu_stats.cpu_usage.total_usage,
        system_usage: stats.cpu_stats.system_cpu_usage.unwrap_or(0),
        online_cpus: stats.cpu_stats.online_cpus.unwrap_or(0) as u32,
    });
    let precpu = Some(RawCpuSample {
        total_usage: stats.precpu_stats.cpu_usage.total_usage,
        system_usage: stats.precpu_stats.system_cpu_usage.unwrap_or(0),
        online_cpus: stats.precpu_stats.online_cpus.unwrap_or(0) as u32,
    });
    let memory = Some(RawMemoryStats {
        usage: stats.memory_stats.usage.unwrap_or(0),
        limit: stats.memory_stats.limit.unwrap_or(0),
    });

    let networks = stats
        .networks
        .as_ref()
        .map(|interfaces| {
            interfaces
                .iter()
                .map(|(name, net)| {
                    (
                        name.clone(),
                        RawNetworkStats {
                            rx_bytes: net.rx_bytes,
                            tx_bytes: net.tx_bytes,
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let blkio = stats
        .blkio_stats
        .io_service_bytes_recursive
        .as_ref()
        .map(|entries| {
            entries
                .iter()
                .map(|entry| RawBlkioEntry {
                    op: entry.op.clone(),
                    value: entry.value,
                })
                .collect()
        })
        .unwrap_or_default();

    RawStatsSnapshot {
        cpu,
        precpu,
        memory,
        networks,
        blkio,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<()> {
        self.deadline(async {
            self.client.ping().await?;
            Ok(())
        })
        .await
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        info!(container = %spec.name, image = %spec.image, "Creating container");

        self.ensure_image(&spec.image).await?;

        let config = Self::to_bollard_config(spec);
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let created = self.client.create_container(Some(options), config).await?;
        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        let ip_address = self.container_ip(&created.id).await?;
        info!(container = %spec.name, id = %created.id, ip = %ip_address, "Container started");

        Ok(CreatedContainer {
            id: created.id,
            ip_address,
        })
    }

    async fn stop_container(&self, container_id: &str, timeout_secs: u64) -> Result<()> {
        debug!(container = %container_id, "Stopping container");
        let options = StopContainerOptions {
            t: timeout_secs as i64,
        };
        let stop = tokio::time::timeout(
            self.call_timeout + Duration::from_secs(timeout_secs),
            self.client.stop_container(container_id, Some(options)),
        )
        .await
        .map_err(|_| EngineError::Timeout {
            seconds: self.call_timeout.as_secs() + timeout_secs,
        })?;
        match stop {
            Ok(_) => Ok(()),
            // Already stopped is success for our purposes
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!(container = %container_id, "Container already stopped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> Result<()> {
        debug!(container = %container_id, force, "Removing container");
        let options = RemoveContainerOptions {
            force,
            v: true,
            ..Default::default()
        };
        let remove = tokio::time::timeout(
            self.call_timeout,
            self.client.remove_container(container_id, Some(options)),
        )
        .await
        .map_err(|_| EngineError::Timeout {
            seconds: self.call_timeout.as_secs(),
        })?;
        match remove {
            Ok(_) => Ok(()),
            // Already removed is success for our purposes
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(container = %container_id, "Container already removed");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exec(
        &self,
        container_id: &str,
        command: Vec<String>,
        env_vars: Option<HashMap<String, String>>,
        timeout: Duration,
    ) -> Result<ExecOutput> {
        debug!(container = %container_id, ?command, "Executing command");

        let env: Option<Vec<String>> = env_vars.map(|vars| {
            vars.into_iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect()
        });

        let exec_config = CreateExecOptions {
            cmd: Some(command),
            env,
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let run = async {
            let exec = self.client.create_exec(container_id, exec_config).await?;
            let start_result = self.client.start_exec(&exec.id, None).await?;

            let mut stdout = Vec::new();
            let mut stderr = Vec::new();

            match start_result {
                StartExecResults::Attached { mut output, .. } => {
                    while let Some(msg) = output.next().await {
                        match msg? {
                            LogOutput::StdOut { message } => stdout.extend_from_slice(&message),
                            LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                            LogOutput::Console { message } => stdout.extend_from_slice(&message),
                            _ => {}
                        }
                    }
                }
                StartExecResults::Detached => {
                    return Err(EngineError::Api(
                        "exec was detached unexpectedly".to_string(),
                    ));
                }
            }

            let inspect = self.client.inspect_exec(&exec.id).await?;
            Ok(ExecOutput {
                exit_code: inspect.exit_code.unwrap_or(0),
                stdout,
                stderr,
            })
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                seconds: timeout.as_secs(),
            }),
        }
    }

    async fn stats(&self, container_id: &str) -> Result<RawStatsSnapshot> {
        self.deadline(async {
            let options = StatsOptions {
                stream: false,
                one_shot: true,
            };
            let mut stream = self.client.stats(container_id, Some(options));
            match stream.next().await {
                Some(Ok(stats)) => Ok(raw_snapshot_from_stats(&stats)),
                Some(Err(e)) => Err(e.into()),
                None => Err(EngineError::NotFound(container_id.to_string())),
            }
        })
        .await
    }

    async fn list_containers(&self, label_filter: &str) -> Result<Vec<ContainerSummary>> {
        self.deadline(async {
            let mut filters = HashMap::new();
            filters.insert("label".to_string(), vec![label_filter.to_string()]);

            let options = ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            };

            let containers = self.client.list_containers(Some(options)).await?;

            let mut summaries = Vec::new();
            for container in containers {
                let Some(id) = container.id else { continue };
                let ip_address = match self.container_ip(&id).await {
                    Ok(ip) => Some(ip),
                    Err(e) => {
                        warn!(container = %id, error = %e, "Listed container has no IP");
                        None
                    }
                };
                summaries.push(ContainerSummary {
                    id,
                    name: container
                        .names
                        .unwrap_or_default()
                        .first()
                        .map(|n| n.trim_start_matches('/').to_string())
                        .unwrap_or_default(),
                    state: container.state.unwrap_or_default(),
                    labels: container.labels.unwrap_or_default(),
                    ip_address,
                    created_at: container
                        .created
                        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
                });
            }
            Ok(summaries)
        })
        .await
    }

    async fn read_file(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        let archive = self.export_path(container_id, path).await?;
        unpack_single_file(&archive)
    }

    async fn write_file(&self, container_id: &str, path: &str, contents: &[u8]) -> Result<()> {
        let (dir, file_name) = split_container_path(path);
        let archive = pack_single_file(&file_name, contents)?;

        let options = UploadToContainerOptions {
            path: dir,
            ..Default::default()
        };
        self.deadline(async {
            self.client
                .upload_to_container(container_id, Some(options), archive.into())
                .await?;
            Ok(())
        })
        .await
    }

    async fn export_path(&self, container_id: &str, path: &str) -> Result<Vec<u8>> {
        self.deadline(async {
            let options = DownloadFromContainerOptions {
                path: path.to_string(),
            };
            let mut stream = self
                .client
                .download_from_container(container_id, Some(options));
            let mut data = Vec::new();
            while let Some(chunk) = stream.next().await {
                data.extend_from_slice(&chunk?);
            }
            Ok(data)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_path_splits_into_dir_and_name() {
        assert_eq!(
            split_container_path("/workspace/src/main.rs"),
            ("/workspace/src".to_string(), "main.rs".to_string())
        );
        assert_eq!(
            split_container_path("/top.txt"),
            ("/".to_string(), "top.txt".to_string())
        );
        assert_eq!(
            split_container_path("bare.txt"),
            ("/".to_string(), "bare.txt".to_string())
        );
    }

    #[test]
    fn tar_round_trip_preserves_contents() {
        let archive = pack_single_file("notes.md", b"hello warren").unwrap();
        let restored = unpack_single_file(&archive).unwrap();
        assert_eq!(restored, b"hello warren");
    }

    #[test]
    fn unpack_rejects_empty_archive() {
        let empty = tar::Builder::new(Vec::new()).into_inner().unwrap();
        assert!(unpack_single_file(&empty).is_err());
    }

    #[test]
    fn bollard_config_carries_resource_limits() {
        let spec = ContainerSpec {
            name: "warren-ws-test".to_string(),
            image: "warren/workspace:latest".to_string(),
            env_vars: HashMap::from([("TERM".to_string(), "xterm".to_string())]),
            labels: HashMap::from([("warren.managed".to_string(), "true".to_string())]),
            cpu_cores: 2.0,
            memory_mb: 4096,
            disk_gb: 20,
            command: None,
            working_dir: Some("/workspace".to_string()),
        };
        let config = DockerEngine::to_bollard_config(&spec);
        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.memory, Some(4096 * 1024 * 1024));
        assert_eq!(host_config.cpu_quota, Some(200_000));
        assert_eq!(host_config.cpu_period, Some(100_000));
        assert_eq!(
            host_config.storage_opt.unwrap().get("size"),
            Some(&"20G".to_string())
        );
        assert_eq!(config.working_dir, Some("/workspace".to_string()));
    }
}
