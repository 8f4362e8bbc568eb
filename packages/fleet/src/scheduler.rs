// ABOUTME: Placement scheduler selecting a host for each new workspace
// ABOUTME: Selection and capacity reservation happen atomically under the fleet lock

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{FleetError, Result};
use crate::fleet::{Fleet, ResourceFootprint};
use crate::host::Host;

/// Constraints a placement must honor beyond the raw resource footprint.
#[derive(Debug, Clone, Default)]
pub struct PlacementConstraints {
    pub region: Option<String>,
    pub cpu_architecture: Option<String>,
    pub requires_gpu: bool,
}

/// A placement request: the tier footprint plus optional constraints.
#[derive(Debug, Clone)]
pub struct PlacementRequest {
    pub footprint: ResourceFootprint,
    pub constraints: PlacementConstraints,
}

/// Decides which host runs a new workspace.
///
/// Eligible hosts are healthy hosts where the footprint fits and constraints
/// match. Tie-break is deterministic: most available memory first, then
/// fewest active workspaces, then host id, so placement is reproducible.
#[derive(Clone)]
pub struct Scheduler {
    fleet: Fleet,
}

impl Scheduler {
    pub fn new(fleet: Fleet) -> Self {
        Self { fleet }
    }

    /// Select a host and reserve the footprint on it in one atomic step.
    /// The caller owns the reservation and must release it via
    /// [`Fleet::release`] if the workspace never materializes.
    ///
    /// Never blocks waiting for capacity: with no qualifying host this fails
    /// immediately with [`FleetError::CapacityExhausted`] and no usage
    /// counter changes.
    pub async fn place(&self, request: &PlacementRequest) -> Result<Host> {
        let footprint = request.footprint;
        let constraints = request.constraints.clone();
        let now = Utc::now();

        let placed = self
            .fleet
            .with_hosts_mut(move |hosts| {
                let mut candidates: Vec<&Host> = hosts
                    .values()
                    .filter(|host| {
                        host.can_fit(
                            footprint.cpu_cores,
                            footprint.memory_mb,
                            footprint.disk_gb,
                            now,
                        ) && Self::matches_constraints(host, &constraints)
                    })
                    .collect();

                candidates.sort_by(|a, b| {
                    b.available_memory_mb()
                        .cmp(&a.available_memory_mb())
                        .then(a.active_workspaces.cmp(&b.active_workspaces))
                        .then(a.id.cmp(&b.id))
                });

                let chosen_id = candidates.first().map(|host| host.id.clone())?;
                let host = hosts.get_mut(&chosen_id)?;
                host.used_cpu_cores += footprint.cpu_cores;
                host.used_memory_mb += footprint.memory_mb;
                host.used_disk_gb += footprint.disk_gb;
                host.active_workspaces += 1;
                Some(host.clone())
            })
            .await;

        match placed {
            Some(host) => {
                info!(
                    host = %host.id,
                    cpu = footprint.cpu_cores,
                    memory_mb = footprint.memory_mb,
                    disk_gb = footprint.disk_gb,
                    "Placed workspace"
                );
                Ok(host)
            }
            None => {
                debug!(
                    cpu = footprint.cpu_cores,
                    memory_mb = footprint.memory_mb,
                    disk_gb = footprint.disk_gb,
                    "No eligible host for placement"
                );
                Err(FleetError::CapacityExhausted(format!(
                    "no healthy host with {} cores / {} MB / {} GB free",
                    footprint.cpu_cores, footprint.memory_mb, footprint.disk_gb
                )))
            }
        }
    }

    fn matches_constraints(host: &Host, constraints: &PlacementConstraints) -> bool {
        if let Some(region) = &constraints.region {
            if host.region.as_deref() != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(arch) = &constraints.cpu_architecture {
            if &host.cpu_architecture != arch {
                return false;
            }
        }
        if constraints.requires_gpu && host.gpu.is_none() {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{GpuInfo, HostStatus};
    use std::collections::HashMap;

    fn host(id: &str, free_memory_mb: u64, active: u32) -> Host {
        Host {
            id: id.to_string(),
            name: id.to_string(),
            address: format!("10.0.0.{}", active + 1),
            engine_port: 2375,
            total_cpu_cores: 8.0,
            total_memory_mb: free_memory_mb,
            total_disk_gb: 100,
            used_cpu_cores: 0.0,
            used_memory_mb: 0,
            used_disk_gb: 0,
            active_workspaces: active,
            status: HostStatus::Active,
            last_heartbeat: Some(Utc::now()),
            last_error: None,
            gpu: None,
            runtime: None,
            cpu_architecture: "x86_64".to_string(),
            labels: HashMap::new(),
            region: None,
            provider: None,
        }
    }

    fn request(cpu: f64, memory_mb: u64, disk_gb: u64) -> PlacementRequest {
        PlacementRequest {
            footprint: ResourceFootprint {
                cpu_cores: cpu,
                memory_mb,
                disk_gb,
            },
            constraints: PlacementConstraints::default(),
        }
    }

    #[tokio::test]
    async fn prefers_host_with_most_available_memory() {
        let fleet = Fleet::new();
        fleet
            .load_inventory(vec![host("a", 8192, 0), host("b", 16384, 0)])
            .await;
        let scheduler = Scheduler::new(fleet);

        let placed = scheduler.place(&request(2.0, 4096, 20)).await.unwrap();
        assert_eq!(placed.id, "b");
    }

    #[tokio::test]
    async fn memory_tie_breaks_on_fewest_active_workspaces() {
        let fleet = Fleet::new();
        fleet
            .load_inventory(vec![host("a", 8192, 3), host("b", 8192, 1)])
            .await;
        let scheduler = Scheduler::new(fleet);

        let placed = scheduler.place(&request(1.0, 1024, 10)).await.unwrap();
        assert_eq!(placed.id, "b");
    }

    #[tokio::test]
    async fn full_tie_breaks_on_host_id() {
        let fleet = Fleet::new();
        fleet
            .load_inventory(vec![host("b", 8192, 1), host("a", 8192, 1)])
            .await;
        let scheduler = Scheduler::new(fleet);

        let placed = scheduler.place(&request(1.0, 1024, 10)).await.unwrap();
        assert_eq!(placed.id, "a");
    }

    #[tokio::test]
    async fn placement_reserves_capacity() {
        let fleet = Fleet::new();
        fleet.load_inventory(vec![host("a", 8192, 0)]).await;
        let scheduler = Scheduler::new(fleet.clone());

        let placed = scheduler.place(&request(2.0, 4096, 20)).await.unwrap();
        assert_eq!(placed.used_memory_mb, 4096);
        assert_eq!(placed.active_workspaces, 1);

        let stored = fleet.get_host("a").await.unwrap();
        assert_eq!(stored.used_memory_mb, 4096);
        assert_eq!(stored.used_cpu_cores, 2.0);
    }

    #[tokio::test]
    async fn exhausted_capacity_fails_without_mutating_counters() {
        let fleet = Fleet::new();
        fleet
            .load_inventory(vec![host("a", 2048, 0), host("b", 4096, 0)])
            .await;
        let scheduler = Scheduler::new(fleet.clone());

        let result = scheduler.place(&request(2.0, 8192, 20)).await;
        assert!(matches!(result, Err(FleetError::CapacityExhausted(_))));

        for host in fleet.list_hosts().await {
            assert_eq!(host.used_memory_mb, 0);
            assert_eq!(host.used_cpu_cores, 0.0);
            assert_eq!(host.active_workspaces, 0);
        }
    }

    #[tokio::test]
    async fn unhealthy_hosts_are_never_selected() {
        let fleet = Fleet::new();
        let mut stale = host("a", 16384, 0);
        stale.last_heartbeat = None;
        let mut draining = host("b", 16384, 0);
        draining.status = HostStatus::Draining;
        fleet.load_inventory(vec![stale, draining, host("c", 8192, 0)]).await;
        let scheduler = Scheduler::new(fleet);

        let placed = scheduler.place(&request(1.0, 1024, 10)).await.unwrap();
        assert_eq!(placed.id, "c");
    }

    #[tokio::test]
    async fn gpu_and_region_constraints_filter_hosts() {
        let fleet = Fleet::new();
        let mut gpu_host = host("gpu-1", 8192, 0);
        gpu_host.gpu = Some(GpuInfo {
            gpu_type: "a10g".to_string(),
            count: 1,
        });
        gpu_host.region = Some("us-east".to_string());
        let mut plain = host("cpu-1", 16384, 0);
        plain.region = Some("eu-west".to_string());
        fleet.load_inventory(vec![gpu_host, plain]).await;
        let scheduler = Scheduler::new(fleet);

        let mut req = request(1.0, 1024, 10);
        req.constraints.requires_gpu = true;
        let placed = scheduler.place(&req).await.unwrap();
        assert_eq!(placed.id, "gpu-1");

        let mut req = request(1.0, 1024, 10);
        req.constraints.region = Some("eu-west".to_string());
        let placed = scheduler.place(&req).await.unwrap();
        assert_eq!(placed.id, "cpu-1");

        let mut req = request(1.0, 1024, 10);
        req.constraints.region = Some("ap-south".to_string());
        assert!(scheduler.place(&req).await.is_err());
    }
}
