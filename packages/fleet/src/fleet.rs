// ABOUTME: Shared registry of container hosts with atomic capacity accounting
// ABOUTME: The only mutation path for per-host usage counters and heartbeats

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{FleetError, Result};
use crate::host::{Host, HostStatus};

/// Resource footprint reserved on a host for one workspace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceFootprint {
    pub cpu_cores: f64,
    pub memory_mb: u64,
    pub disk_gb: u64,
}

/// In-memory fleet registry. Hosts are created and updated by the external
/// fleet-registration process and by the heartbeat-ingest job; usage counters
/// are mutated only through [`Fleet::reserve`] and [`Fleet::release`] so
/// concurrent workspace churn cannot lose updates.
#[derive(Clone, Default)]
pub struct Fleet {
    hosts: Arc<RwLock<HashMap<String, Host>>>,
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an initial inventory, replacing any host with the same id.
    pub async fn load_inventory(&self, hosts: Vec<Host>) {
        let mut map = self.hosts.write().await;
        for host in hosts {
            info!(host = %host.id, address = %host.address, "Registered fleet host");
            map.insert(host.id.clone(), host);
        }
    }

    /// Parse a JSON host inventory document.
    pub fn parse_inventory(raw: &str) -> Result<Vec<Host>> {
        serde_json::from_str(raw).map_err(|e| FleetError::InvalidInventory(e.to_string()))
    }

    pub async fn upsert_host(&self, host: Host) {
        let mut map = self.hosts.write().await;
        map.insert(host.id.clone(), host);
    }

    pub async fn get_host(&self, host_id: &str) -> Result<Host> {
        let map = self.hosts.read().await;
        map.get(host_id)
            .cloned()
            .ok_or_else(|| FleetError::HostNotFound(host_id.to_string()))
    }

    pub async fn list_hosts(&self) -> Vec<Host> {
        let map = self.hosts.read().await;
        map.values().cloned().collect()
    }

    /// Record a successful heartbeat from a host, clearing any prior error.
    pub async fn record_heartbeat(&self, host_id: &str) -> Result<()> {
        let mut map = self.hosts.write().await;
        let host = map
            .get_mut(host_id)
            .ok_or_else(|| FleetError::HostNotFound(host_id.to_string()))?;
        host.last_heartbeat = Some(Utc::now());
        if host.status == HostStatus::Error || host.status == HostStatus::Offline {
            info!(host = %host_id, "Host recovered, marking active");
            host.status = HostStatus::Active;
        }
        host.last_error = None;
        Ok(())
    }

    /// Record a failed heartbeat attempt. The host keeps its last-seen
    /// timestamp; health decays naturally once the freshness window passes.
    pub async fn record_heartbeat_failure(&self, host_id: &str, error: &str) -> Result<()> {
        let mut map = self.hosts.write().await;
        let host = map
            .get_mut(host_id)
            .ok_or_else(|| FleetError::HostNotFound(host_id.to_string()))?;
        warn!(host = %host_id, error = %error, "Host heartbeat failed");
        host.last_error = Some(error.to_string());
        if host.status == HostStatus::Active {
            host.status = HostStatus::Error;
        }
        Ok(())
    }

    /// Reserve capacity on a host for one workspace.
    pub async fn reserve(&self, host_id: &str, footprint: ResourceFootprint) -> Result<()> {
        let mut map = self.hosts.write().await;
        let host = map
            .get_mut(host_id)
            .ok_or_else(|| FleetError::HostNotFound(host_id.to_string()))?;
        host.used_cpu_cores += footprint.cpu_cores;
        host.used_memory_mb += footprint.memory_mb;
        host.used_disk_gb += footprint.disk_gb;
        host.active_workspaces += 1;
        debug!(
            host = %host_id,
            cpu = footprint.cpu_cores,
            memory_mb = footprint.memory_mb,
            disk_gb = footprint.disk_gb,
            "Reserved workspace capacity"
        );
        Ok(())
    }

    /// Release capacity previously reserved with [`Fleet::reserve`].
    /// Counters clamp at zero; a release for an unknown host is logged and
    /// ignored so teardown never fails on a deregistered host.
    pub async fn release(&self, host_id: &str, footprint: ResourceFootprint) {
        let mut map = self.hosts.write().await;
        let Some(host) = map.get_mut(host_id) else {
            warn!(host = %host_id, "Release for unknown host ignored");
            return;
        };
        host.used_cpu_cores = (host.used_cpu_cores - footprint.cpu_cores).max(0.0);
        host.used_memory_mb = host.used_memory_mb.saturating_sub(footprint.memory_mb);
        host.used_disk_gb = host.used_disk_gb.saturating_sub(footprint.disk_gb);
        host.active_workspaces = host.active_workspaces.saturating_sub(1);
        debug!(
            host = %host_id,
            cpu = footprint.cpu_cores,
            memory_mb = footprint.memory_mb,
            disk_gb = footprint.disk_gb,
            "Released workspace capacity"
        );
    }

    /// Run a closure under the registry write lock. Used by the scheduler so
    /// candidate selection and reservation are a single atomic step.
    pub(crate) async fn with_hosts_mut<R>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Host>) -> R,
    ) -> R {
        let mut map = self.hosts.write().await;
        f(&mut map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostStatus;
    use std::collections::HashMap as StdHashMap;

    fn host(id: &str) -> Host {
        Host {
            id: id.to_string(),
            name: id.to_string(),
            address: "10.0.0.1".to_string(),
            engine_port: 2375,
            total_cpu_cores: 4.0,
            total_memory_mb: 8192,
            total_disk_gb: 100,
            used_cpu_cores: 0.0,
            used_memory_mb: 0,
            used_disk_gb: 0,
            active_workspaces: 0,
            status: HostStatus::Active,
            last_heartbeat: Some(Utc::now()),
            last_error: None,
            gpu: None,
            runtime: None,
            cpu_architecture: "x86_64".to_string(),
            labels: StdHashMap::new(),
            region: None,
            provider: None,
        }
    }

    fn footprint() -> ResourceFootprint {
        ResourceFootprint {
            cpu_cores: 2.0,
            memory_mb: 4096,
            disk_gb: 20,
        }
    }

    #[tokio::test]
    async fn reserve_and_release_round_trip() {
        let fleet = Fleet::new();
        fleet.load_inventory(vec![host("a")]).await;

        fleet.reserve("a", footprint()).await.unwrap();
        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.used_cpu_cores, 2.0);
        assert_eq!(h.used_memory_mb, 4096);
        assert_eq!(h.active_workspaces, 1);

        fleet.release("a", footprint()).await;
        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.used_cpu_cores, 0.0);
        assert_eq!(h.used_memory_mb, 0);
        assert_eq!(h.active_workspaces, 0);
    }

    #[tokio::test]
    async fn release_clamps_at_zero() {
        let fleet = Fleet::new();
        fleet.load_inventory(vec![host("a")]).await;
        fleet.release("a", footprint()).await;
        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.used_memory_mb, 0);
        assert_eq!(h.active_workspaces, 0);
    }

    #[tokio::test]
    async fn heartbeat_recovers_errored_host() {
        let fleet = Fleet::new();
        fleet.load_inventory(vec![host("a")]).await;
        fleet.record_heartbeat_failure("a", "connection refused").await.unwrap();
        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.status, HostStatus::Error);
        assert!(h.last_error.is_some());

        fleet.record_heartbeat("a").await.unwrap();
        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.status, HostStatus::Active);
        assert!(h.last_error.is_none());
    }

    #[tokio::test]
    async fn unknown_host_lookup_errors() {
        let fleet = Fleet::new();
        assert!(matches!(
            fleet.get_host("missing").await,
            Err(FleetError::HostNotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_reservations_are_not_lost() {
        let fleet = Fleet::new();
        let mut big = host("a");
        big.total_cpu_cores = 64.0;
        big.total_memory_mb = 262_144;
        big.total_disk_gb = 4096;
        fleet.load_inventory(vec![big]).await;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let fleet = fleet.clone();
            handles.push(tokio::spawn(async move {
                fleet.reserve("a", footprint()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let h = fleet.get_host("a").await.unwrap();
        assert_eq!(h.active_workspaces, 32);
        assert_eq!(h.used_memory_mb, 32 * 4096);
    }

    #[test]
    fn parse_inventory_rejects_malformed_json() {
        assert!(Fleet::parse_inventory("not json").is_err());
        let parsed = Fleet::parse_inventory("[]").unwrap();
        assert!(parsed.is_empty());
    }
}
