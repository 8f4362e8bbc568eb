// ABOUTME: Host capacity record and health/availability predicates
// ABOUTME: Pure data consulted by the scheduler on every placement decision

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use warren_config::constants::HOST_HEARTBEAT_FRESHNESS_SECS;

/// Operational status of a container host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Accepting new workspaces
    Active,
    /// Running existing workspaces but not accepting new ones
    Draining,
    /// Taken out of rotation by an operator
    Maintenance,
    /// Unreachable
    Offline,
    /// Engine reported a fault; kept visible for diagnosis
    Error,
}

/// GPU capability advertised by a host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GpuInfo {
    pub gpu_type: String,
    pub count: u32,
}

/// A machine capable of running workspace containers, tracked with
/// capacity, usage, and health.
///
/// `used_* <= total_*` is a target, not a hard invariant: transient
/// oversubscription is legal and availability simply clamps at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    /// Network address workspaces are reached through.
    pub address: String,
    /// Container engine API port on `address`.
    pub engine_port: u16,

    pub total_cpu_cores: f64,
    pub total_memory_mb: u64,
    pub total_disk_gb: u64,

    #[serde(default)]
    pub used_cpu_cores: f64,
    #[serde(default)]
    pub used_memory_mb: u64,
    #[serde(default)]
    pub used_disk_gb: u64,
    #[serde(default)]
    pub active_workspaces: u32,

    pub status: HostStatus,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,

    #[serde(default)]
    pub gpu: Option<GpuInfo>,
    /// Container runtime variant, e.g. "runc" or "gvisor".
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default = "default_architecture")]
    pub cpu_architecture: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

fn default_architecture() -> String {
    "x86_64".to_string()
}

impl Host {
    pub fn available_cpu_cores(&self) -> f64 {
        (self.total_cpu_cores - self.used_cpu_cores).max(0.0)
    }

    pub fn available_memory_mb(&self) -> u64 {
        self.total_memory_mb.saturating_sub(self.used_memory_mb)
    }

    pub fn available_disk_gb(&self) -> u64 {
        self.total_disk_gb.saturating_sub(self.used_disk_gb)
    }

    pub fn cpu_utilization(&self) -> f64 {
        if self.total_cpu_cores > 0.0 {
            self.used_cpu_cores / self.total_cpu_cores * 100.0
        } else {
            0.0
        }
    }

    pub fn memory_utilization(&self) -> f64 {
        if self.total_memory_mb > 0 {
            self.used_memory_mb as f64 / self.total_memory_mb as f64 * 100.0
        } else {
            0.0
        }
    }

    pub fn disk_utilization(&self) -> f64 {
        if self.total_disk_gb > 0 {
            self.used_disk_gb as f64 / self.total_disk_gb as f64 * 100.0
        } else {
            0.0
        }
    }

    /// A host is healthy iff it is active and heartbeated within the
    /// freshness window. No heartbeat ever recorded means unhealthy.
    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        if self.status != HostStatus::Active {
            return false;
        }
        match self.last_heartbeat {
            Some(seen) => now - seen < Duration::seconds(HOST_HEARTBEAT_FRESHNESS_SECS),
            None => false,
        }
    }

    /// Whether a workspace with the given footprint fits on this host right now.
    pub fn can_fit(&self, cpu_cores: f64, memory_mb: u64, disk_gb: u64, now: DateTime<Utc>) -> bool {
        self.is_healthy(now)
            && self.available_cpu_cores() >= cpu_cores
            && self.available_memory_mb() >= memory_mb
            && self.available_disk_gb() >= disk_gb
    }

    /// Container engine endpoint for this host.
    pub fn engine_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.address, self.engine_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Host {
        Host {
            id: "host-1".to_string(),
            name: "host-1".to_string(),
            address: "10.0.0.5".to_string(),
            engine_port: 2375,
            total_cpu_cores: 8.0,
            total_memory_mb: 16384,
            total_disk_gb: 200,
            used_cpu_cores: 2.0,
            used_memory_mb: 4096,
            used_disk_gb: 50,
            active_workspaces: 2,
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

    #[test]
    fn availability_is_total_minus_used() {
        let h = host();
        assert_eq!(h.available_cpu_cores(), 6.0);
        assert_eq!(h.available_memory_mb(), 12288);
        assert_eq!(h.available_disk_gb(), 150);
    }

    #[test]
    fn availability_clamps_at_zero_under_oversubscription() {
        let mut h = host();
        h.used_cpu_cores = 10.0;
        h.used_memory_mb = 20000;
        h.used_disk_gb = 500;
        assert_eq!(h.available_cpu_cores(), 0.0);
        assert_eq!(h.available_memory_mb(), 0);
        assert_eq!(h.available_disk_gb(), 0);
    }

    #[test]
    fn utilization_is_zero_when_total_is_zero() {
        let mut h = host();
        h.total_cpu_cores = 0.0;
        h.total_memory_mb = 0;
        h.total_disk_gb = 0;
        assert_eq!(h.cpu_utilization(), 0.0);
        assert_eq!(h.memory_utilization(), 0.0);
        assert_eq!(h.disk_utilization(), 0.0);
    }

    #[test]
    fn utilization_percentages() {
        let h = host();
        assert_eq!(h.cpu_utilization(), 25.0);
        assert_eq!(h.memory_utilization(), 25.0);
        assert_eq!(h.disk_utilization(), 25.0);
    }

    #[test]
    fn healthy_requires_active_status() {
        let now = Utc::now();
        let mut h = host();
        assert!(h.is_healthy(now));
        h.status = HostStatus::Draining;
        assert!(!h.is_healthy(now));
        h.status = HostStatus::Maintenance;
        assert!(!h.is_healthy(now));
    }

    #[test]
    fn healthy_requires_fresh_heartbeat() {
        let now = Utc::now();
        let mut h = host();
        h.last_heartbeat = None;
        assert!(!h.is_healthy(now));
        h.last_heartbeat = Some(now - Duration::seconds(HOST_HEARTBEAT_FRESHNESS_SECS + 1));
        assert!(!h.is_healthy(now));
        h.last_heartbeat = Some(now - Duration::seconds(HOST_HEARTBEAT_FRESHNESS_SECS - 5));
        assert!(h.is_healthy(now));
    }

    #[test]
    fn can_fit_checks_health_and_all_dimensions() {
        let now = Utc::now();
        let h = host();
        assert!(h.can_fit(4.0, 8192, 100, now));
        assert!(!h.can_fit(7.0, 8192, 100, now));
        assert!(!h.can_fit(4.0, 13000, 100, now));
        assert!(!h.can_fit(4.0, 8192, 151, now));

        let mut stale = host();
        stale.last_heartbeat = None;
        assert!(!stale.can_fit(1.0, 1024, 10, now));
    }
}
