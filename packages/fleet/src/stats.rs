// ABOUTME: Normalizes raw container-engine stats snapshots into comparable metrics
// ABOUTME: Runs on the hot monitoring path and must never fail on partial data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Cumulative CPU counters from one engine stats sample.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCpuSample {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub system_usage: u64,
    #[serde(default)]
    pub online_cpus: u32,
}

/// Memory section of an engine stats snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMemoryStats {
    #[serde(default)]
    pub usage: u64,
    #[serde(default)]
    pub limit: u64,
}

/// Per-interface network byte counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNetworkStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

/// One block-I/O counter entry, keyed by operation ("read"/"write").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBlkioEntry {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: u64,
}

/// A raw point-in-time stats snapshot as reported by the container engine.
/// Every section is optional: engines omit sections for freshly started or
/// stopping containers and the normalizer must cope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawStatsSnapshot {
    #[serde(default)]
    pub cpu: Option<RawCpuSample>,
    #[serde(default)]
    pub precpu: Option<RawCpuSample>,
    #[serde(default)]
    pub memory: Option<RawMemoryStats>,
    #[serde(default)]
    pub networks: HashMap<String, RawNetworkStats>,
    #[serde(default)]
    pub blkio: Vec<RawBlkioEntry>,
}

/// Normalized, comparable container metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub cpu_limit_cores: u32,
    pub memory_used_mb: f64,
    pub memory_limit_mb: f64,
    pub memory_percent: f64,
    pub network_rx_mb: f64,
    pub network_tx_mb: f64,
    pub disk_read_mb: f64,
    pub disk_write_mb: f64,
    pub collected_at: DateTime<Utc>,
}

impl Default for ContainerStats {
    fn default() -> Self {
        Self {
            cpu_percent: 0.0,
            cpu_limit_cores: 0,
            memory_used_mb: 0.0,
            memory_limit_mb: 0.0,
            memory_percent: 0.0,
            network_rx_mb: 0.0,
            network_tx_mb: 0.0,
            disk_read_mb: 0.0,
            disk_write_mb: 0.0,
            collected_at: Utc::now(),
        }
    }
}

/// Convert a raw snapshot into normalized percentages and MB rates.
/// Missing sections yield zero defaults; this never errors.
pub fn normalize(snapshot: &RawStatsSnapshot) -> ContainerStats {
    let mut stats = ContainerStats::default();

    if let Some(cpu) = &snapshot.cpu {
        stats.cpu_limit_cores = cpu.online_cpus;
        let previous = snapshot.precpu.clone().unwrap_or_default();
        let cpu_delta = cpu.total_usage.saturating_sub(previous.total_usage) as f64;
        let system_delta = cpu.system_usage.saturating_sub(previous.system_usage) as f64;
        if system_delta > 0.0 {
            stats.cpu_percent = cpu_delta / system_delta * cpu.online_cpus as f64 * 100.0;
        }
    }

    if let Some(memory) = &snapshot.memory {
        stats.memory_used_mb = memory.usage as f64 / BYTES_PER_MB;
        stats.memory_limit_mb = memory.limit as f64 / BYTES_PER_MB;
        if memory.limit > 0 {
            stats.memory_percent = memory.usage as f64 / memory.limit as f64 * 100.0;
        }
    }

    for interface in snapshot.networks.values() {
        stats.network_rx_mb += interface.rx_bytes as f64 / BYTES_PER_MB;
        stats.network_tx_mb += interface.tx_bytes as f64 / BYTES_PER_MB;
    }

    for entry in &snapshot.blkio {
        match entry.op.to_ascii_lowercase().as_str() {
            "read" => stats.disk_read_mb += entry.value as f64 / BYTES_PER_MB,
            "write" => stats.disk_write_mb += entry.value as f64 / BYTES_PER_MB,
            _ => {}
        }
    }

    stats
}
