// ABOUTME: Workspace tiers and the resource quotas they map to

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use warren_fleet::ResourceFootprint;

/// Declared workspace tier. Each tier maps to a fixed CPU/memory/disk quota
/// and a default container image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Starter,
    Standard,
    Performance,
}

/// Resource quota granted to one workspace of a tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierResources {
    pub cpu_cores: f64,
    pub memory_mb: u64,
    pub disk_gb: u64,
    /// Persistent storage quota, reported to billing but not enforced here.
    pub storage_gb: u64,
}

impl Tier {
    pub fn resources(&self) -> TierResources {
        match self {
            Tier::Starter => TierResources {
                cpu_cores: 1.0,
                memory_mb: 2048,
                disk_gb: 10,
                storage_gb: 5,
            },
            Tier::Standard => TierResources {
                cpu_cores: 2.0,
                memory_mb: 4096,
                disk_gb: 20,
                storage_gb: 10,
            },
            Tier::Performance => TierResources {
                cpu_cores: 4.0,
                memory_mb: 8192,
                disk_gb: 40,
                storage_gb: 25,
            },
        }
    }

    pub fn footprint(&self) -> ResourceFootprint {
        let resources = self.resources();
        ResourceFootprint {
            cpu_cores: resources.cpu_cores,
            memory_mb: resources.memory_mb,
            disk_gb: resources.disk_gb,
        }
    }

    pub fn image(&self) -> &'static str {
        "warren/workspace:latest"
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Starter => "starter",
            Tier::Standard => "standard",
            Tier::Performance => "performance",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "starter" => Ok(Tier::Starter),
            "standard" => Ok(Tier::Standard),
            "performance" => Ok(Tier::Performance),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}
