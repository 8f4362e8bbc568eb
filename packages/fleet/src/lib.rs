// ABOUTME: Fleet capacity tracking and workspace placement for Warren
// ABOUTME: Host records, usage accounting, stats normalization, and the scheduler

pub mod error;
pub mod fleet;
pub mod host;
pub mod scheduler;
pub mod stats;

pub use error::{FleetError, Result};
pub use fleet::{Fleet, ResourceFootprint};
pub use host::{GpuInfo, Host, HostStatus};
pub use scheduler::{PlacementConstraints, PlacementRequest, Scheduler};
pub use stats::{normalize, ContainerStats, RawStatsSnapshot};
