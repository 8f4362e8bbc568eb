// ABOUTME: Workspace lifecycle orchestration for Warren
// ABOUTME: Manager contract, fleet-backed implementation, tiers, billing, and maintenance

pub mod billing;
pub mod error;
pub mod fleet_manager;
pub mod manager;
pub mod ports;
pub mod tasks;
pub mod tier;
pub mod types;

pub use billing::{BillingError, HttpUsageReporter, NoopUsageReporter, UsageReporter};
pub use error::{Result, WorkspaceError};
pub use fleet_manager::{FleetWorkspaceManager, WorkspacesConfig, MANAGED_LABEL};
pub use manager::WorkspaceBackend;
pub use tasks::MaintenanceLoop;
pub use tier::{Tier, TierResources};
pub use types::{
    CreateWorkspaceRequest, ProxyRequest, ProxyResponse, Workspace, WorkspaceStatus,
};
