// ABOUTME: Environment variable name constants and defaults
// ABOUTME: Centralized definitions of all environment variable names used across Warren

// Port Configuration
pub const WARREN_API_PORT: &str = "WARREN_API_PORT";
pub const PORT: &str = "PORT"; // Legacy

// Fleet Configuration
pub const WARREN_HOSTS_FILE: &str = "WARREN_HOSTS_FILE";
pub const WARREN_DEFAULT_APP_PORT: &str = "WARREN_DEFAULT_APP_PORT";

// Coordination / Shared Cache
pub const WARREN_REDIS_URL: &str = "WARREN_REDIS_URL";
pub const WARREN_LOCK_NAMESPACE: &str = "WARREN_LOCK_NAMESPACE";

// Lifecycle Configuration
pub const WARREN_IDLE_TIMEOUT_SECS: &str = "WARREN_IDLE_TIMEOUT_SECS";
pub const WARREN_BILLING_TICK_SECS: &str = "WARREN_BILLING_TICK_SECS";
pub const WARREN_MAINTENANCE_INTERVAL_SECS: &str = "WARREN_MAINTENANCE_INTERVAL_SECS";
pub const WARREN_EXEC_TIMEOUT_SECS: &str = "WARREN_EXEC_TIMEOUT_SECS";
pub const WARREN_PROXY_TIMEOUT_SECS: &str = "WARREN_PROXY_TIMEOUT_SECS";

// Billing / API Service Collaborator
pub const WARREN_PLATFORM_API_URL: &str = "WARREN_PLATFORM_API_URL";
pub const WARREN_PLATFORM_API_TOKEN: &str = "WARREN_PLATFORM_API_TOKEN";

// Preview URL Configuration
pub const WARREN_PUBLIC_BASE_URL: &str = "WARREN_PUBLIC_BASE_URL";

// Default values
pub const DEFAULT_API_PORT: u16 = 4820;
pub const DEFAULT_APP_PORT: u16 = 3000;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_BILLING_TICK_SECS: u64 = 60;
pub const DEFAULT_MAINTENANCE_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PROXY_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOCK_NAMESPACE: &str = "warren:lock";

/// Heartbeat freshness window for host health, in seconds. A host with no
/// heartbeat inside this window is never scheduled onto.
pub const HOST_HEARTBEAT_FRESHNESS_SECS: i64 = 120;

/// TTL for the background-maintenance distributed locks. Must stay comfortably
/// above the worst-case duration of a single maintenance cycle.
pub const MAINTENANCE_LOCK_TTL_SECS: u64 = 120;
