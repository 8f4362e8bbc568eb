// ABOUTME: Configuration and environment variable management for Warren
// ABOUTME: Loads the typed service configuration consumed by the server binary

pub mod constants;
pub mod env;

use serde::{Deserialize, Serialize};

use crate::env::{optional_env, parse_env_or, parse_env_with_fallback};

/// Service-wide configuration, resolved once at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Port the HTTP/WebSocket API binds to.
    pub api_port: u16,
    /// Path to the JSON host inventory loaded into the fleet at startup.
    pub hosts_file: Option<String>,
    /// Redis connection URL for the shared cache / distributed locks.
    pub redis_url: Option<String>,
    /// Key namespace for distributed locks.
    pub lock_namespace: String,
    /// Seconds of inactivity after which a running workspace is evicted.
    pub idle_timeout_secs: u64,
    /// Billing tick interval in seconds.
    pub billing_tick_secs: u64,
    /// Background maintenance loop interval in seconds.
    pub maintenance_interval_secs: u64,
    /// Per-call timeout for exec operations inside workspaces.
    pub exec_timeout_secs: u64,
    /// Per-call timeout for proxied upstream requests.
    pub proxy_timeout_secs: u64,
    /// Default container port for the `/app` convenience proxy route.
    pub default_app_port: u16,
    /// Base URL advertised in preview URLs.
    pub public_base_url: String,
    /// Platform API service URL for usage/status reporting.
    pub platform_api_url: Option<String>,
    /// Bearer token for the platform API service.
    pub platform_api_token: Option<String>,
}

impl ServiceConfig {
    /// Resolve configuration from the process environment. `.env` files are
    /// honored when present; unset values fall back to defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let api_port = parse_env_with_fallback(
            constants::WARREN_API_PORT,
            constants::PORT,
            constants::DEFAULT_API_PORT,
        );

        Self {
            api_port,
            hosts_file: optional_env(constants::WARREN_HOSTS_FILE),
            redis_url: optional_env(constants::WARREN_REDIS_URL),
            lock_namespace: optional_env(constants::WARREN_LOCK_NAMESPACE)
                .unwrap_or_else(|| constants::DEFAULT_LOCK_NAMESPACE.to_string()),
            idle_timeout_secs: parse_env_or(
                constants::WARREN_IDLE_TIMEOUT_SECS,
                constants::DEFAULT_IDLE_TIMEOUT_SECS,
            ),
            billing_tick_secs: parse_env_or(
                constants::WARREN_BILLING_TICK_SECS,
                constants::DEFAULT_BILLING_TICK_SECS,
            ),
            maintenance_interval_secs: parse_env_or(
                constants::WARREN_MAINTENANCE_INTERVAL_SECS,
                constants::DEFAULT_MAINTENANCE_INTERVAL_SECS,
            ),
            exec_timeout_secs: parse_env_or(
                constants::WARREN_EXEC_TIMEOUT_SECS,
                constants::DEFAULT_EXEC_TIMEOUT_SECS,
            ),
            proxy_timeout_secs: parse_env_or(
                constants::WARREN_PROXY_TIMEOUT_SECS,
                constants::DEFAULT_PROXY_TIMEOUT_SECS,
            ),
            default_app_port: parse_env_or(
                constants::WARREN_DEFAULT_APP_PORT,
                constants::DEFAULT_APP_PORT,
            ),
            public_base_url: optional_env(constants::WARREN_PUBLIC_BASE_URL)
                .unwrap_or_else(|| format!("http://localhost:{}", api_port)),
            platform_api_url: optional_env(constants::WARREN_PLATFORM_API_URL),
            platform_api_token: optional_env(constants::WARREN_PLATFORM_API_TOKEN),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_port: constants::DEFAULT_API_PORT,
            hosts_file: None,
            redis_url: None,
            lock_namespace: constants::DEFAULT_LOCK_NAMESPACE.to_string(),
            idle_timeout_secs: constants::DEFAULT_IDLE_TIMEOUT_SECS,
            billing_tick_secs: constants::DEFAULT_BILLING_TICK_SECS,
            maintenance_interval_secs: constants::DEFAULT_MAINTENANCE_INTERVAL_SECS,
            exec_timeout_secs: constants::DEFAULT_EXEC_TIMEOUT_SECS,
            proxy_timeout_secs: constants::DEFAULT_PROXY_TIMEOUT_SECS,
            default_app_port: constants::DEFAULT_APP_PORT,
            public_base_url: format!("http://localhost:{}", constants::DEFAULT_API_PORT),
            platform_api_url: None,
            platform_api_token: None,
        }
    }
}
