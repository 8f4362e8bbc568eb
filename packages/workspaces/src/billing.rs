// ABOUTME: Usage/status reporting to the platform API service
// ABOUTME: Fire-and-forget collaborator calls; failures are logged, never fatal

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::tier::Tier;
use crate::types::WorkspaceStatus;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Platform API request failed: {0}")]
    Request(String),

    #[error("Platform API rejected the report: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, BillingError>;

/// Outbound collaborator interface for billing and status sync. The
/// orchestration loop treats both calls as fire-and-forget: a failed emit is
/// logged and retried on the next tick.
#[async_trait]
pub trait UsageReporter: Send + Sync {
    /// Report `seconds` of billable runtime for a workspace.
    async fn record_usage(&self, workspace_id: &str, seconds: u64, tier: Tier) -> Result<()>;

    /// Push the workspace's current status to the API service.
    async fn sync_status(
        &self,
        workspace_id: &str,
        status: WorkspaceStatus,
        container_id: Option<&str>,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct UsageEvent<'a> {
    workspace_id: &'a str,
    seconds: u64,
    tier: &'a str,
}

#[derive(Serialize)]
struct StatusSync<'a> {
    status: &'a str,
    container_id: Option<&'a str>,
}

/// HTTP reporter against the platform API service.
pub struct HttpUsageReporter {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpUsageReporter {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| BillingError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BillingError::Api(format!(
                "status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageReporter for HttpUsageReporter {
    async fn record_usage(&self, workspace_id: &str, seconds: u64, tier: Tier) -> Result<()> {
        let url = format!("{}/internal/usage", self.base_url);
        let event = UsageEvent {
            workspace_id,
            seconds,
            tier: tier.as_str(),
        };
        self.send(self.request(url).json(&event)).await?;
        debug!(workspace = %workspace_id, seconds, "Reported usage");
        Ok(())
    }

    async fn sync_status(
        &self,
        workspace_id: &str,
        status: WorkspaceStatus,
        container_id: Option<&str>,
    ) -> Result<()> {
        let url = format!(
            "{}/internal/workspaces/{}/status",
            self.base_url, workspace_id
        );
        let sync = StatusSync {
            status: status.as_str(),
            container_id,
        };
        self.send(self.request(url).json(&sync)).await?;
        debug!(workspace = %workspace_id, status = status.as_str(), "Synced status");
        Ok(())
    }
}

/// Reporter that drops everything. Used in development and tests where no
/// platform API is reachable.
#[derive(Default)]
pub struct NoopUsageReporter;

#[async_trait]
impl UsageReporter for NoopUsageReporter {
    async fn record_usage(&self, workspace_id: &str, seconds: u64, _tier: Tier) -> Result<()> {
        debug!(workspace = %workspace_id, seconds, "Usage event dropped (noop reporter)");
        Ok(())
    }

    async fn sync_status(
        &self,
        _workspace_id: &str,
        _status: WorkspaceStatus,
        _container_id: Option<&str>,
    ) -> Result<()> {
        Ok(())
    }
}
