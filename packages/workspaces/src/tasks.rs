// ABOUTME: Background maintenance loop for heartbeats, idle eviction, and billing ticks
// ABOUTME: Every task is guarded by a distributed lock so scaled-out instances run it once

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time;
use tracing::{error, info, warn};

use warren_config::constants::MAINTENANCE_LOCK_TTL_SECS;
use warren_coordination::DistributedLock;

use crate::billing::UsageReporter;
use crate::fleet_manager::FleetWorkspaceManager;
use crate::manager::WorkspaceBackend;
use crate::types::WorkspaceStatus;

const TASK_HOST_HEARTBEAT: &str = "host-heartbeat";
const TASK_IDLE_CLEANUP: &str = "idle-cleanup";
const TASK_USAGE_TRACKING: &str = "usage-tracking";

/// Periodic background loop over the whole fleet. Each cycle runs heartbeat
/// ingest, idle cleanup, and usage tracking, each under its own distributed
/// lock; a cycle where another instance holds a lock simply skips that task.
pub struct MaintenanceLoop {
    manager: Arc<FleetWorkspaceManager>,
    reporter: Arc<dyn UsageReporter>,
    lock: DistributedLock,
    interval: Duration,
    billing_tick: Duration,
    running: Arc<RwLock<bool>>,
}

impl MaintenanceLoop {
    pub fn new(
        manager: Arc<FleetWorkspaceManager>,
        lock: DistributedLock,
        interval: Duration,
        billing_tick: Duration,
    ) -> Self {
        let reporter = manager.reporter();
        Self {
            manager,
            reporter,
            lock,
            interval,
            billing_tick,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the loop. Idempotent; a second start is a no-op.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                return;
            }
            *running = true;
        }

        let manager = self.manager.clone();
        let reporter = self.reporter.clone();
        let lock = self.lock.clone();
        let interval = self.interval;
        let billing_tick = self.billing_tick;
        let running_flag = self.running.clone();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Maintenance loop started");
            let now = tokio::time::Instant::now();
            // Bill immediately on the first cycle
            let mut last_billing_tick = now.checked_sub(billing_tick).unwrap_or(now);

            loop {
                if !*running_flag.read().await {
                    info!("Maintenance loop stopped");
                    break;
                }

                Self::run_cycle(
                    &manager,
                    &reporter,
                    &lock,
                    billing_tick,
                    &mut last_billing_tick,
                )
                .await;

                time::sleep(interval).await;
            }
        });
    }

    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
    }

    async fn run_cycle(
        manager: &Arc<FleetWorkspaceManager>,
        reporter: &Arc<dyn UsageReporter>,
        lock: &DistributedLock,
        billing_tick: Duration,
        last_billing_tick: &mut tokio::time::Instant,
    ) {
        // Heartbeat ingest has no side effects beyond the shared registry;
        // still deduplicated to keep engine ping load constant under scaling.
        if lock
            .try_acquire(TASK_HOST_HEARTBEAT, MAINTENANCE_LOCK_TTL_SECS, true)
            .await
        {
            manager.ingest_host_heartbeats().await;
            lock.release(TASK_HOST_HEARTBEAT).await;
        }

        // Idle eviction stops containers: strictly fail-closed.
        if lock
            .try_acquire(TASK_IDLE_CLEANUP, MAINTENANCE_LOCK_TTL_SECS, true)
            .await
        {
            match manager.cleanup_idle_workspaces().await {
                Ok(evicted) => {
                    for workspace_id in evicted {
                        if let Err(e) = reporter
                            .sync_status(&workspace_id, WorkspaceStatus::Stopped, None)
                            .await
                        {
                            warn!(workspace = %workspace_id, error = %e, "Eviction status sync failed");
                        }
                    }
                }
                Err(e) => error!(error = %e, "Idle cleanup cycle failed"),
            }
            lock.release(TASK_IDLE_CLEANUP).await;
        }

        // Billing tick runs on its own cadence. The emit is idempotent per
        // interval on the receiving side, so the lock fails open: a missed
        // lock backend must not silently stop billing.
        if last_billing_tick.elapsed() >= billing_tick {
            if lock
                .try_acquire(TASK_USAGE_TRACKING, MAINTENANCE_LOCK_TTL_SECS, false)
                .await
            {
                if let Err(e) = manager.track_usage().await {
                    error!(error = %e, "Usage tracking cycle failed");
                }
                lock.release(TASK_USAGE_TRACKING).await;
            }
            *last_billing_tick = tokio::time::Instant::now();
        }
    }
}
