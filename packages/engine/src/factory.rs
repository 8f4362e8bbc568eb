// ABOUTME: Per-host engine connection factory with caching
// ABOUTME: Lifecycle code asks for the driver of a host, not a concrete client

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use warren_fleet::Host;

use crate::docker::DockerEngine;
use crate::error::Result;
use crate::ContainerEngine;

/// Resolves the container-engine driver for a host. Injected into the
/// lifecycle manager so tests can substitute fake engines per host.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn engine_for(&self, host: &Host) -> Result<Arc<dyn ContainerEngine>>;
}

/// Docker factory keeping one connection per host.
#[derive(Default)]
pub struct DockerEngineFactory {
    engines: RwLock<HashMap<String, Arc<dyn ContainerEngine>>>,
}

impl DockerEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngineFactory for DockerEngineFactory {
    async fn engine_for(&self, host: &Host) -> Result<Arc<dyn ContainerEngine>> {
        {
            let engines = self.engines.read().await;
            if let Some(engine) = engines.get(&host.id) {
                return Ok(engine.clone());
            }
        }

        debug!(host = %host.id, address = %host.address, "Connecting engine driver");
        let engine: Arc<dyn ContainerEngine> =
            Arc::new(DockerEngine::remote(&host.address, host.engine_port)?);

        let mut engines = self.engines.write().await;
        // A racing connect may have beaten us; keep the first one
        let entry = engines.entry(host.id.clone()).or_insert(engine);
        Ok(entry.clone())
    }
}
