// ABOUTME: Warren compute service entrypoint
// ABOUTME: Wires config, fleet, locks, engines, and the manager; then serves the API

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use warren_config::ServiceConfig;
use warren_coordination::{CacheBackend, DistributedLock, MemoryBackend, RedisBackend};
use warren_engine::DockerEngineFactory;
use warren_fleet::Fleet;
use warren_proxy::ProxyContext;
use warren_workspaces::{
    FleetWorkspaceManager, HttpUsageReporter, MaintenanceLoop, NoopUsageReporter, UsageReporter,
    WorkspaceBackend, WorkspacesConfig,
};

#[derive(Parser)]
#[command(name = "warren")]
#[command(about = "Warren - workspace compute substrate")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the compute service
    Serve {
        /// Override the API port from configuration
        #[arg(long)]
        port: Option<u16>,
        /// Override the host inventory file
        #[arg(long)]
        hosts_file: Option<PathBuf>,
    },
    /// Validate a host inventory file and exit
    CheckHosts {
        /// Path to the JSON host inventory
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, hosts_file } => serve(port, hosts_file).await,
        Commands::CheckHosts { file } => check_hosts(file),
    }
}

fn check_hosts(file: PathBuf) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))?;
    let hosts = Fleet::parse_inventory(&raw).context("parsing host inventory")?;
    println!("{}: {} host(s) ok", file.display(), hosts.len());
    for host in hosts {
        println!(
            "  {} @ {}:{} ({} cores / {} MB / {} GB)",
            host.id,
            host.address,
            host.engine_port,
            host.total_cpu_cores,
            host.total_memory_mb,
            host.total_disk_gb
        );
    }
    Ok(())
}

async fn serve(port: Option<u16>, hosts_file: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = ServiceConfig::from_env();
    if let Some(port) = port {
        config.api_port = port;
    }
    if let Some(path) = hosts_file {
        config.hosts_file = Some(path.display().to_string());
    }

    info!(port = config.api_port, "Starting Warren compute service");

    // Fleet + host inventory
    let fleet = Fleet::new();
    if let Some(path) = &config.hosts_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading host inventory {}", path))?;
        let hosts = Fleet::parse_inventory(&raw).context("parsing host inventory")?;
        info!(hosts = hosts.len(), "Loaded host inventory");
        fleet.load_inventory(hosts).await;
    } else {
        warn!("No host inventory configured; fleet starts empty");
    }

    // Shared cache for distributed locks
    let cache: Arc<dyn CacheBackend> = match &config.redis_url {
        Some(url) => {
            let backend = RedisBackend::new(url).context("connecting Redis backend")?;
            info!("Using Redis lock backend");
            Arc::new(backend)
        }
        None => {
            warn!("No Redis configured; locks are process-local (single instance only)");
            Arc::new(MemoryBackend::new())
        }
    };
    let lock = DistributedLock::new(cache, config.lock_namespace.clone());

    // Billing collaborator
    let reporter: Arc<dyn UsageReporter> = match &config.platform_api_url {
        Some(url) => {
            info!(url = %url, "Reporting usage to platform API");
            Arc::new(HttpUsageReporter::new(
                url.clone(),
                config.platform_api_token.clone(),
            ))
        }
        None => {
            warn!("No platform API configured; usage events are dropped");
            Arc::new(NoopUsageReporter)
        }
    };

    // Lifecycle manager, injected once; no process-wide singletons
    let manager = Arc::new(FleetWorkspaceManager::new(
        fleet.clone(),
        Arc::new(DockerEngineFactory::new()),
        reporter,
        WorkspacesConfig {
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            exec_timeout: Duration::from_secs(config.exec_timeout_secs),
            proxy_timeout: Duration::from_secs(config.proxy_timeout_secs),
            container_stop_timeout_secs: 10,
            public_base_url: config.public_base_url.clone(),
            preserve_dir: std::env::temp_dir().join("warren-preserved"),
        },
    ));

    // Re-adopt containers that survived a restart before serving traffic
    match manager.discover_existing_workspaces().await {
        Ok(count) if count > 0 => info!(count, "Recovered existing workspaces"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Workspace discovery failed"),
    }

    let maintenance = MaintenanceLoop::new(
        manager.clone(),
        lock,
        Duration::from_secs(config.maintenance_interval_secs),
        Duration::from_secs(config.billing_tick_secs),
    );
    maintenance.start().await;

    let backend: Arc<dyn WorkspaceBackend> = manager.clone();
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = warren_api::workspaces_router(backend.clone())
        .merge(warren_proxy::router(ProxyContext {
            backend,
            default_app_port: config.default_app_port,
        }))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!(%addr, "Warren compute listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding API listener")?;
    axum::serve(listener, app).await.context("serving API")?;

    Ok(())
}
