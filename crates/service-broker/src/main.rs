//! Fabric Service Broker
//!
//! REST API provisioning Hyperledger fabric block chains on a Director

use anyhow::{Context, Result};
use fabric_director::{DirectorClient, HttpDirectorClient, MockDirector, RetryPolicy};
use fabric_service_broker::{
    create_router, AppState, Config, MemoryRepository, Orchestrator, RedisRepository, Repository,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "fabric_service_broker=debug,fabric_director=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration
    let config = Config::from_env().context("Failed to load configuration")?;

    info!("Starting Fabric Service Broker");
    info!("Networks: {:?}", config.director.network_names);

    let repository: Arc<dyn Repository> = match &config.redis_url {
        Some(redis_url) => Arc::new(
            RedisRepository::new(redis_url)
                .await
                .context("Failed to initialize storage")?,
        ),
        None => {
            warn!("REDIS_URL not set, service instances are kept in memory only");
            Arc::new(MemoryRepository::new())
        }
    };

    let director: Arc<dyn DirectorClient> = if config.mock_mode {
        info!("Mock mode enabled, deployments are simulated");
        Arc::new(MockDirector::completing())
    } else {
        Arc::new(
            HttpDirectorClient::new(&config.director, RetryPolicy::default())
                .context("Failed to create Director client")?,
        )
    };

    let orchestrator = Orchestrator::new(director, repository, config.director.clone());
    orchestrator
        .refresh()
        .await
        .context("Failed to load service instances")?;
    for (deployment, network) in orchestrator.orphaned_deployments().await {
        warn!(
            "Network {} stays reserved until deployment {} is deleted on the Director",
            network, deployment
        );
    }

    // Create router
    let app = create_router(AppState { orchestrator });

    // Bind and serve
    let addr = config.api_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    info!("Fabric Service Broker running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
