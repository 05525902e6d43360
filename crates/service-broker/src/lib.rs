//! Fabric Service Broker
//!
//! Open Service Broker API for on-demand Hyperledger fabric block chains.
//! Each service instance is backed by a Director deployment; dedicated plans
//! get a deployment and a network of their own, shared plans join one
//! long-lived deployment per plan.

pub mod config;
pub mod handlers;
pub mod models;
pub mod network_pool;
pub mod orchestrator;
pub mod storage;

use axum::{
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use handlers::AppState;
pub use network_pool::NetworkPool;
pub use orchestrator::Orchestrator;
pub use storage::{MemoryRepository, RedisRepository, Repository};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/v2/catalog", get(handlers::catalog_handler))
        .route(
            "/v2/service_instances/{instance_id}",
            put(handlers::provision_handler).delete(handlers::deprovision_handler),
        )
        .route(
            "/v2/service_instances/{instance_id}/last_operation",
            get(handlers::last_operation_handler),
        )
        .route(
            "/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
            put(handlers::bind_handler).delete(handlers::unbind_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
