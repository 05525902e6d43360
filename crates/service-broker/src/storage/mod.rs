//! Persistence of service instances and bindings

pub mod memory;
pub mod redis;

use anyhow::Result;
use async_trait::async_trait;
use broker_common::{ServiceBinding, ServiceInstance};

pub use self::memory::MemoryRepository;
pub use self::redis::RedisRepository;

/// Storage backend for broker records
///
/// Each call is atomic on its own; nothing spans calls.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Insert or replace an instance
    async fn save_instance(&self, instance: &ServiceInstance) -> Result<()>;

    async fn find_instance(&self, id: &str) -> Result<Option<ServiceInstance>>;

    async fn list_instances(&self) -> Result<Vec<ServiceInstance>>;

    async fn delete_instance(&self, id: &str) -> Result<()>;

    /// Insert or replace a binding
    async fn save_binding(&self, binding: &ServiceBinding) -> Result<()>;

    async fn find_binding(&self, id: &str) -> Result<Option<ServiceBinding>>;

    async fn delete_binding(&self, id: &str) -> Result<()>;

    /// Bindings referencing the given instance
    async fn list_bindings(&self, instance_id: &str) -> Result<Vec<ServiceBinding>>;

    /// Instances backed by the given deployment
    async fn find_instances_by_deployment(
        &self,
        deployment_name: &str,
    ) -> Result<Vec<ServiceInstance>> {
        Ok(self
            .list_instances()
            .await?
            .into_iter()
            .filter(|instance| instance.deployment_name == deployment_name)
            .collect())
    }
}
