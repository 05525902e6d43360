//! In-process repository, used when no Redis URL is configured

use anyhow::Result;
use async_trait::async_trait;
use broker_common::{ServiceBinding, ServiceInstance};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::Repository;

#[derive(Default)]
pub struct MemoryRepository {
    instances: RwLock<HashMap<String, ServiceInstance>>,
    bindings: RwLock<HashMap<String, ServiceBinding>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn save_instance(&self, instance: &ServiceInstance) -> Result<()> {
        instance.validate()?;
        self.instances
            .write()
            .await
            .insert(instance.id.clone(), instance.clone());
        debug!("Saved service instance {}", instance.id);
        Ok(())
    }

    async fn find_instance(&self, id: &str) -> Result<Option<ServiceInstance>> {
        Ok(self.instances.read().await.get(id).cloned())
    }

    async fn list_instances(&self) -> Result<Vec<ServiceInstance>> {
        Ok(self.instances.read().await.values().cloned().collect())
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        self.instances.write().await.remove(id);
        Ok(())
    }

    async fn save_binding(&self, binding: &ServiceBinding) -> Result<()> {
        binding.validate()?;
        self.bindings
            .write()
            .await
            .insert(binding.id.clone(), binding.clone());
        debug!("Saved service binding {}", binding.id);
        Ok(())
    }

    async fn find_binding(&self, id: &str) -> Result<Option<ServiceBinding>> {
        Ok(self.bindings.read().await.get(id).cloned())
    }

    async fn delete_binding(&self, id: &str) -> Result<()> {
        self.bindings.write().await.remove(id);
        Ok(())
    }

    async fn list_bindings(&self, instance_id: &str) -> Result<Vec<ServiceBinding>> {
        Ok(self
            .bindings
            .read()
            .await
            .values()
            .filter(|binding| binding.service_instance_id == instance_id)
            .cloned()
            .collect())
    }
}
