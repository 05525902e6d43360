//! Redis storage for broker records

use anyhow::{Context, Result};
use async_trait::async_trait;
use broker_common::{ServiceBinding, ServiceInstance};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::Repository;

const INSTANCE_INDEX: &str = "instances:all";

fn instance_key(id: &str) -> String {
    format!("instance:{}", id)
}

fn binding_key(id: &str) -> String {
    format!("binding:{}", id)
}

fn instance_bindings_key(instance_id: &str) -> String {
    format!("instance_bindings:{}", instance_id)
}

/// Storage backend for service instances and bindings
pub struct RedisRepository {
    conn: ConnectionManager,
}

impl RedisRepository {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis");

        Ok(Self { conn })
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(key).await?;

        match json {
            Some(data) => {
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to deserialize {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Repository for RedisRepository {
    async fn save_instance(&self, instance: &ServiceInstance) -> Result<()> {
        instance.validate()?;
        let json = serde_json::to_string(instance).context("Failed to serialize instance")?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(instance_key(&instance.id), json)
            .ignore()
            .sadd(INSTANCE_INDEX, &instance.id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!("Saved service instance {}", instance.id);
        Ok(())
    }

    async fn find_instance(&self, id: &str) -> Result<Option<ServiceInstance>> {
        self.get_json(&instance_key(id)).await
    }

    async fn list_instances(&self) -> Result<Vec<ServiceInstance>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(INSTANCE_INDEX).await?;

        let mut instances = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(instance) = self.find_instance(&id).await? {
                instances.push(instance);
            }
        }
        Ok(instances)
    }

    async fn delete_instance(&self, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(instance_key(id))
            .ignore()
            .srem(INSTANCE_INDEX, id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!("Deleted service instance {}", id);
        Ok(())
    }

    async fn save_binding(&self, binding: &ServiceBinding) -> Result<()> {
        binding.validate()?;
        let json = serde_json::to_string(binding).context("Failed to serialize binding")?;

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .set(binding_key(&binding.id), json)
            .ignore()
            .sadd(instance_bindings_key(&binding.service_instance_id), &binding.id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!("Saved service binding {}", binding.id);
        Ok(())
    }

    async fn find_binding(&self, id: &str) -> Result<Option<ServiceBinding>> {
        self.get_json(&binding_key(id)).await
    }

    async fn delete_binding(&self, id: &str) -> Result<()> {
        let binding = match self.find_binding(id).await? {
            Some(binding) => binding,
            None => return Ok(()),
        };

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .del(binding_key(id))
            .ignore()
            .srem(instance_bindings_key(&binding.service_instance_id), id)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        info!("Deleted service binding {}", id);
        Ok(())
    }

    async fn list_bindings(&self, instance_id: &str) -> Result<Vec<ServiceBinding>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(instance_bindings_key(instance_id)).await?;

        let mut bindings = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(binding) = self.find_binding(&id).await? {
                bindings.push(binding);
            }
        }
        Ok(bindings)
    }
}
