//! Records persisted by the broker

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant's service instance and the deployment backing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Tenant supplied instance id
    pub id: String,

    /// Director deployment backing this instance (may be shared)
    pub deployment_name: String,

    /// Network assigned from the pool
    pub network_name: String,

    /// Blockchain network id, currently the instance id
    pub blockchain_network_id: String,

    pub service_id: String,
    pub plan_id: String,
    pub organization_guid: String,
    pub space_guid: String,

    /// Director task that created the deployment
    pub provision_task_id: String,

    /// Director task deleting the deployment, once one was started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprovision_task_id: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceInstance {
    /// Create a new instance record
    pub fn new(
        id: String,
        deployment_name: String,
        network_name: String,
        provision_task_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            blockchain_network_id: id.clone(),
            id,
            deployment_name,
            network_name,
            service_id: String::new(),
            plan_id: String::new(),
            organization_guid: String::new(),
            space_guid: String::new(),
            provision_task_id,
            deprovision_task_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record which service, plan, org and space requested the instance
    pub fn with_request(
        mut self,
        service_id: &str,
        plan_id: &str,
        organization_guid: &str,
        space_guid: &str,
    ) -> Self {
        self.service_id = service_id.to_string();
        self.plan_id = plan_id.to_string();
        self.organization_guid = organization_guid.to_string();
        self.space_guid = space_guid.to_string();
        self
    }

    /// Mark the deployment delete as started
    pub fn mark_deprovisioning(&mut self, task_id: String) {
        self.deprovision_task_id = Some(task_id);
        self.updated_at = Utc::now();
    }

    pub fn is_deprovisioning(&self) -> bool {
        self.deprovision_task_id.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            bail!("Id cannot be empty");
        }
        if self.deployment_name.is_empty() {
            bail!("DeploymentName cannot be empty");
        }
        if self.network_name.is_empty() {
            bail!("NetworkName cannot be empty");
        }
        if self.blockchain_network_id.is_empty() {
            bail!("BlockchainNetworkId cannot be empty");
        }
        Ok(())
    }
}

/// A binding of an application to a service instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    pub id: String,
    pub service_instance_id: String,
    pub created_at: DateTime<Utc>,
}

impl ServiceBinding {
    pub fn new(id: String, service_instance_id: String) -> Self {
        Self {
            id,
            service_instance_id,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_instance_id.is_empty() {
            bail!("ServiceInstanceId cannot be empty");
        }
        if self.id.is_empty() {
            bail!("Id cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_validate() {
        let instance = ServiceInstance::new(
            "instance-1".to_string(),
            "fabric-instance-1".to_string(),
            "net1".to_string(),
            "17".to_string(),
        );
        assert!(instance.validate().is_ok());
        assert_eq!(instance.blockchain_network_id, "instance-1");
        assert!(!instance.is_deprovisioning());
    }

    #[test]
    fn test_instance_without_network_is_invalid() {
        let instance = ServiceInstance::new(
            "instance-1".to_string(),
            "fabric-instance-1".to_string(),
            String::new(),
            "17".to_string(),
        );
        let err = instance.validate().unwrap_err();
        assert!(err.to_string().contains("NetworkName"));
    }

    #[test]
    fn test_binding_validate() {
        let binding = ServiceBinding::new("binding-1".to_string(), String::new());
        assert!(binding.validate().is_err());

        let binding = ServiceBinding::new("binding-1".to_string(), "instance-1".to_string());
        assert!(binding.validate().is_ok());
    }

    #[test]
    fn test_mark_deprovisioning() {
        let mut instance = ServiceInstance::new(
            "instance-1".to_string(),
            "fabric-instance-1".to_string(),
            "net1".to_string(),
            "17".to_string(),
        );
        instance.mark_deprovisioning("18".to_string());
        assert_eq!(instance.deprovision_task_id.as_deref(), Some("18"));
        assert!(instance.is_deprovisioning());
    }
}
