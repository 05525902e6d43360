//! Director deployment client
//!
//! Talks to the BOSH Director that runs the blockchain deployments: renders
//! deployment manifests, starts and deletes deployments, follows Director
//! tasks and lists the VMs of a deployment.

pub mod client;
pub mod details;
pub mod manifest;
pub mod mock;
pub mod retry;

use async_trait::async_trait;
use broker_common::{Result, Task};
use std::collections::BTreeMap;

pub use client::HttpDirectorClient;
pub use details::DirectorDetails;
pub use manifest::Manifest;
pub use mock::MockDirector;
pub use retry::RetryPolicy;

/// First IP of every VM in a deployment, keyed by job name
pub type VmIps = BTreeMap<String, Vec<String>>;

/// Operations the broker needs from a Director
#[async_trait]
pub trait DirectorClient: Send + Sync {
    /// Start a deployment and return the task creating it
    async fn create_deployment(&self, manifest: &Manifest) -> Result<Task>;

    /// Start deleting a deployment and return the task deleting it
    async fn delete_deployment(&self, deployment_name: &str) -> Result<Task>;

    /// Current state of a task
    async fn get_task(&self, task_id: &str) -> Result<Task>;

    /// List VM addresses of a deployment
    async fn get_vm_ips(&self, deployment_name: &str) -> Result<VmIps>;

    /// Names of every deployment the Director knows
    async fn list_deployments(&self) -> Result<Vec<String>>;

    /// Network the first job of a deployment is placed on, `None` when the
    /// deployment does not exist
    async fn get_deployment_network(&self, deployment_name: &str) -> Result<Option<String>>;
}
