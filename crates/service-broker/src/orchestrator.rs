//! Service instance lifecycle
//!
//! Every state changing operation runs under one process wide lock that also
//! owns the network pool, so the pool and the repository never see
//! interleaved updates from two requests. The lock is held across Director
//! calls, which makes a slow Director stall the whole broker. A single broker
//! process is assumed; replicas would each hand out the same networks.

use broker_common::{
    Error, LastOperation, OperationKind, PlanKind, Result, ServiceBinding, ServiceInstance,
    Task,
};
use fabric_director::{DirectorClient, DirectorDetails, Manifest};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::{
    BindRequest, BindingResponse, Credentials, DeprovisionOutcome, ProvisionRequest, PEER_PORT,
};
use crate::network_pool::NetworkPool;
use crate::storage::Repository;

fn db_read(err: anyhow::Error) -> Error {
    error!("Error in reading from DB: {:#}", err);
    Error::DbRead(format!("{:#}", err))
}

fn db_save(err: anyhow::Error) -> Error {
    error!("Error in saving to DB: {:#}", err);
    Error::DbSave(format!("{:#}", err))
}

fn db_delete(err: anyhow::Error) -> Error {
    error!("Error in deleting from DB: {:#}", err);
    Error::DbDelete(format!("{:#}", err))
}

pub struct Orchestrator {
    director: Arc<dyn DirectorClient>,
    repository: Arc<dyn Repository>,
    details: DirectorDetails,
    pool: Mutex<NetworkPool>,
}

impl Orchestrator {
    pub fn new(
        director: Arc<dyn DirectorClient>,
        repository: Arc<dyn Repository>,
        details: DirectorDetails,
    ) -> Self {
        let pool = NetworkPool::new(details.network_names.iter().cloned());
        Self {
            director,
            repository,
            details,
            pool: Mutex::new(pool),
        }
    }

    /// Rebuild the free network set from the repository and the Director
    ///
    /// A deployment the Director runs but no instance records keeps its
    /// network out of the pool until it is deleted on the Director.
    pub async fn refresh(&self) -> Result<()> {
        let mut pool = self.pool.lock().await;
        let instances = self.repository.list_instances().await.map_err(db_read)?;

        let recorded: HashSet<&str> = instances
            .iter()
            .map(|instance| instance.deployment_name.as_str())
            .collect();

        let mut unrecorded = HashMap::new();
        for deployment in self.director.list_deployments().await? {
            if recorded.contains(deployment.as_str()) {
                continue;
            }
            if let Some(network) = self.director.get_deployment_network(&deployment).await? {
                unrecorded.insert(deployment, network);
            }
        }

        pool.refresh(&instances, unrecorded);
        Ok(())
    }

    pub async fn available_networks(&self) -> usize {
        self.pool.lock().await.available_count()
    }

    /// Orphaned deployments and the networks they hold
    pub async fn orphaned_deployments(&self) -> Vec<(String, String)> {
        let pool = self.pool.lock().await;
        let mut orphans: Vec<(String, String)> = pool
            .orphaned()
            .iter()
            .map(|(deployment, network)| (deployment.clone(), network.clone()))
            .collect();
        orphans.sort();
        orphans
    }

    /// Provision an instance and return the task id deploying it
    pub async fn provision(
        &self,
        instance_id: &str,
        request: &ProvisionRequest,
        accepts_incomplete: bool,
    ) -> Result<String> {
        if !accepts_incomplete {
            return Err(Error::AsyncRequired);
        }

        let mut pool = self.pool.lock().await;

        let plan = PlanKind::resolve(&request.service_id, &request.plan_id).ok_or_else(|| {
            Error::InvalidServicePlan {
                service_id: request.service_id.clone(),
                plan_id: request.plan_id.clone(),
            }
        })?;

        if self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
            .is_some()
        {
            warn!("Service instance {} already exists", instance_id);
            return Err(Error::InstanceAlreadyExists(instance_id.to_string()));
        }

        let deployment_name = plan.deployment_name(instance_id);

        if plan.is_shared() {
            let existing = self
                .repository
                .find_instances_by_deployment(&deployment_name)
                .await
                .map_err(db_read)?;

            if !existing.is_empty() {
                let live = existing
                    .iter()
                    .find(|instance| !instance.is_deprovisioning())
                    .ok_or_else(|| Error::DeprovisionInFlight(deployment_name.clone()))?;

                let instance = ServiceInstance::new(
                    instance_id.to_string(),
                    deployment_name.clone(),
                    live.network_name.clone(),
                    live.provision_task_id.clone(),
                )
                .with_request(
                    &request.service_id,
                    &request.plan_id,
                    &request.organization_guid,
                    &request.space_guid,
                );
                self.repository
                    .save_instance(&instance)
                    .await
                    .map_err(db_save)?;

                info!(
                    "Service instance {} joined shared deployment {}",
                    instance_id, deployment_name
                );
                return Ok(instance.provision_task_id);
            }
        }

        if pool.is_orphaned(&deployment_name)
            || !self
                .repository
                .find_instances_by_deployment(&deployment_name)
                .await
                .map_err(db_read)?
                .is_empty()
        {
            warn!(
                "Deployment {} for service instance {} already exists",
                deployment_name, instance_id
            );
            return Err(Error::InstanceAlreadyExists(instance_id.to_string()));
        }

        let network_name = pool.acquire()?;

        let task = match self
            .start_deployment(&deployment_name, &network_name, plan.is_permissioned())
            .await
        {
            Ok(task) => task,
            Err(err) => {
                pool.release(&network_name);
                return Err(err);
            }
        };
        let task_id = task.task_id();

        let instance = ServiceInstance::new(
            instance_id.to_string(),
            deployment_name.clone(),
            network_name.clone(),
            task_id.clone(),
        )
        .with_request(
            &request.service_id,
            &request.plan_id,
            &request.organization_guid,
            &request.space_guid,
        );

        if let Err(err) = self.repository.save_instance(&instance).await {
            error!(
                "Deployment {} (task {}) was accepted but not recorded; network {} quarantined",
                deployment_name, task_id, network_name
            );
            pool.quarantine(&deployment_name, &network_name);
            return Err(db_save(err));
        }

        info!(
            "Provisioning {} on network {}. Task id is {}",
            deployment_name, network_name, task_id
        );
        Ok(task_id)
    }

    async fn start_deployment(
        &self,
        deployment_name: &str,
        network_name: &str,
        permissioned: bool,
    ) -> Result<Task> {
        let manifest = Manifest::render(deployment_name, network_name, permissioned, &self.details)?;
        self.director.create_deployment(&manifest).await
    }

    pub async fn deprovision(
        &self,
        instance_id: &str,
        accepts_incomplete: bool,
    ) -> Result<DeprovisionOutcome> {
        if !accepts_incomplete {
            return Err(Error::AsyncRequired);
        }

        let _pool = self.pool.lock().await;

        let mut instance = self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
            .ok_or_else(|| Error::InstanceGone(instance_id.to_string()))?;

        if let Some(task_id) = &instance.deprovision_task_id {
            debug!(
                "Service instance {} is already being deleted by task {}",
                instance_id, task_id
            );
            return Ok(DeprovisionOutcome::Deleting(task_id.clone()));
        }

        match self.director.get_task(&instance.provision_task_id).await {
            Ok(task) if task.state.is_in_flight() => {
                return Err(Error::ProvisionInFlight(instance_id.to_string()));
            }
            Ok(_) => {}
            Err(Error::TaskNotFound(task_id)) => {
                warn!("Provision task {} is unknown to the Director", task_id);
            }
            Err(err) => return Err(err),
        }

        let bindings = self
            .repository
            .list_bindings(instance_id)
            .await
            .map_err(db_read)?;
        if !bindings.is_empty() {
            return Err(Error::BindingsExist(instance_id.to_string()));
        }

        let sharing = self
            .repository
            .find_instances_by_deployment(&instance.deployment_name)
            .await
            .map_err(db_read)?
            .iter()
            .any(|other| other.id != instance.id);

        if sharing {
            self.repository
                .delete_instance(instance_id)
                .await
                .map_err(db_delete)?;
            info!(
                "Removed service instance {}; deployment {} is still in use",
                instance_id, instance.deployment_name
            );
            return Ok(DeprovisionOutcome::Removed);
        }

        let task = self
            .director
            .delete_deployment(&instance.deployment_name)
            .await?;
        let task_id = task.task_id();

        instance.mark_deprovisioning(task_id.clone());
        self.repository
            .save_instance(&instance)
            .await
            .map_err(db_save)?;

        info!(
            "Deleting deployment {}. Task id is {}",
            instance.deployment_name, task_id
        );
        Ok(DeprovisionOutcome::Deleting(task_id))
    }

    /// Report the state of a provision or deprovision task
    ///
    /// Only a finished deprovision takes the lock: the instance record goes
    /// away and its network returns to the pool.
    pub async fn last_operation(
        &self,
        instance_id: &str,
        operation: Option<&str>,
    ) -> Result<LastOperation> {
        let task_id = operation
            .filter(|op| !op.is_empty())
            .ok_or(Error::MissingOperation)?;

        let instance = self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
            .ok_or_else(|| Error::InstanceGone(instance_id.to_string()))?;

        let task = self.director.get_task(task_id).await?;

        let kind = if instance.deprovision_task_id.as_deref() == Some(task_id) {
            OperationKind::Deprovision
        } else {
            OperationKind::Provision
        };

        if kind == OperationKind::Deprovision && task.state.is_done() {
            self.complete_deprovision(instance_id).await?;
        }

        Ok(LastOperation::from_task_state(kind, &task.state))
    }

    async fn complete_deprovision(&self, instance_id: &str) -> Result<()> {
        let mut pool = self.pool.lock().await;

        let instance = match self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
        {
            Some(instance) => instance,
            None => return Ok(()),
        };

        self.repository
            .delete_instance(instance_id)
            .await
            .map_err(db_delete)?;

        let still_used = self
            .repository
            .list_instances()
            .await
            .map_err(db_read)?
            .iter()
            .any(|other| other.network_name == instance.network_name);

        if still_used {
            debug!(
                "Network {} is still used by other instances",
                instance.network_name
            );
        } else {
            pool.release(&instance.network_name);
        }

        info!(
            "Deployment {} deleted, service instance {} removed",
            instance.deployment_name, instance_id
        );
        Ok(())
    }

    pub async fn bind(
        &self,
        instance_id: &str,
        binding_id: &str,
        request: &BindRequest,
    ) -> Result<BindingResponse> {
        let _pool = self.pool.lock().await;

        if PlanKind::resolve(&request.service_id, &request.plan_id).is_none() {
            return Err(Error::InvalidServicePlan {
                service_id: request.service_id.clone(),
                plan_id: request.plan_id.clone(),
            });
        }

        if self
            .repository
            .find_binding(binding_id)
            .await
            .map_err(db_read)?
            .is_some()
        {
            return Err(Error::BindingAlreadyExists(binding_id.to_string()));
        }

        let instance = self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))?;

        if instance.is_deprovisioning() {
            return Err(Error::DeprovisionInFlight(instance_id.to_string()));
        }

        let task = self.director.get_task(&instance.provision_task_id).await?;
        if !task.state.is_done() {
            return Err(Error::ProvisionInFlight(instance_id.to_string()));
        }

        let vm_ips = self.director.get_vm_ips(&instance.deployment_name).await?;
        let peers = vm_ips
            .get("peer")
            .map(|ips| {
                ips.iter()
                    .map(|ip| format!("{}:{}", ip, PEER_PORT))
                    .collect()
            })
            .unwrap_or_default();

        let binding = ServiceBinding::new(binding_id.to_string(), instance_id.to_string());
        self.repository
            .save_binding(&binding)
            .await
            .map_err(db_save)?;

        info!("Bound {} to service instance {}", binding_id, instance_id);
        Ok(BindingResponse {
            credentials: Credentials { peers },
        })
    }

    pub async fn unbind(&self, instance_id: &str, binding_id: &str) -> Result<()> {
        let _pool = self.pool.lock().await;

        if self
            .repository
            .find_instance(instance_id)
            .await
            .map_err(db_read)?
            .is_none()
        {
            return Err(Error::InstanceNotFound(instance_id.to_string()));
        }

        let binding = self
            .repository
            .find_binding(binding_id)
            .await
            .map_err(db_read)?
            .filter(|binding| binding.service_instance_id == instance_id)
            .ok_or_else(|| Error::BindingGone(binding_id.to_string()))?;

        self.repository
            .delete_binding(&binding.id)
            .await
            .map_err(db_delete)?;

        info!("Unbound {} from service instance {}", binding_id, instance_id);
        Ok(())
    }
}
