//! In-process Director for development and testing
//!
//! Simulates deployments and tasks without a real Director. Every create or
//! delete mints a new task in the `queued` state; tests (or the mock mode of
//! the broker binary) move tasks forward with [`MockDirector::set_task_state`]
//! or [`MockDirector::complete_all`].

use async_trait::async_trait;
use broker_common::{Error, Result, Task, TaskState};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use tracing::debug;

use crate::manifest::Manifest;
use crate::{DirectorClient, VmIps};

#[derive(Default)]
struct MockState {
    next_task_id: u64,
    tasks: BTreeMap<u64, Task>,
    deployments: HashSet<String>,
    /// Network the create call for each deployment was rendered against
    networks: HashMap<String, String>,
    vm_ips: HashMap<String, VmIps>,
    created: usize,
    deleted: usize,
    fail_create: bool,
    complete_immediately: bool,
}

/// Mock Director client
pub struct MockDirector {
    state: Mutex<MockState>,
}

impl Default for MockDirector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDirector {
    /// Create a mock whose tasks stay queued until moved on
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_task_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Create a mock whose tasks finish as soon as they are created
    pub fn completing() -> Self {
        let mock = Self::new();
        mock.lock().complete_immediately = true;
        mock
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A panicking test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mint_task(state: &mut MockState, description: String) -> Task {
        let id = state.next_task_id;
        state.next_task_id += 1;

        let task_state = if state.complete_immediately {
            TaskState::Done
        } else {
            TaskState::Queued
        };
        let task = Task {
            id,
            state: task_state,
            description,
            result: None,
            user: "admin".to_string(),
        };
        state.tasks.insert(id, task.clone());
        task
    }

    /// Move a task to the given state
    pub fn set_task_state(&self, task_id: &str, task_state: TaskState) {
        if let Ok(id) = task_id.parse::<u64>() {
            if let Some(task) = self.lock().tasks.get_mut(&id) {
                debug!("Mock director: task {} -> {}", id, task_state);
                task.state = task_state;
            }
        }
    }

    /// Mark every known task as done
    pub fn complete_all(&self) {
        for task in self.lock().tasks.values_mut() {
            task.state = TaskState::Done;
        }
    }

    /// VM listing returned for a deployment
    pub fn set_vm_ips(&self, deployment_name: &str, vm_ips: VmIps) {
        self.lock()
            .vm_ips
            .insert(deployment_name.to_string(), vm_ips);
    }

    /// Make subsequent create calls fail as if the Director were unreachable
    pub fn fail_creates(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn create_calls(&self) -> usize {
        self.lock().created
    }

    pub fn delete_calls(&self) -> usize {
        self.lock().deleted
    }

    pub fn has_deployment(&self, deployment_name: &str) -> bool {
        self.lock().deployments.contains(deployment_name)
    }

    /// Network the named deployment was created on
    pub fn deployment_network(&self, deployment_name: &str) -> Option<String> {
        self.lock().networks.get(deployment_name).cloned()
    }

    /// Drop a deployment without a task, as an operator deleting it by hand
    pub fn remove_deployment(&self, deployment_name: &str) {
        let mut state = self.lock();
        state.deployments.remove(deployment_name);
        state.networks.remove(deployment_name);
    }
}

#[async_trait]
impl DirectorClient for MockDirector {
    async fn create_deployment(&self, manifest: &Manifest) -> Result<Task> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(Error::BoshConnect("mock director unavailable".to_string()));
        }

        state.created += 1;
        state.deployments.insert(manifest.name.clone());
        if let Some(network) = manifest.network_name() {
            state
                .networks
                .insert(manifest.name.clone(), network.to_string());
        }

        let task = Self::mint_task(&mut state, format!("create deployment {}", manifest.name));
        debug!("Mock director: create {} -> task {}", manifest.name, task.id);
        Ok(task)
    }

    async fn delete_deployment(&self, deployment_name: &str) -> Result<Task> {
        let mut state = self.lock();
        state.deleted += 1;
        state.deployments.remove(deployment_name);
        state.networks.remove(deployment_name);

        let task = Self::mint_task(&mut state, format!("delete deployment {}", deployment_name));
        debug!("Mock director: delete {} -> task {}", deployment_name, task.id);
        Ok(task)
    }

    async fn get_task(&self, task_id: &str) -> Result<Task> {
        let state = self.lock();
        task_id
            .parse::<u64>()
            .ok()
            .and_then(|id| state.tasks.get(&id).cloned())
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))
    }

    async fn get_vm_ips(&self, deployment_name: &str) -> Result<VmIps> {
        let state = self.lock();
        if let Some(vm_ips) = state.vm_ips.get(deployment_name) {
            return Ok(vm_ips.clone());
        }

        // Default listing for deployments created through the mock
        if state.deployments.contains(deployment_name) {
            let peers = (1..=4).map(|i| format!("10.244.0.{}", i + 1)).collect();
            return Ok(VmIps::from([("peer".to_string(), peers)]));
        }

        Ok(VmIps::new())
    }

    async fn list_deployments(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.lock().deployments.iter().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_deployment_network(&self, deployment_name: &str) -> Result<Option<String>> {
        Ok(self.lock().networks.get(deployment_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::details::DirectorDetails;

    fn manifest(name: &str) -> Manifest {
        let details = DirectorDetails {
            url: "http://127.0.0.1:25555".to_string(),
            stemcell_name: "stemcell".to_string(),
            director_uuid: "uuid".to_string(),
            vm_type: "small".to_string(),
            network_names: vec!["net1".to_string()],
            peer_data_dir: "/peer".to_string(),
            docker_data_dir: "/docker".to_string(),
            skip_tls_verification: true,
        };
        Manifest::render(name, "net1", false, &details).unwrap()
    }

    #[tokio::test]
    async fn test_tasks_move_through_states() {
        let director = MockDirector::new();

        let task = director.create_deployment(&manifest("fabric-a")).await.unwrap();
        assert_eq!(task.state, TaskState::Queued);
        assert_eq!(director.create_calls(), 1);
        assert_eq!(director.deployment_network("fabric-a").as_deref(), Some("net1"));

        director.set_task_state(&task.task_id(), TaskState::Done);
        let task = director.get_task(&task.task_id()).await.unwrap();
        assert!(task.state.is_done());
    }

    #[tokio::test]
    async fn test_task_ids_increase() {
        let director = MockDirector::new();
        let first = director.create_deployment(&manifest("fabric-a")).await.unwrap();
        let second = director.delete_deployment("fabric-a").await.unwrap();

        assert!(second.id > first.id);
        assert!(!director.has_deployment("fabric-a"));
        assert_eq!(director.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_lists_deployments_until_removed() {
        let director = MockDirector::new();
        director.create_deployment(&manifest("fabric-b")).await.unwrap();
        director.create_deployment(&manifest("fabric-a")).await.unwrap();

        assert_eq!(
            director.list_deployments().await.unwrap(),
            vec!["fabric-a", "fabric-b"]
        );
        assert_eq!(
            director.get_deployment_network("fabric-a").await.unwrap().as_deref(),
            Some("net1")
        );

        director.remove_deployment("fabric-a");
        assert_eq!(director.list_deployments().await.unwrap(), vec!["fabric-b"]);
        assert!(director.get_deployment_network("fabric-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let director = MockDirector::new();
        let err = director.get_task("999").await.unwrap_err();
        assert!(matches!(err, Error::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_default_vm_listing() {
        let director = MockDirector::completing();
        let task = director.create_deployment(&manifest("fabric-b")).await.unwrap();
        assert!(task.state.is_done());

        let ips = director.get_vm_ips("fabric-b").await.unwrap();
        assert_eq!(ips["peer"].len(), 4);
    }
}
