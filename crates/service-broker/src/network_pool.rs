//! Allocation of Director networks to dedicated deployments
//!
//! Every dedicated deployment gets a network of its own. The pool is plain
//! in-memory state; callers hold the orchestrator lock while they change it
//! together with the repository.

use broker_common::{Error, Result, ServiceInstance};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct NetworkPool {
    configured: HashSet<String>,
    available: HashSet<String>,
    /// Networks held by Director deployments that no service instance
    /// records, keyed by deployment name
    orphaned: HashMap<String, String>,
}

impl NetworkPool {
    /// Pool where every configured network is free
    pub fn new<I>(network_names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let configured: HashSet<String> = network_names.into_iter().collect();
        Self {
            available: configured.clone(),
            configured,
            orphaned: HashMap::new(),
        }
    }

    /// Recompute the free networks from the persisted instances and the
    /// unrecorded deployments found on the Director
    ///
    /// `unrecorded` replaces the orphans known so far: an orphan missing from
    /// it has been removed from the Director and its network is free again.
    pub fn refresh(&mut self, instances: &[ServiceInstance], unrecorded: HashMap<String, String>) {
        for (deployment, network) in &unrecorded {
            if !self.orphaned.contains_key(deployment) {
                warn!(
                    "Deployment {} holds network {} but no service instance records it",
                    deployment, network
                );
            }
        }
        for deployment in self.orphaned.keys() {
            if !unrecorded.contains_key(deployment) {
                info!("Orphaned deployment {} is gone from the Director", deployment);
            }
        }
        self.orphaned = unrecorded
            .into_iter()
            .filter(|(_, network)| self.configured.contains(network))
            .collect();

        let in_use: HashSet<&str> = instances
            .iter()
            .map(|instance| instance.network_name.as_str())
            .chain(self.orphaned.values().map(String::as_str))
            .collect();

        self.available = self
            .configured
            .iter()
            .filter(|name| !in_use.contains(name.as_str()))
            .cloned()
            .collect();

        info!(
            "Network pool refreshed: {} of {} networks available",
            self.available.len(),
            self.configured.len()
        );
    }

    /// Take any free network out of the pool
    pub fn acquire(&mut self) -> Result<String> {
        let name = self
            .available
            .iter()
            .next()
            .cloned()
            .ok_or(Error::NetworkUnavailable)?;

        self.available.remove(&name);
        debug!("Acquired network {}", name);
        Ok(name)
    }

    /// Put a network back. Names that are free already, unknown, or
    /// quarantined are ignored.
    pub fn release(&mut self, name: &str) {
        if !self.configured.contains(name) {
            warn!("Ignoring release of unconfigured network {}", name);
            return;
        }
        if self.orphaned.values().any(|orphan| orphan == name) {
            warn!("Network {} is held by an orphaned deployment", name);
            return;
        }
        if self.available.insert(name.to_string()) {
            debug!("Released network {}", name);
        }
    }

    /// Keep a network out of circulation while an unrecorded deployment uses it
    pub fn quarantine(&mut self, deployment_name: &str, network_name: &str) {
        self.available.remove(network_name);
        self.orphaned
            .insert(deployment_name.to_string(), network_name.to_string());
    }

    pub fn is_orphaned(&self, deployment_name: &str) -> bool {
        self.orphaned.contains_key(deployment_name)
    }

    pub fn orphaned(&self) -> &HashMap<String, String> {
        &self.orphaned
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains(name)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn capacity(&self) -> usize {
        self.configured.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(names: &[&str]) -> NetworkPool {
        NetworkPool::new(names.iter().map(|n| n.to_string()))
    }

    fn instance(id: &str, network: &str) -> ServiceInstance {
        ServiceInstance::new(
            id.to_string(),
            format!("fabric-{}", id),
            network.to_string(),
            "1".to_string(),
        )
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = pool(&["net1", "net2"]);

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_ne!(first, second);

        assert!(matches!(pool.acquire(), Err(Error::NetworkUnavailable)));
    }

    #[test]
    fn test_release_is_idempotent_and_bounded() {
        let mut pool = pool(&["net1"]);
        let name = pool.acquire().unwrap();

        pool.release(&name);
        pool.release(&name);
        pool.release("not-configured");

        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_refresh_excludes_used_networks() {
        let mut pool = pool(&["net1", "net2", "net3"]);
        pool.refresh(&[instance("a", "net1"), instance("b", "net3")], HashMap::new());

        assert_eq!(pool.available_count(), 1);
        assert!(pool.is_available("net2"));
        assert_eq!(pool.acquire().unwrap(), "net2");
    }

    #[test]
    fn test_quarantine_blocks_release() {
        let mut pool = pool(&["net1", "net2"]);
        let name = pool.acquire().unwrap();
        pool.quarantine("fabric-lost", &name);

        pool.release(&name);
        assert!(!pool.is_available(&name));
        assert!(pool.is_orphaned("fabric-lost"));
    }

    #[test]
    fn test_refresh_follows_unrecorded_deployments() {
        let mut pool = pool(&["net1", "net2", "net3"]);

        let unrecorded = HashMap::from([
            ("fabric-lost".to_string(), "net2".to_string()),
            ("cf".to_string(), "default".to_string()),
        ]);
        pool.refresh(&[instance("a", "net1")], unrecorded);
        assert_eq!(pool.available_count(), 1);
        assert!(pool.is_available("net3"));
        assert!(pool.is_orphaned("fabric-lost"));
        assert!(!pool.is_orphaned("cf"));

        // Removed from the Director by hand
        pool.refresh(&[instance("a", "net1")], HashMap::new());
        assert!(pool.is_available("net2"));
        assert!(pool.orphaned().is_empty());
    }
}
