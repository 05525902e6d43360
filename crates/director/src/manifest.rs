//! Deployment manifests submitted to the Director
//!
//! A manifest is rendered from one of two static templates. The permissioned
//! template adds a membership service job and its affiliation properties.

use broker_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::error;

use crate::details::DirectorDetails;

const PERMISSIONLESS_TEMPLATE: &str = include_str!("../templates/permissionless.yml");
const PERMISSIONED_TEMPLATE: &str = include_str!("../templates/permissioned.yml");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub director_uuid: String,
    pub stemcells: Vec<Stemcell>,
    pub releases: Vec<Release>,
    pub update: Update,
    pub jobs: Vec<Job>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stemcell {
    pub alias: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub canaries: u32,
    pub canary_watch_time: String,
    pub max_in_flight: u32,
    pub serial: bool,
    pub update_watch_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub instances: u32,
    pub azs: Vec<String>,
    pub name: String,
    pub networks: Vec<JobNetwork>,
    pub persistent_disk: u32,
    pub vm_type: String,
    pub stemcell: String,
    pub templates: Vec<JobTemplate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobNetwork {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    pub name: String,
    pub release: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Properties {
    pub peer: PeerProperties,
    pub docker: DockerProperties,
    /// Membership service settings, present only on permissioned deployments.
    /// Kept as raw YAML since the broker never edits them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membersrvc: Option<serde_yaml::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerProperties {
    pub network: BTreeMap<String, String>,
    pub consensus: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySettings>,
    pub core: CoreSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecuritySettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSettings {
    pub data_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerProperties {
    pub store: StoreSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub dir: String,
}

impl Manifest {
    /// Render the manifest for a deployment
    ///
    /// Every job is bound to `network_name` and sized with the configured VM
    /// type. Fails with [`Error::ManifestGeneration`] if the bundled template
    /// does not parse.
    pub fn render(
        deployment_name: &str,
        network_name: &str,
        permissioned: bool,
        details: &DirectorDetails,
    ) -> Result<Self> {
        let template = if permissioned {
            PERMISSIONED_TEMPLATE
        } else {
            PERMISSIONLESS_TEMPLATE
        };

        let mut manifest: Manifest = serde_yaml::from_str(template).map_err(|e| {
            error!("Error unmarshalling manifest template: {}", e);
            Error::ManifestGeneration(e.to_string())
        })?;

        if manifest.jobs.is_empty() || manifest.stemcells.is_empty() {
            return Err(Error::ManifestGeneration(
                "template has no jobs or stemcells".to_string(),
            ));
        }

        manifest.name = deployment_name.to_string();
        manifest.director_uuid = details.director_uuid.clone();
        manifest.stemcells[0].name = details.stemcell_name.clone();

        for job in &mut manifest.jobs {
            match job.networks.first_mut() {
                Some(network) => network.name = network_name.to_string(),
                None => {
                    return Err(Error::ManifestGeneration(format!(
                        "job {} has no network",
                        job.name
                    )))
                }
            }
            job.vm_type = details.vm_type.clone();
        }

        manifest
            .properties
            .peer
            .network
            .insert("id".to_string(), deployment_name.to_lowercase());
        manifest.properties.peer.core.data_path = details.peer_data_dir.clone();
        manifest.properties.docker.store.dir = details.docker_data_dir.clone();

        Ok(manifest)
    }

    /// Serialize to the YAML document posted to the Director
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            error!("Error marshalling manifest: {}", e);
            Error::ManifestGeneration(e.to_string())
        })
    }

    /// Network the first job is bound to
    pub fn network_name(&self) -> Option<&str> {
        self.jobs
            .first()
            .and_then(|job| job.networks.first())
            .map(|network| network.name.as_str())
    }
}

/// First network named by the jobs or instance groups of a raw manifest
///
/// Works on manifests the broker did not render, so only the network
/// placement is read.
pub fn first_network(raw: &str) -> Result<Option<String>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let document: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|e| {
        error!("Error unmarshalling deployment manifest: {}", e);
        Error::BoshInvalidResponse(e.to_string())
    })?;

    let network = ["jobs", "instance_groups"]
        .iter()
        .filter_map(|key| document.get(*key)?.as_sequence())
        .flatten()
        .filter_map(|group| {
            group
                .get("networks")?
                .as_sequence()?
                .first()?
                .get("name")?
                .as_str()
        })
        .next()
        .map(str::to_string);

    Ok(network)
}

impl Properties {
    /// Whether peer security is switched on, if the template says anything
    pub fn security_enabled(&self) -> Option<bool> {
        self.peer.security.as_ref().map(|s| s.enabled)
    }
}
