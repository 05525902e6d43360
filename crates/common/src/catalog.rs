//! Static service catalog advertised on `GET /v2/catalog`

use serde::Serialize;

pub const SERVICE_ID: &str = "05FC7A18-5B52-4701-A475-5995B79DF2AD";
pub const PERMISSIONLESS_PLAN_ID: &str = "15175506-D9F6-4CD8-AA1E-8F0AAFB99C07";
pub const PERMISSIONED_PLAN_ID: &str = "4D64F255-927B-4807-A358-15CF06EC687B";
pub const SHARED_PERMISSIONED_PLAN_ID: &str = "7C1C3178-7551-11E6-8B77-86F30CA893D3";
pub const SHARED_PERMISSIONLESS_PLAN_ID: &str = "27083A54-76ED-11E6-8B77-86F30CA893D3";

pub const SHARED_PERMISSIONED_DEPLOYMENT: &str = "fabric-shared-permissioned";
pub const SHARED_PERMISSIONLESS_DEPLOYMENT: &str = "fabric-shared-permissionless";

/// What a plan id means for the deployment behind an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Permissionless,
    Permissioned,
    SharedPermissioned,
    SharedPermissionless,
}

impl PlanKind {
    /// Resolve a service/plan pair against the catalog
    pub fn resolve(service_id: &str, plan_id: &str) -> Option<Self> {
        if service_id != SERVICE_ID {
            return None;
        }

        match plan_id {
            PERMISSIONLESS_PLAN_ID => Some(PlanKind::Permissionless),
            PERMISSIONED_PLAN_ID => Some(PlanKind::Permissioned),
            SHARED_PERMISSIONED_PLAN_ID => Some(PlanKind::SharedPermissioned),
            SHARED_PERMISSIONLESS_PLAN_ID => Some(PlanKind::SharedPermissionless),
            _ => None,
        }
    }

    pub fn is_permissioned(self) -> bool {
        matches!(self, PlanKind::Permissioned | PlanKind::SharedPermissioned)
    }

    pub fn is_shared(self) -> bool {
        matches!(
            self,
            PlanKind::SharedPermissioned | PlanKind::SharedPermissionless
        )
    }

    /// Deployment name used for an instance provisioned under this plan
    pub fn deployment_name(self, instance_id: &str) -> String {
        match self {
            PlanKind::SharedPermissioned => SHARED_PERMISSIONED_DEPLOYMENT.to_string(),
            PlanKind::SharedPermissionless => SHARED_PERMISSIONLESS_DEPLOYMENT.to_string(),
            PlanKind::Permissionless | PlanKind::Permissioned => format!("fabric-{}", instance_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceCatalog {
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub name: String,
    pub id: String,
    pub description: String,
    pub tags: Vec<String>,
    pub bindable: bool,
    pub metadata: ServiceMetadata,
    pub plan_updateable: bool,
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetadata {
    pub name: String,
    pub description: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub name: String,
    pub id: String,
    pub description: String,
    pub metadata: PlanMetadata,
    pub free: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanMetadata {
    pub name: String,
    pub description: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub costs: Vec<String>,
}

fn free_plan(id: &str, name: &str, description: &str, summary: &str) -> Plan {
    Plan {
        name: name.to_string(),
        id: id.to_string(),
        description: description.to_string(),
        metadata: PlanMetadata {
            name: name.to_string(),
            description: summary.to_string(),
            display_name: "Free plan".to_string(),
            costs: vec!["free".to_string()],
        },
        free: true,
    }
}

impl ServiceCatalog {
    /// The single hyperledger-fabric service and its four plans
    pub fn fabric() -> Self {
        let service = Service {
            name: "hyperledger-fabric".to_string(),
            id: SERVICE_ID.to_string(),
            description: "Hyperledger fabric block chain service".to_string(),
            tags: vec!["blockchain".to_string()],
            bindable: true,
            metadata: ServiceMetadata {
                name: "hyperledger-fabric".to_string(),
                description: "Permissioned block chain implementation".to_string(),
                display_name: "Hyperledger fabric block chain".to_string(),
            },
            plan_updateable: false,
            plans: vec![
                free_plan(
                    PERMISSIONLESS_PLAN_ID,
                    "permissionless",
                    "Spins up 4 validating nodes in pbft based block chain",
                    "Dedicated 4 nodes permissionless block chain cluster",
                ),
                free_plan(
                    PERMISSIONED_PLAN_ID,
                    "permissioned",
                    "Spins up 4 validating nodes in pbft based block chain and membership service. This is permissioned block chain.",
                    "Dedicated 4 nodes permissioned block chain cluster",
                ),
                free_plan(
                    SHARED_PERMISSIONED_PLAN_ID,
                    "shared",
                    "Shared 4 node permissioned block chain cluster, all members reuse the one-time commissioned block chain.",
                    "shared 4 nodes permissioned block chain cluster",
                ),
                free_plan(
                    SHARED_PERMISSIONLESS_PLAN_ID,
                    "shared",
                    "Shared 4 node permissionless block chain cluster, all members reuse the one-time commissioned block chain.",
                    "shared 4 nodes permissionless block chain cluster",
                ),
            ],
        };

        Self {
            services: vec![service],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_plans() {
        assert_eq!(
            PlanKind::resolve(SERVICE_ID, PERMISSIONED_PLAN_ID),
            Some(PlanKind::Permissioned)
        );
        assert_eq!(
            PlanKind::resolve(SERVICE_ID, SHARED_PERMISSIONLESS_PLAN_ID),
            Some(PlanKind::SharedPermissionless)
        );
    }

    #[test]
    fn test_resolve_rejects_unknown_combinations() {
        assert_eq!(PlanKind::resolve("other-service", PERMISSIONED_PLAN_ID), None);
        assert_eq!(PlanKind::resolve(SERVICE_ID, "not-a-plan"), None);
    }

    #[test]
    fn test_deployment_names() {
        assert_eq!(
            PlanKind::Permissionless.deployment_name("abc"),
            "fabric-abc"
        );
        assert_eq!(
            PlanKind::SharedPermissioned.deployment_name("abc"),
            SHARED_PERMISSIONED_DEPLOYMENT
        );
        assert!(PlanKind::SharedPermissioned.is_permissioned());
        assert!(!PlanKind::SharedPermissionless.is_permissioned());
    }

    #[test]
    fn test_catalog_lists_every_plan() {
        let catalog = ServiceCatalog::fabric();
        let plans = &catalog.services[0].plans;

        assert_eq!(plans.len(), 4);
        for plan in plans {
            assert!(PlanKind::resolve(SERVICE_ID, &plan.id).is_some());
        }

        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["services"][0]["metadata"]["displayName"], "Hyperledger fabric block chain");
    }
}
