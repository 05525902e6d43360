//! Request and response bodies of the broker API

use serde::{Deserialize, Serialize};

/// Port peers accept client connections on
pub const PEER_PORT: u16 = 7050;

/// Body of `PUT /v2/service_instances/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct ProvisionRequest {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub organization_guid: String,
    #[serde(default)]
    pub space_guid: String,
}

/// Body of `PUT /v2/service_instances/{id}/service_bindings/{binding_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct BindRequest {
    pub service_id: String,
    pub plan_id: String,
    #[serde(default)]
    pub app_guid: Option<String>,
}

/// Query of the asynchronous lifecycle calls
#[derive(Debug, Default, Deserialize)]
pub struct AsyncQuery {
    #[serde(default)]
    pub accepts_incomplete: Option<String>,
}

impl AsyncQuery {
    pub fn accepts_incomplete(&self) -> bool {
        self.accepts_incomplete.as_deref() == Some("true")
    }
}

/// Query of `GET /v2/service_instances/{id}/last_operation`
#[derive(Debug, Default, Deserialize)]
pub struct LastOperationQuery {
    #[serde(default)]
    pub operation: Option<String>,
}

/// Async operation token returned with 202
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResponse {
    pub operation: String,
}

/// Connection details handed to a bound application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub peers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingResponse {
    pub credentials: Credentials,
}

/// Result of a deprovision request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeprovisionOutcome {
    /// The Director is deleting the deployment under this task
    Deleting(String),
    /// Only the broker record was removed, the shared deployment stays
    Removed,
}
