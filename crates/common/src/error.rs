use serde::Serialize;
use thiserror::Error;

/// Every failure the broker can report to a marketplace controller.
///
/// Each variant maps to a fixed HTTP status and a fixed JSON body
/// (`{"error": ..., "description": ...}`). The transport layer only reads
/// those through [`Error::status_code`] and [`Error::body`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("client does not accept asynchronous operations")]
    AsyncRequired,

    #[error("unknown service {service_id} or plan {plan_id}")]
    InvalidServicePlan { service_id: String, plan_id: String },

    #[error("service instance already exists: {0}")]
    InstanceAlreadyExists(String),

    #[error("service binding already exists: {0}")]
    BindingAlreadyExists(String),

    #[error("no networks available for deployments")]
    NetworkUnavailable,

    #[error("manifest generation failed: {0}")]
    ManifestGeneration(String),

    #[error("unable to create http request: {0}")]
    HttpRequestCreate(String),

    #[error("unable to connect to director: {0}")]
    BoshConnect(String),

    #[error("invalid response from director: {0}")]
    BoshInvalidResponse(String),

    #[error("director task not found: {0}")]
    TaskNotFound(String),

    #[error("director returned status {0}")]
    DirectorStatus(u16),

    #[error("max retries exceeded while fetching VM details for {0}")]
    MaxRetriesExceeded(String),

    #[error("database read failed: {0}")]
    DbRead(String),

    #[error("database save failed: {0}")]
    DbSave(String),

    #[error("database delete failed: {0}")]
    DbDelete(String),

    #[error("service instance is still being deployed: {0}")]
    ProvisionInFlight(String),

    #[error("deployment is being deleted: {0}")]
    DeprovisionInFlight(String),

    #[error("service instance {0} has bindings")]
    BindingsExist(String),

    #[error("no operation parameter specified")]
    MissingOperation,

    #[error("service instance not found: {0}")]
    InstanceNotFound(String),

    #[error("service instance gone: {0}")]
    InstanceGone(String),

    #[error("service binding gone: {0}")]
    BindingGone(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wire representation of a broker error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl Error {
    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::AsyncRequired => 422,
            Error::InvalidServicePlan { .. }
            | Error::InstanceAlreadyExists(_)
            | Error::ProvisionInFlight(_)
            | Error::DeprovisionInFlight(_)
            | Error::BindingsExist(_)
            | Error::MissingOperation
            | Error::TaskNotFound(_) => 400,
            Error::InstanceNotFound(_) => 404,
            Error::BindingAlreadyExists(_) => 409,
            Error::InstanceGone(_) | Error::BindingGone(_) => 410,
            Error::NetworkUnavailable => 503,
            Error::ManifestGeneration(_)
            | Error::HttpRequestCreate(_)
            | Error::BoshConnect(_)
            | Error::BoshInvalidResponse(_)
            | Error::DirectorStatus(_)
            | Error::MaxRetriesExceeded(_)
            | Error::DbRead(_)
            | Error::DbSave(_)
            | Error::DbDelete(_) => 500,
        }
    }

    /// Stable error code placed in the `error` field. `None` for the plain
    /// not-found/gone responses, which carry an empty object.
    pub fn error_code(&self) -> Option<&'static str> {
        let code = match self {
            Error::AsyncRequired => "AsyncRequired",
            Error::InvalidServicePlan { .. } => "InvalidServicePlan",
            Error::InstanceAlreadyExists(_) | Error::BindingAlreadyExists(_) => {
                "ResourceAlreadyExists"
            }
            Error::NetworkUnavailable => "NetworkUnavailable",
            Error::ManifestGeneration(_) => "ManifestGeneration",
            Error::HttpRequestCreate(_) => "HttpRequestCreate",
            Error::BoshConnect(_) => "BoshConnect",
            Error::BoshInvalidResponse(_) | Error::DirectorStatus(_) => "BoshInvalidResponse",
            Error::TaskNotFound(_) => "InvalidOperation",
            Error::MaxRetriesExceeded(_) => "MaxRetriesExceeded",
            Error::DbRead(_) => "DBRead",
            Error::DbSave(_) => "DBSave",
            Error::DbDelete(_) => "DBDelete",
            Error::ProvisionInFlight(_) => "ProvisionInFlight",
            Error::DeprovisionInFlight(_) => "DeprovisionInFlight",
            Error::BindingsExist(_) => "BindingExist",
            Error::MissingOperation => "MissingOperation",
            Error::InstanceNotFound(_) | Error::InstanceGone(_) | Error::BindingGone(_) => {
                return None
            }
        };
        Some(code)
    }

    /// Human readable description placed in the `description` field.
    pub fn description(&self) -> Option<&'static str> {
        let description = match self {
            Error::AsyncRequired => {
                "This service plan requires client support for asynchronous service operations."
            }
            Error::InvalidServicePlan { .. } => "Unknown service or plan id",
            Error::InstanceAlreadyExists(_) | Error::BindingAlreadyExists(_) => {
                "Resource already exists"
            }
            Error::NetworkUnavailable => "No networks available for deployments",
            Error::ManifestGeneration(_) => "Unable to generate manifest for deployment",
            Error::HttpRequestCreate(_) => "Unable to create an http request",
            Error::BoshConnect(_) => "Unable to connect to Bosh",
            Error::BoshInvalidResponse(_) | Error::DirectorStatus(_) => {
                "Invalid response from Bosh"
            }
            Error::TaskNotFound(_) => "Invalid operation parameter specified",
            Error::MaxRetriesExceeded(_) => {
                "Max retries exceeded in getting deployment details from Bosh"
            }
            Error::DbRead(_) => "Unable to read from DB",
            Error::DbSave(_) => "Unable to save to DB",
            Error::DbDelete(_) => "Unable to delete from DB",
            Error::ProvisionInFlight(_) => "Service instance is still being deployed",
            Error::DeprovisionInFlight(_) => "Deployment is still being deleted",
            Error::BindingsExist(_) => "Service instance cannot be deleted as bindings exist",
            Error::MissingOperation => "No operation parameter specified",
            Error::InstanceNotFound(_) | Error::InstanceGone(_) | Error::BindingGone(_) => {
                return None
            }
        };
        Some(description)
    }

    /// JSON body sent back to the caller.
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.error_code(),
            description: self.description(),
        }
    }
}
