pub mod catalog;
pub mod error;
pub mod models;
pub mod task;

pub use catalog::{PlanKind, ServiceCatalog};
pub use error::{Error, ErrorBody, Result};
pub use models::{ServiceBinding, ServiceInstance};
pub use task::{LastOperation, OperationKind, OperationState, Task, TaskState};
