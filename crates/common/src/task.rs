use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a Director task.
///
/// Anything the Director reports other than `queued`, `processing` or `done`
/// (`error`, `cancelled`, `timeout`, ...) is kept verbatim and treated as a
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    Queued,
    Processing,
    Done,
    Other(String),
}

impl TaskState {
    /// Whether the task is still waiting or running
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TaskState::Queued | TaskState::Processing)
    }

    /// Whether the task finished successfully
    pub fn is_done(&self) -> bool {
        matches!(self, TaskState::Done)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Processing => "processing",
            TaskState::Done => "done",
            TaskState::Other(state) => state,
        }
    }
}

impl From<String> for TaskState {
    fn from(state: String) -> Self {
        match state.as_str() {
            "queued" => TaskState::Queued,
            "processing" => TaskState::Processing,
            "done" => TaskState::Done,
            _ => TaskState::Other(state),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task document returned by `GET /tasks/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub state: TaskState,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub user: String,
}

impl Task {
    /// Task id in the string form stored on service instances
    pub fn task_id(&self) -> String {
        self.id.to_string()
    }
}

/// Which lifecycle operation a task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Provision,
    Deprovision,
}

/// Broker-side view of an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl From<&TaskState> for OperationState {
    fn from(state: &TaskState) -> Self {
        match state {
            TaskState::Queued | TaskState::Processing => OperationState::InProgress,
            TaskState::Done => OperationState::Succeeded,
            TaskState::Other(_) => OperationState::Failed,
        }
    }
}

/// Body of `GET /v2/service_instances/{id}/last_operation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastOperation {
    pub state: OperationState,
    pub description: String,
}

impl LastOperation {
    /// Map a Director task state onto the broker contract
    pub fn from_task_state(operation: OperationKind, task_state: &TaskState) -> Self {
        let state = OperationState::from(task_state);

        let description = match (state, operation) {
            (OperationState::InProgress, OperationKind::Provision) => {
                "Still working to get that block chain deployed"
            }
            (OperationState::InProgress, OperationKind::Deprovision) => {
                "Still working to delete that block chain"
            }
            (OperationState::Succeeded, OperationKind::Provision) => "Yipee, block chain is deployed",
            (OperationState::Succeeded, OperationKind::Deprovision) => {
                "Block chain gone :( Please come back and create another one"
            }
            (OperationState::Failed, OperationKind::Provision) => {
                "Ooops, could not deploy block chain"
            }
            (OperationState::Failed, OperationKind::Deprovision) => {
                "No we could not delete the block chain..."
            }
        };

        Self {
            state,
            description: description.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_deserializes_from_director_json() {
        let json = r#"{"id": 42, "state": "processing", "description": "create deployment", "result": null, "user": "admin"}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, 42);
        assert_eq!(task.state, TaskState::Processing);
        assert_eq!(task.task_id(), "42");
    }

    #[test]
    fn test_unknown_state_is_kept() {
        let state = TaskState::from("cancelled".to_string());
        assert_eq!(state, TaskState::Other("cancelled".to_string()));
        assert_eq!(state.to_string(), "cancelled");
        assert!(!state.is_in_flight());
    }

    #[test]
    fn test_last_operation_in_progress() {
        for state in [TaskState::Queued, TaskState::Processing] {
            let op = LastOperation::from_task_state(OperationKind::Provision, &state);
            assert_eq!(op.state, OperationState::InProgress);
        }
    }

    #[test]
    fn test_last_operation_succeeded_and_failed() {
        let done = LastOperation::from_task_state(OperationKind::Deprovision, &TaskState::Done);
        assert_eq!(done.state, OperationState::Succeeded);
        assert!(done.description.contains("gone"));

        let failed = LastOperation::from_task_state(
            OperationKind::Provision,
            &TaskState::Other("error".to_string()),
        );
        assert_eq!(failed.state, OperationState::Failed);
    }

    #[test]
    fn test_operation_state_wire_format() {
        let json = serde_json::to_value(LastOperation::from_task_state(
            OperationKind::Provision,
            &TaskState::Queued,
        ))
        .unwrap();
        assert_eq!(json["state"], "in progress");
    }
}
