use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
    pub fn from_str(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveStatus {
    Started,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalStatus {
    Succeeded,
    Failed,
}

/// Observable state of an asynchronous group operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub active_status: ActiveStatus,
    pub final_status: Option<FinalStatus>,
    pub error: Option<String>,
}

impl Task {
    /// A fresh task with a new ID that has not finished.
    pub fn started() -> Self {
        Self {
            id: TaskId::new(),
            active_status: ActiveStatus::Started,
            final_status: None,
            error: None,
        }
    }

    pub fn is_final(&self) -> bool {
        self.active_status == ActiveStatus::Stopped && self.final_status.is_some()
    }

    pub fn has_failed(&self) -> bool {
        self.final_status == Some(FinalStatus::Failed)
    }

    pub fn has_succeeded(&self) -> bool {
        self.final_status == Some(FinalStatus::Succeeded)
    }
}
